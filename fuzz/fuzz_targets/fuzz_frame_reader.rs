#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let mut cursor = std::io::Cursor::new(data.to_vec());
        // Read frames until the input runs out or a frame is rejected
        while authdrop::protocol::frame::read_text_frame(&mut cursor, 4096)
            .await
            .is_ok()
        {}
    });
});
