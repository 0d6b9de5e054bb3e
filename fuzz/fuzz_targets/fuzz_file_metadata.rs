#![no_main]
use authdrop::protocol::{parse_file_size, parse_tagged, FILENAME_TAG, FILESIZE_TAG};
use authdrop::transfer::sink::sanitize_filename;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(name) = parse_tagged(text, FILENAME_TAG) {
        if let Ok(clean) = sanitize_filename(name) {
            assert!(!clean.contains('/') && !clean.contains('\\'));
            assert!(clean != "." && clean != "..");
        }
    }
    if let Ok(size) = parse_tagged(text, FILESIZE_TAG) {
        let _ = parse_file_size(size);
    }
});
