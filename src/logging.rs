//! Log output: pretty (tagged, optionally colored) or JSON.

use std::fmt::{self, Write as _};
use std::io::IsTerminal;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::types::LogFormat;

const DENY_PATTERNS: &[&str] = &[
    "auth failed",
    "rejected",
    "timed out",
    "timeout",
    "invalid protocol",
    "incomplete",
    "aborted",
    "connection limit reached",
];

const ALLOW_PATTERNS: &[&str] = &["auth success", "file received"];

/// Field name to ANSI color code.
const FIELD_COLORS: &[(&str, &str)] = &[
    ("user", "36"),
    ("file", "33"),
    ("peer", "35"),
    ("conn_id", "2"),
    ("bytes", "32"),
    ("error", "31"),
    ("reason", "31"),
];

/// Outcome tag for access decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Allow,
    Deny,
}

impl Tag {
    fn classify(message: &str) -> Option<Tag> {
        let lower = message.to_lowercase();
        if DENY_PATTERNS.iter().any(|p| lower.contains(p)) {
            Some(Tag::Deny)
        } else if ALLOW_PATTERNS.iter().any(|p| lower.contains(p)) {
            Some(Tag::Allow)
        } else {
            None
        }
    }

    fn label(self, ansi: bool) -> &'static str {
        match (self, ansi) {
            (Tag::Allow, true) => "\x1b[34m[ALLOW]\x1b[0m ",
            (Tag::Allow, false) => "[ALLOW] ",
            (Tag::Deny, true) => "\x1b[31m[DENY]\x1b[0m ",
            (Tag::Deny, false) => "[DENY] ",
        }
    }
}

/// Wraps a formatter, prefixing auth and transfer outcomes with
/// `[ALLOW]`/`[DENY]` and coloring known fields on a terminal.
pub struct TaggedFormat<E> {
    inner: E,
    ansi: bool,
}

impl<E> TaggedFormat<E> {
    pub fn new(inner: E, ansi: bool) -> Self {
        Self { inner, ansi }
    }
}

impl<S, N, E> FormatEvent<S, N> for TaggedFormat<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = MessageText::default();
        event.record(&mut message);
        if let Some(tag) = Tag::classify(&message.0) {
            writer.write_str(tag.label(self.ansi))?;
        }

        if !self.ansi {
            return self.inner.format_event(ctx, writer, event);
        }
        let mut line = String::new();
        self.inner.format_event(ctx, Writer::new(&mut line), event)?;
        writer.write_str(&colorize_fields(&line))
    }
}

#[derive(Default)]
struct MessageText(String);

impl tracing::field::Visit for MessageText {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

fn colorize_fields(line: &str) -> String {
    FIELD_COLORS
        .iter()
        .fold(line.to_string(), |acc, (field, color)| {
            acc.replace(
                &format!("{}=", field),
                &format!("\x1b[{}m{}=\x1b[0m", color, field),
            )
        })
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init()
                .ok();
        }
        LogFormat::Pretty => {
            let ansi = std::io::stdout().is_terminal();
            let default_format = tracing_subscriber::fmt::format::Format::default();
            tracing_subscriber::fmt()
                .event_format(TaggedFormat::new(default_format, ansi))
                .with_env_filter(filter)
                .try_init()
                .ok();
        }
    }
}

/// Run `f` under a temporary stderr subscriber at `warn`, so events raised
/// while loading configuration are visible before `setup_logging` runs.
pub fn with_startup_logging<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}
