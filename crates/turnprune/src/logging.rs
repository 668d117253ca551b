//! Diagnostics capture: a tracing layer that keeps recent log lines in
//! memory so a relay or popup can show them.
//!
//! The buffer has its own mutex and a hard cap ([`MAX_LOG_LINES`], trimmed
//! back to [`LOG_TRIM_TO`]), so a chatty engine never grows it without
//! bound and readers never block the engine.

use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::layer::Layer;
use tracing_subscriber::registry::LookupSpan;

/// Maximum log lines kept in memory.
pub const MAX_LOG_LINES: usize = 2000;
/// Trim to this many when the cap is exceeded.
pub const LOG_TRIM_TO: usize = 1200;

/// A single captured log line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub time: String,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Log severity (mirrors tracing levels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// Shared, bounded buffer of captured lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<LogLine>>>);

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every buffered line, oldest first.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Take every buffered line, leaving the buffer empty.
    pub fn drain(&self) -> Vec<LogLine> {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, line: LogLine) {
        if let Ok(mut buf) = self.0.lock() {
            buf.push(line);
            if buf.len() > MAX_LOG_LINES {
                let trim_to = buf.len() - LOG_TRIM_TO;
                buf.drain(..trim_to);
            }
        }
    }
}

/// A [`tracing_subscriber::Layer`] that appends every event to a
/// [`LogBuffer`].
pub struct DiagnosticsLayer {
    buffer: LogBuffer,
}

impl DiagnosticsLayer {
    /// Create the layer and the buffer it writes to.
    pub fn new() -> (Self, LogBuffer) {
        let buffer = LogBuffer::new();
        (
            Self {
                buffer: buffer.clone(),
            },
            buffer,
        )
    }
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for DiagnosticsLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            let extras: Vec<String> = visitor
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if message.is_empty() {
                message = extras.join(" ");
            } else {
                message = format!("{message} {{{}}}", extras.join(", "));
            }
        }

        self.buffer.push(LogLine {
            time: Local::now().format("%H:%M:%S%.3f").to_string(),
            level: (*event.metadata().level()).into(),
            target: event.metadata().target().to_string(),
            message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let raw = format!("{value:?}");
        if field.name() == "message" {
            self.message = raw
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .map(str::to_string)
                .unwrap_or(raw);
        } else {
            self.fields.push((field.name().to_string(), raw));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}
