//! Wall Clock and Host Log Forwarding
//!
//! The sleep timer measures its deadlines against an injectable [`Clock`].
//! The logging layer in `core-runtime` hands every surviving `tracing` event
//! to a [`LoggerSink`] so hosts can route player logs into their own pipeline.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{error::Result, platform::PlatformSendSync};

/// Source of "now" for sleep-timer deadlines.
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn remaining(clock: &dyn Clock, deadline: DateTime<Utc>) -> chrono::Duration {
///     deadline - clock.now()
/// }
/// ```
pub trait Clock: PlatformSendSync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Severity of a forwarded event, ordered from chattiest to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// One `tracing` event as the host sees it.
///
/// Field values have already been through locator redaction when the
/// logging layer was configured to redact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_playback::session`.
    pub target: String,
    pub message: String,
    /// Event fields such as `item_id` or `engine_session`.
    pub fields: HashMap<String, String>,
    /// Name of the innermost span the event fired in, e.g. `next`.
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Single-line rendering: timestamp, level, target with the span in
    /// braces, message, then fields as `key=value` in key order.
    pub fn render(&self) -> String {
        let mut line = format!(
            "{} {:<5} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.target
        );
        if let Some(span) = &self.span {
            line.push('{');
            line.push_str(span);
            line.push('}');
        }
        line.push_str(": ");
        line.push_str(&self.message);

        let mut fields: Vec<_> = self.fields.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }
}

/// Host-side receiver for player log events (OSLog, Logcat, the browser
/// console, a desktop log file).
///
/// Implementations should not persist media locators verbatim even when the
/// core was configured without redaction; signed URLs expire but still leak
/// account tokens.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait LoggerSink: PlatformSendSync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Events below this level are dropped before an entry is built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Writes [`LogEntry::render`] lines to stderr. Handy for desktop hosts and
/// command-line harnesses that have no log pipeline of their own.
#[derive(Debug, Clone)]
pub struct StderrSink {
    pub min_level: LogLevel,
}

impl Default for StderrSink {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl LoggerSink for StderrSink {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            eprintln!("{}", entry.render());
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at_noon() -> LogEntry {
        let mut entry = LogEntry::new(LogLevel::Warn, "core_playback::session", "Engine failed");
        entry.timestamp = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .unwrap();
        entry
    }

    #[test]
    fn system_clock_tracks_utc_now() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
        assert!(now - before < chrono::Duration::seconds(5));
    }

    #[test]
    fn render_puts_span_after_target_and_sorts_fields() {
        let mut entry = entry_at_noon()
            .with_field("reason", "timeout")
            .with_field("item_id", "a");
        entry.span = Some("reconcile".to_string());

        assert_eq!(
            entry.render(),
            "2026-03-01T12:00:00.000Z WARN  core_playback::session{reconcile}: Engine failed item_id=a reason=timeout"
        );
    }

    #[test]
    fn render_without_span_or_fields() {
        let mut entry = entry_at_noon();
        entry.level = LogLevel::Error;

        assert_eq!(
            entry.render(),
            "2026-03-01T12:00:00.000Z ERROR core_playback::session: Engine failed"
        );
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
    }

    #[tokio::test]
    async fn stderr_sink_reports_its_threshold() {
        let sink = StderrSink {
            min_level: LogLevel::Warn,
        };
        assert_eq!(LoggerSink::min_level(&sink), LogLevel::Warn);

        sink.log(entry_at_noon()).await.unwrap();
        sink.log(LogEntry::new(LogLevel::Debug, "core_playback", "dropped"))
            .await
            .unwrap();
    }
}
