//! Classified telemetry records.
//!
//! A [`Record`] is what flows from the classification step, through the shared
//! queue and the record store, to every sink. It is a plain value: cloning is
//! cheap enough for fan-out and equality is field-wise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used for every record (`2024-05-01 13:37:00`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Severity of a classified sample, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Within normal range.
    Info,
    /// Above the warning threshold.
    Warning,
    /// Above the critical threshold.
    Critical,
}

impl Severity {
    /// Upper-case label used in display lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, formatted telemetry event ready for sink delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    origin: String,
    timestamp: String,
    context: String,
    severity: Severity,
    text: String,
}

impl Record {
    /// Record with every field given.
    pub fn new(
        origin: impl Into<String>,
        timestamp: impl Into<String>,
        context: impl Into<String>,
        severity: Severity,
        text: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            timestamp: timestamp.into(),
            context: context.into(),
            severity,
            text: text.into(),
        }
    }

    /// Name of the application that produced the record.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Creation time in [`TIMESTAMP_FORMAT`].
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Telemetry context, e.g. `CPU`, `RAM` or `TEMP`.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Classification result.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human-readable message.
    pub fn text(&self) -> &str {
        &self.text
    }

    // Mutators are for the classification step only; once a record is queued
    // it is moved, never edited.

    /// Replace the origin.
    pub fn set_origin(&mut self, origin: impl Into<String>) {
        self.origin = origin.into();
    }

    /// Replace the timestamp.
    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) {
        self.timestamp = timestamp.into();
    }

    /// Replace the context.
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    /// Replace the severity.
    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    /// Replace the text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// `[<timestamp>] [<SEVERITY>] <origin> (<context>): <text>`
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {} ({}): {}",
            self.timestamp, self.severity, self.origin, self.context, self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(
            "TelemetryApp",
            "2024-05-01 13:37:00",
            "CPU",
            Severity::Warning,
            "CPU usage: 80%",
        )
    }

    #[test]
    fn test_display_line() {
        assert_eq!(
            sample().to_string(),
            "[2024-05-01 13:37:00] [WARNING] TelemetryApp (CPU): CPU usage: 80%"
        );
    }

    #[test]
    fn test_mutators() {
        let mut record = sample();
        record.set_origin("monitor");
        record.set_context("RAM");
        record.set_severity(Severity::Critical);
        record.set_text("RAM usage: 99%");
        record.set_timestamp("2024-05-01 13:38:00");

        assert_eq!(record.origin(), "monitor");
        assert_eq!(record.context(), "RAM");
        assert_eq!(record.severity(), Severity::Critical);
        assert_eq!(record.text(), "RAM usage: 99%");
        assert_eq!(record.timestamp(), "2024-05-01 13:38:00");
    }

    #[test]
    fn test_severity_order_and_serde() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);

        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }

    #[test]
    fn test_timestamp_layout() {
        let ts = current_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
