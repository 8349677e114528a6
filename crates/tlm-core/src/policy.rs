//! Classification policies: raw sample strings to [`Record`]s.
//!
//! A [`ClassificationPolicy`] handles one telemetry context (CPU load, RAM
//! usage, temperature). It validates a raw numeric string against the
//! context's maximum and grades it against two thresholds:
//!
//! ```text
//! value <= warning              -> INFO
//! warning < value <= critical   -> WARNING
//! value > critical              -> CRITICAL
//! value < 0, > max, unparsable  -> rejected (None)
//! ```
//!
//! A [`SampleClassifier`] sits one level up and decides how a whole raw sample
//! maps onto policies: [`SingleValue`] feeds the sample to one policy,
//! [`MultiValue`] splits `"cpu;temp;ram"`-style samples and classifies each
//! field with its own policy.

use crate::error::{TlmError, TlmResult};
use crate::limits::DEFAULT_ORIGIN;
use crate::record::{current_timestamp, Record, Severity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Per-context rule mapping a raw value to a severity-graded record.
pub trait ClassificationPolicy: Send + Sync {
    /// Context label stamped on produced records.
    fn context(&self) -> &str;

    /// Classify one raw value, or `None` if it fails validation.
    fn classify(&self, raw: &str) -> Option<Record>;
}

/// Threshold-based policy with a validity ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    context: String,
    unit: String,
    max_value: f32,
    warning: f32,
    critical: f32,
    origin: String,
}

impl ThresholdPolicy {
    /// Build a policy, checking `0 <= warning <= critical <= max_value`.
    pub fn new(
        context: impl Into<String>,
        unit: impl Into<String>,
        max_value: f32,
        warning: f32,
        critical: f32,
    ) -> TlmResult<Self> {
        let context = context.into();
        let ordered = [max_value, warning, critical].iter().all(|v| v.is_finite())
            && 0.0 <= warning
            && warning <= critical
            && critical <= max_value;
        if !ordered {
            return Err(TlmError::InvalidThresholds {
                context,
                warning,
                critical,
                max_value,
            });
        }
        Ok(Self {
            context,
            unit: unit.into(),
            max_value,
            warning,
            critical,
            origin: DEFAULT_ORIGIN.to_string(),
        })
    }

    /// CPU load in percent: warning above 75, critical above 90.
    pub fn cpu() -> Self {
        Self::builtin("CPU", "%", 100.0, 75.0, 90.0)
    }

    /// RAM usage in percent: warning above 70, critical above 85.
    pub fn ram() -> Self {
        Self::builtin("RAM", "%", 100.0, 70.0, 85.0)
    }

    /// CPU temperature in °C, valid up to 120: warning above 70, critical above 85.
    pub fn temp() -> Self {
        Self::builtin("TEMP", "°C", 120.0, 70.0, 85.0)
    }

    /// Look up a built-in policy by its configuration name (`cpu`, `ram`, `temp`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cpu" => Some(Self::cpu()),
            "ram" => Some(Self::ram()),
            "temp" => Some(Self::temp()),
            _ => None,
        }
    }

    /// Names accepted by [`ThresholdPolicy::by_name`].
    pub const BUILTIN_NAMES: [&'static str; 3] = ["cpu", "ram", "temp"];

    fn builtin(context: &str, unit: &str, max_value: f32, warning: f32, critical: f32) -> Self {
        Self {
            context: context.to_string(),
            unit: unit.to_string(),
            max_value,
            warning,
            critical,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }

    /// Set the origin stamped on produced records.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Largest accepted value.
    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    /// Values above this are warnings.
    pub fn warning(&self) -> f32 {
        self.warning
    }

    /// Values above this are critical.
    pub fn critical(&self) -> f32 {
        self.critical
    }

    /// Grade an already validated value.
    pub fn severity_for(&self, value: f32) -> Severity {
        if value > self.critical {
            Severity::Critical
        } else if value > self.warning {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    /// Parse and range-check a raw value.
    pub fn parse_value(&self, raw: &str) -> Option<f32> {
        let value: f32 = raw.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 || value > self.max_value {
            return None;
        }
        Some(value)
    }
}

impl ClassificationPolicy for ThresholdPolicy {
    fn context(&self) -> &str {
        &self.context
    }

    fn classify(&self, raw: &str) -> Option<Record> {
        let Some(value) = self.parse_value(raw) else {
            debug!(context = %self.context, raw, "rejected sample value");
            return None;
        };
        Some(Record::new(
            self.origin.clone(),
            current_timestamp(),
            self.context.clone(),
            self.severity_for(value),
            format!("{} usage: {}{}", self.context, value, self.unit),
        ))
    }
}

/// Turns one raw sample into zero or more records.
pub trait SampleClassifier: Send + Sync {
    /// Records for `raw`, in field order; empty when the sample is rejected.
    fn classify_sample(&self, raw: &str) -> Vec<Record>;
}

/// The whole sample is one value for one policy.
#[derive(Clone)]
pub struct SingleValue {
    policy: Arc<dyn ClassificationPolicy>,
}

impl SingleValue {
    /// Classify whole samples with `policy`.
    pub fn new(policy: Arc<dyn ClassificationPolicy>) -> Self {
        Self { policy }
    }
}

impl SampleClassifier for SingleValue {
    fn classify_sample(&self, raw: &str) -> Vec<Record> {
        self.policy.classify(raw).into_iter().collect()
    }
}

/// Separator between fields of a multi-value sample.
pub const FIELD_SEPARATOR: char = ';';

/// A sample of `;`-separated fields, one policy per field position.
///
/// A sample whose field count differs from the number of policies is dropped
/// whole; otherwise each field is classified (or rejected) independently.
#[derive(Clone)]
pub struct MultiValue {
    policies: Vec<Arc<dyn ClassificationPolicy>>,
}

impl MultiValue {
    /// One policy per field position.
    ///
    /// # Errors
    /// [`TlmError::Configuration`] if `policies` is empty.
    pub fn new(policies: Vec<Arc<dyn ClassificationPolicy>>) -> TlmResult<Self> {
        if policies.is_empty() {
            return Err(TlmError::Configuration(
                "multi-value classifier needs at least one policy".into(),
            ));
        }
        Ok(Self { policies })
    }

    /// Fields expected per sample.
    pub fn field_count(&self) -> usize {
        self.policies.len()
    }
}

impl SampleClassifier for MultiValue {
    fn classify_sample(&self, raw: &str) -> Vec<Record> {
        let fields: Vec<&str> = raw.trim().split(FIELD_SEPARATOR).collect();
        if fields.len() != self.policies.len() {
            debug!(
                expected = self.policies.len(),
                found = fields.len(),
                raw,
                "malformed multi-value sample"
            );
            return Vec::new();
        }
        self.policies
            .iter()
            .zip(fields)
            .filter_map(|(policy, field)| policy.classify(field))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severities(records: &[Record]) -> Vec<Severity> {
        records.iter().map(Record::severity).collect()
    }

    #[test]
    fn test_threshold_grading() {
        let cpu = ThresholdPolicy::cpu();
        assert_eq!(cpu.severity_for(0.0), Severity::Info);
        assert_eq!(cpu.severity_for(75.0), Severity::Info);
        assert_eq!(cpu.severity_for(75.5), Severity::Warning);
        assert_eq!(cpu.severity_for(90.0), Severity::Warning);
        assert_eq!(cpu.severity_for(90.1), Severity::Critical);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cpu = ThresholdPolicy::cpu();
        assert!(cpu.classify("-5").is_none());
        assert!(cpu.classify("101").is_none());
        assert!(cpu.classify("abc").is_none());
        assert!(cpu.classify("").is_none());
        assert!(cpu.classify("NaN").is_none());
        assert!(cpu.classify("inf").is_none());
        assert!(cpu.classify(" 100 ").is_some());
    }

    #[test]
    fn test_record_fields() {
        let record = ThresholdPolicy::cpu()
            .with_origin("monitor")
            .classify("80")
            .unwrap();
        assert_eq!(record.origin(), "monitor");
        assert_eq!(record.context(), "CPU");
        assert_eq!(record.severity(), Severity::Warning);
        assert_eq!(record.text(), "CPU usage: 80%");

        let temp = ThresholdPolicy::temp().classify("110").unwrap();
        assert_eq!(temp.severity(), Severity::Critical);
        assert_eq!(temp.text(), "TEMP usage: 110°C");
    }

    #[test]
    fn test_end_to_end_sequence() {
        let policy = ThresholdPolicy::new("CPU", "%", 100.0, 75.0, 90.0).unwrap();
        let classifier = SingleValue::new(Arc::new(policy));
        let records: Vec<Record> = ["50", "-5", "101", "80"]
            .iter()
            .flat_map(|raw| classifier.classify_sample(raw))
            .collect();
        assert_eq!(severities(&records), vec![Severity::Info, Severity::Warning]);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(ThresholdPolicy::new("X", "", 100.0, 80.0, 70.0).is_err());
        assert!(ThresholdPolicy::new("X", "", 50.0, 40.0, 60.0).is_err());
        assert!(ThresholdPolicy::new("X", "", 100.0, -1.0, 60.0).is_err());
        assert!(ThresholdPolicy::new("X", "", f32::NAN, 1.0, 2.0).is_err());
        assert!(ThresholdPolicy::new("X", "", 100.0, 100.0, 100.0).is_ok());
    }

    #[test]
    fn test_by_name() {
        assert_eq!(ThresholdPolicy::by_name("RAM"), Some(ThresholdPolicy::ram()));
        assert_eq!(ThresholdPolicy::by_name("temp"), Some(ThresholdPolicy::temp()));
        assert_eq!(ThresholdPolicy::by_name("disk"), None);
    }

    #[test]
    fn test_multi_value() {
        let classifier = MultiValue::new(vec![
            Arc::new(ThresholdPolicy::cpu()),
            Arc::new(ThresholdPolicy::temp()),
            Arc::new(ThresholdPolicy::ram()),
        ])
        .unwrap();

        let records = classifier.classify_sample("95;60;72\n");
        let contexts: Vec<&str> = records.iter().map(Record::context).collect();
        assert_eq!(contexts, vec!["CPU", "TEMP", "RAM"]);
        assert_eq!(
            severities(&records),
            vec![Severity::Critical, Severity::Info, Severity::Warning]
        );

        // one bad field only drops that field
        let records = classifier.classify_sample("10;999;20");
        assert_eq!(records.len(), 2);

        // wrong arity drops the sample
        assert!(classifier.classify_sample("10;20").is_empty());
        assert!(MultiValue::new(Vec::new()).is_err());
    }
}
