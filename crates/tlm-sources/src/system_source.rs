//! Host metrics sampled with `sysinfo`.
//!
//! Each sample is `"<cpu>;<temp>;<ram>"`: global CPU load in percent, the
//! hottest reported component in °C, and used memory in percent, all rounded
//! to integers. The field order matches the default `cpu;temp;ram` mapping.
//! Hosts without temperature sensors report `0`.

use sysinfo::{Components, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tlm_core::{SourceError, TelemetrySource};
use tracing::debug;

/// Samples live CPU, temperature and memory readings from the host.
pub struct SystemSource {
    limit: u64,
    emitted: u64,
    system: Option<System>,
}

impl SystemSource {
    /// A source producing at most `limit` samples; 0 means unbounded.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            emitted: 0,
            system: None,
        }
    }

    /// Sample limit; 0 means unbounded.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn exhausted(&self) -> bool {
        self.limit != 0 && self.emitted >= self.limit
    }
}

impl TelemetrySource for SystemSource {
    fn name(&self) -> &str {
        "system"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes.
        system.refresh_cpu_usage();
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        self.system = Some(system);
        self.emitted = 0;
        debug!(limit = self.limit, "system source opened");
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<String>, SourceError> {
        if self.exhausted() {
            return Ok(None);
        }
        let Some(system) = self.system.as_mut() else {
            return Err(SourceError::read("system", "source not opened"));
        };

        system.refresh_cpu_usage();
        system.refresh_memory();
        let cpu = system.global_cpu_usage();
        let total = system.total_memory();
        let ram = if total > 0 {
            (system.used_memory() as f64 / total as f64 * 100.0) as f32
        } else {
            0.0
        };
        let temp = hottest_component();

        self.emitted += 1;
        Ok(Some(format!("{:.0};{:.0};{:.0}", cpu, temp, ram)))
    }
}

impl std::fmt::Debug for SystemSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSource")
            .field("limit", &self.limit)
            .field("emitted", &self.emitted)
            .field("opened", &self.system.is_some())
            .finish()
    }
}

fn hottest_component() -> f32 {
    let components = Components::new_with_refreshed_list();
    components
        .list()
        .iter()
        .filter_map(|c| c.temperature())
        .filter(|t| t.is_finite())
        .fold(0.0_f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_before_open_fails() {
        let mut source = SystemSource::new(1);
        assert!(source.read_sample().is_err());
    }

    #[test]
    fn test_limit_and_format() {
        let mut source = SystemSource::new(2);
        source.open().unwrap();

        for _ in 0..2 {
            let sample = source.read_sample().unwrap().unwrap();
            let fields: Vec<&str> = sample.split(';').collect();
            assert_eq!(fields.len(), 3, "sample {sample:?}");
            for field in fields {
                let value: f32 = field.parse().unwrap();
                assert!(value >= 0.0);
            }
        }
        assert_eq!(source.read_sample().unwrap(), None);
    }

    #[test]
    fn test_reopen_resets_limit() {
        let mut source = SystemSource::new(1);
        source.open().unwrap();
        assert!(source.read_sample().unwrap().is_some());
        assert!(source.read_sample().unwrap().is_none());
        source.open().unwrap();
        assert!(source.read_sample().unwrap().is_some());
    }
}
