//! Configuration files, environment overrides and assembly into a run.

use serial_test::serial;
use std::path::Path;
use tlm_app::config::SourceKind;
use tlm_app::{load_config, App, AppConfig, EndReason, FlushPolicy};

struct EnvGuard(&'static [&'static str]);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            std::env::remove_var(key);
        }
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "telemetry.toml",
        r#"
        log_level = "info"
        [source]
        kind = "script"
        samples = ["10"]
        [pipeline]
        store_capacity = 40
        "#,
    );

    let _guard = EnvGuard(&["TLM_LOG_LEVEL", "TLM_PIPELINE__STORE_CAPACITY", "TLM_ORIGIN"]);
    std::env::set_var("TLM_LOG_LEVEL", "debug");
    std::env::set_var("TLM_PIPELINE__STORE_CAPACITY", "25");
    std::env::set_var("TLM_ORIGIN", "EnvHost");

    let config = load_config(&path).unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.pipeline.store_capacity, 25);
    assert_eq!(config.origin, "EnvHost");
    assert_eq!(config.source.samples, vec!["10".to_string()]);
}

#[test]
#[serial]
fn test_environment_value_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "telemetry.toml", "");

    let _guard = EnvGuard(&["TLM_PIPELINE__WORKERS"]);
    std::env::set_var("TLM_PIPELINE__WORKERS", "0");

    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("workers"), "{err:#}");
}

#[test]
#[serial]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
#[serial]
fn test_file_source_to_context_log_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "samples.txt", "50;40;20\n95;88;72\n");
    let cpu_log = dir.path().join("cpu.log");
    let all_log = dir.path().join("all.log");

    let toml = format!(
        r#"
        origin = "Bench"
        [source]
        kind = "file"
        path = "{samples}"
        mapping = ["cpu", "temp", "ram"]
        [sinks]
        console = false
        [[sinks.file]]
        path = "{cpu}"
        context = "CPU"
        [[sinks.file]]
        path = "{all}"
        [pipeline]
        flush = {{ batch = 3 }}
        "#,
        samples = dir.path().join("samples.txt").display(),
        cpu = cpu_log.display(),
        all = all_log.display(),
    );
    let config = AppConfig::from_toml_str(&toml).unwrap();
    assert_eq!(config.source.kind, SourceKind::File);
    assert_eq!(config.pipeline.flush, FlushPolicy::Batch(3));

    let app = App::from_config(config).unwrap();
    assert_eq!(app.sinks().len(), 2);
    let report = app.pipeline().unwrap().run().unwrap();
    assert_eq!(report.end, EndReason::Exhausted);
    assert_eq!(report.records_logged, 6);

    let cpu = std::fs::read_to_string(&cpu_log).unwrap();
    let cpu_lines: Vec<&str> = cpu.lines().collect();
    assert_eq!(cpu_lines.len(), 2);
    assert!(cpu_lines[0].contains("[INFO] Bench (CPU): CPU usage: 50%"));
    assert!(cpu_lines[1].contains("[CRITICAL] Bench (CPU): CPU usage: 95%"));

    let all = std::fs::read_to_string(&all_log).unwrap();
    assert_eq!(all.lines().count(), 6);
    assert!(all.contains("[CRITICAL] Bench (TEMP): TEMP usage: 88°C"));
}

#[test]
#[serial]
fn test_app_runs_repeatedly() {
    let mut config = AppConfig::default();
    config.sinks.console = false;
    config.source.samples = vec!["10".into(), "20".into()];
    let app = App::from_config(config).unwrap();

    for _ in 0..2 {
        let report = app.pipeline().unwrap().run().unwrap();
        assert_eq!(report.samples_read, 2);
    }
}
