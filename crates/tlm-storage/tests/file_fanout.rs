//! Record store fan-out into per-context log files.

use std::sync::Arc;
use tlm_core::{Record, Severity};
use tlm_storage::{FileSink, MemorySink, RecordStore};

fn record(context: &str, severity: Severity, text: &str) -> Record {
    Record::new("TelemetryApp", "2024-05-01 12:00:00", context, severity, text)
}

#[test]
fn test_routes_records_to_context_files() {
    let dir = tempfile::tempdir().unwrap();
    let cpu_path = dir.path().join("cpu.log");
    let ram_path = dir.path().join("ram.log");
    let all_path = dir.path().join("all.log");
    let memory = Arc::new(MemorySink::new("memory"));

    let mut store = RecordStore::builder(16)
        .sink(Arc::new(FileSink::create(&cpu_path).unwrap().with_context("CPU")))
        .sink(Arc::new(FileSink::create(&ram_path).unwrap().with_context("RAM")))
        .sink(Arc::new(FileSink::create(&all_path).unwrap()))
        .sink(memory.clone())
        .build()
        .unwrap();

    store.log(record("CPU", Severity::Info, "CPU usage: 50%"));
    store.log(record("RAM", Severity::Critical, "RAM usage: 95%"));
    store.log(record("CPU", Severity::Warning, "CPU usage: 80%"));

    let report = store.flush();
    assert_eq!(report.records, 3);
    assert_eq!(report.sink_failures, 0);

    let cpu = std::fs::read_to_string(&cpu_path).unwrap();
    assert_eq!(
        cpu.lines().collect::<Vec<_>>(),
        vec![
            "[2024-05-01 12:00:00] [INFO] TelemetryApp (CPU): CPU usage: 50%",
            "[2024-05-01 12:00:00] [WARNING] TelemetryApp (CPU): CPU usage: 80%",
        ]
    );

    let ram = std::fs::read_to_string(&ram_path).unwrap();
    assert_eq!(
        ram.trim_end(),
        "[2024-05-01 12:00:00] [CRITICAL] TelemetryApp (RAM): RAM usage: 95%"
    );

    let all = std::fs::read_to_string(&all_path).unwrap();
    assert_eq!(all.lines().count(), 3);
    assert_eq!(memory.len(), 3);
}

#[test]
fn test_second_flush_appends_only_new_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let mut store = RecordStore::builder(4)
        .sink(Arc::new(FileSink::create(&path).unwrap()))
        .build()
        .unwrap();

    store.log(record("TEMP", Severity::Info, "TEMP usage: 40°C"));
    store.flush();
    store.log(record("TEMP", Severity::Warning, "TEMP usage: 75°C"));
    store.flush();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("TEMP usage: 40°C"));
    assert!(lines[1].ends_with("TEMP usage: 75°C"));
}
