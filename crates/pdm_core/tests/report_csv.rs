use std::collections::BTreeSet;

use pdm_core::domain::{
    EmbeddedLifecycle, IncidentFilters, IncidentStatus, IncidentSummary, MetricsRecord,
    TimeWindow, Urgency,
};
use pdm_core::pipeline::{IncidentMetricsRow, RunOutcome};
use pdm_core::report::manifest::{write_manifest, ReportManifest, MANIFEST_VERSION};
use pdm_core::report::{
    generate_run_summary, report_cells, write_csv, write_report_file, ReportFormat,
    REPORT_COLUMNS,
};
use pretty_assertions::assert_eq;
use time::macros::datetime;

fn known_row() -> IncidentMetricsRow {
    IncidentMetricsRow {
        incident: IncidentSummary {
            id: "PABC".to_string(),
            number: Some(12),
            title: "DB failover, primary lost".to_string(),
            urgency: Some(Urgency::High),
            status: Some(IncidentStatus::Resolved),
            created_at: Some(datetime!(2026-01-01 00:00 UTC)),
            service: Some("db".to_string()),
            priority: Some("P1".to_string()),
            assignees: vec!["Ada".to_string(), "Grace".to_string()],
            lifecycle: EmbeddedLifecycle::default(),
        },
        metrics: MetricsRecord {
            notes: vec!["failed over".to_string(), "root cause: disk".to_string()],
            resolved_by: Some("Ada".to_string()),
            auto_resolved: false,
            responders: BTreeSet::from(["Grace".to_string(), "Ada".to_string()]),
            acknowledged_at: Some(datetime!(2026-01-01 00:00:30 UTC)),
            resolved_at: Some(datetime!(2026-01-01 00:05 UTC)),
            time_to_acknowledge_seconds: Some(30),
            time_to_resolve_seconds: Some(300),
            response_effort_seconds: 270,
            escalations: 2,
        },
        warnings: vec![],
    }
}

fn unknown_row() -> IncidentMetricsRow {
    IncidentMetricsRow {
        incident: IncidentSummary {
            id: "PXYZ".to_string(),
            number: None,
            title: String::new(),
            urgency: None,
            status: None,
            created_at: None,
            service: None,
            priority: None,
            assignees: vec![],
            lifecycle: EmbeddedLifecycle::default(),
        },
        metrics: MetricsRecord::default(),
        warnings: vec![],
    }
}

#[test]
fn cells_render_values_and_sentinels() {
    assert_eq!(
        report_cells(&known_row()),
        vec![
            "PABC",
            "12",
            "DB failover, primary lost",
            "db",
            "P1",
            "resolved",
            "high",
            "2026-01-01T00:00:00Z",
            "2026-01-01T00:00:30Z",
            "2026-01-01T00:05:00Z",
            "Ada, Grace",
            "Ada",
            "false",
            "Ada, Grace",
            "30",
            "300",
            "270",
            "2",
            "failed over\n--- NOTE ---\nroot cause: disk",
        ]
    );

    let cells = report_cells(&unknown_row());
    assert_eq!(cells.len(), REPORT_COLUMNS.len());
    assert_eq!(&cells[14..18], &["N/A", "N/A", "0", "0"]);
    assert_eq!(cells[11], "N/A");
    assert_eq!(cells[13], "");
}

#[test]
fn csv_round_trips_through_a_reader() {
    let mut buf = Vec::new();
    write_csv(&[known_row(), unknown_row()], &mut buf).expect("write");

    let mut rdr = csv::Reader::from_reader(buf.as_slice());
    let headers: Vec<String> = rdr
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(headers, REPORT_COLUMNS.to_vec());

    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.expect("record")).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][2], "DB failover, primary lost");
    assert_eq!(&records[0][18], "failed over\n--- NOTE ---\nroot cause: disk");
}

#[test]
fn report_file_and_manifest_are_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report_path = dir.path().join("incidents.csv");
    let rows = vec![known_row()];

    let info = write_report_file(&report_path, &rows, ReportFormat::Csv).expect("report");
    let written = std::fs::read(&report_path).expect("read");
    assert_eq!(info.filename, "incidents.csv");
    assert_eq!(info.bytes, written.len() as u64);
    assert_eq!(info.sha256.len(), 64);

    let outcome = RunOutcome {
        rows,
        skipped: vec![],
    };
    let window = TimeWindow::new(
        datetime!(2026-01-01 00:00 UTC),
        datetime!(2026-01-02 00:00 UTC),
    )
    .expect("window");
    let manifest = ReportManifest::new(
        "0.1.0",
        None,
        datetime!(2026-01-02 00:01 UTC),
        &window,
        &IncidentFilters::default(),
        &outcome,
    )
    .with_file(info.clone());
    let manifest_path = dir.path().join("incidents.manifest.json");
    write_manifest(&manifest_path, &manifest).expect("manifest");

    let back: ReportManifest =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).expect("read"))
            .expect("decode");
    assert_eq!(back.manifest_version, MANIFEST_VERSION);
    assert_eq!(back.since, "2026-01-01T00:00:00Z");
    assert_eq!(back.incident_count, 1);
    assert_eq!(back.files, vec![info]);
}

#[test]
fn json_lines_report_has_one_object_per_incident() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("incidents.jsonl");
    write_report_file(&path, &[known_row(), unknown_row()], ReportFormat::Json).expect("report");

    let text = std::fs::read_to_string(&path).expect("read");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["incident"]["id"], "PABC");
    assert_eq!(lines[0]["metrics"]["time_to_resolve_seconds"], 300);
    assert_eq!(lines[1]["metrics"]["time_to_resolve_seconds"], serde_json::Value::Null);
}

#[test]
fn summary_counts_known_metrics() {
    let outcome = RunOutcome {
        rows: vec![known_row(), unknown_row()],
        skipped: vec![],
    };
    let summary = generate_run_summary(&outcome);
    assert!(summary.contains("- Incidents reported: **2**"));
    assert!(summary.contains("| Time to acknowledge | 1/2 | 30s | 30s |"));
    assert!(summary.contains("| Time to resolve | 1/2 | 5m 0s | 5m 0s |"));
    assert!(summary.contains("- Total escalations: **2**"));
}
