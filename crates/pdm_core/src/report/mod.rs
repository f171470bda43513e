use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{format_rfc3339, NOT_AVAILABLE, LIST_SEPARATOR};
use crate::error::{codes, AppError};
use crate::pipeline::{IncidentMetricsRow, RunOutcome};

pub mod manifest;

pub const REPORT_COLUMNS: [&str; 19] = [
    "Incident ID",
    "Incident Number",
    "Title",
    "Service",
    "Priority",
    "Status",
    "Urgency",
    "Created At",
    "Acknowledged At",
    "Resolved At",
    "Assigned To",
    "Resolved By",
    "Auto Resolved",
    "Responders",
    "Time To Acknowledge (s)",
    "Time To Resolve (s)",
    "Response Effort (s)",
    "Escalations",
    "Notes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFileInfo {
    pub filename: String,
    pub bytes: u64,
    pub sha256: String,
}

fn or_na(v: Option<String>) -> String {
    v.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// One output row, column-aligned with [`REPORT_COLUMNS`].
///
/// Unknown durations render as `N/A`; effort and escalations are always numeric.
pub fn report_cells(row: &IncidentMetricsRow) -> Vec<String> {
    let inc = &row.incident;
    let m = &row.metrics;
    vec![
        inc.id.clone(),
        or_na(inc.number.map(|n| n.to_string())),
        inc.title.clone(),
        or_na(inc.service.clone()),
        or_na(inc.priority.clone()),
        or_na(inc.status.map(|s| s.as_str().to_string())),
        or_na(inc.urgency.map(|u| u.as_str().to_string())),
        or_na(inc.created_at.map(format_rfc3339)),
        or_na(m.acknowledged_at.map(format_rfc3339)),
        or_na(m.resolved_at.map(format_rfc3339)),
        inc.assignees.join(LIST_SEPARATOR),
        m.resolved_by_label().to_string(),
        m.auto_resolved.to_string(),
        m.responders_joined(),
        or_na(m.time_to_acknowledge_seconds.map(|s| s.to_string())),
        or_na(m.time_to_resolve_seconds.map(|s| s.to_string())),
        m.response_effort_seconds.to_string(),
        m.escalations.to_string(),
        m.notes_joined(),
    ]
}

pub fn write_csv<W: Write>(rows: &[IncidentMetricsRow], out: W) -> Result<(), AppError> {
    let write_err = |e: csv::Error| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to write CSV report")
            .with_details(e.to_string())
    };

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(REPORT_COLUMNS).map_err(write_err)?;
    for row in rows {
        wtr.write_record(report_cells(row)).map_err(write_err)?;
    }
    wtr.flush().map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to flush CSV report")
            .with_details(e.to_string())
    })
}

/// One JSON object per incident (summary, metrics, warnings), newline-delimited.
pub fn write_json_lines<W: Write>(rows: &[IncidentMetricsRow], mut out: W) -> Result<(), AppError> {
    for row in rows {
        serde_json::to_writer(&mut out, row).map_err(|e| {
            AppError::new(codes::REPORT_WRITE_FAILED, "Failed to encode JSON report row")
                .with_details(format!("incident={}: {e}", row.incident.id))
        })?;
        writeln!(out).map_err(|e| {
            AppError::new(codes::REPORT_WRITE_FAILED, "Failed to write JSON report")
                .with_details(e.to_string())
        })?;
    }
    Ok(())
}

fn sha256_file_hex(path: &Path) -> Result<(String, u64), AppError> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut f = fs::File::open(path).map_err(|e| {
        AppError::new(codes::REPORT_HASH_FAILED, "Failed to open report for hashing")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = f.read(&mut buf).map_err(|e| {
            AppError::new(codes::REPORT_HASH_FAILED, "Failed to read report for hashing")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        if n == 0 {
            break;
        }
        total += n as u64;
        hasher.update(&buf[..n]);
    }
    Ok((hex::encode(hasher.finalize()), total))
}

/// Write the report to `path` (truncating) and return its size and digest.
pub fn write_report_file(
    path: &Path,
    rows: &[IncidentMetricsRow],
    format: ReportFormat,
) -> Result<ReportFileInfo, AppError> {
    let file = fs::File::create(path).map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to create report file")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let mut out = std::io::BufWriter::new(file);
    match format {
        ReportFormat::Csv => write_csv(rows, &mut out)?,
        ReportFormat::Json => write_json_lines(rows, &mut out)?,
    }
    out.flush().map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to flush report file")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    drop(out);

    let (sha256, bytes) = sha256_file_hex(path)?;
    Ok(ReportFileInfo {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
        bytes,
        sha256,
    })
}

/// Compact duration for the summary table: `42s`, `2m 5s` or `3h 7m`.
/// Takes `u64` because metric durations are never negative.
pub fn format_duration(secs: Option<u64>) -> String {
    let Some(secs) = secs else {
        return NOT_AVAILABLE.to_string();
    };
    match (secs / 3600, secs / 60 % 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

/// Known-value count and P50/P90 of one duration column.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Spread {
    known: usize,
    total: usize,
    p50: Option<u64>,
    p90: Option<u64>,
}

impl Spread {
    fn of(values: impl IntoIterator<Item = Option<i64>>) -> Self {
        let mut total = 0;
        let mut known = Vec::new();
        for v in values {
            total += 1;
            known.extend(v.and_then(|s| u64::try_from(s).ok()));
        }
        known.sort_unstable();
        // Nearest lower rank on 0..n-1.
        let rank = |pct: usize| {
            let last = known.len().checked_sub(1)?;
            known.get(last * pct / 100).copied()
        };
        Self {
            known: known.len(),
            total,
            p50: rank(50),
            p90: rank(90),
        }
    }

    fn table_row(&self, name: &str) -> String {
        format!(
            "| {name} | {}/{} | {} | {} |\n",
            self.known,
            self.total,
            format_duration(self.p50),
            format_duration(self.p90)
        )
    }
}

/// Markdown run summary: counts and P50/P90 of each duration metric.
pub fn generate_run_summary(outcome: &RunOutcome) -> String {
    let rows = &outcome.rows;
    let tta = Spread::of(rows.iter().map(|r| r.metrics.time_to_acknowledge_seconds));
    let ttr = Spread::of(rows.iter().map(|r| r.metrics.time_to_resolve_seconds));
    // Effort has no unknown state; zero means "could not be derived".
    let effort = Spread::of(
        rows.iter()
            .map(|r| Some(r.metrics.response_effort_seconds).filter(|s| *s > 0)),
    );
    let escalations: u64 = rows.iter().map(|r| u64::from(r.metrics.escalations)).sum();
    let auto_resolved = rows.iter().filter(|r| r.metrics.auto_resolved).count();

    let mut out = String::new();
    out.push_str("# Incident metrics summary\n\n");
    out.push_str(&format!("- Incidents reported: **{}**\n", rows.len()));
    out.push_str(&format!(
        "- Incidents skipped (unusable records): **{}**\n",
        outcome.skipped.len()
    ));
    out.push_str(&format!("- Total escalations: **{escalations}**\n"));
    out.push_str(&format!("- Auto-resolved: **{auto_resolved}**\n"));
    out.push_str(&format!("- Data warnings: **{}**\n\n", outcome.warning_count()));

    out.push_str("| Metric | Known | P50 | P90 |\n");
    out.push_str("|---|---:|---:|---:|\n");
    out.push_str(&tta.table_row("Time to acknowledge"));
    out.push_str(&ttr.table_row("Time to resolve"));
    out.push_str(&effort.table_row("Response effort (approx.)"));
    out
}
