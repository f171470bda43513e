use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{format_rfc3339, IncidentFilters, TimeWindow};
use crate::error::{codes, AppError};
use crate::pipeline::RunOutcome;

use super::ReportFileInfo;

pub const MANIFEST_VERSION: u32 = 1;

/// Provenance written next to a report: what was asked for, what came back,
/// and a digest of the report file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportManifest {
    pub manifest_version: u32,
    pub tool_version: String,
    pub git_commit: Option<String>,
    pub generated_at: String,
    pub since: String,
    pub until: String,
    pub filters: IncidentFilters,
    pub incident_count: usize,
    pub skipped_count: usize,
    pub warning_count: usize,
    pub files: Vec<ReportFileInfo>,
}

impl ReportManifest {
    pub fn new(
        tool_version: &str,
        git_commit: Option<&str>,
        generated_at: time::OffsetDateTime,
        window: &TimeWindow,
        filters: &IncidentFilters,
        outcome: &RunOutcome,
    ) -> Self {
        Self {
            manifest_version: MANIFEST_VERSION,
            tool_version: tool_version.to_string(),
            git_commit: git_commit.map(str::to_string),
            generated_at: format_rfc3339(generated_at),
            since: format_rfc3339(window.since()),
            until: format_rfc3339(window.until()),
            filters: filters.clone(),
            incident_count: outcome.rows.len(),
            skipped_count: outcome.skipped.len(),
            warning_count: outcome.warning_count(),
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: ReportFileInfo) -> Self {
        self.files.push(file);
        self
    }
}

pub fn write_manifest(path: &Path, manifest: &ReportManifest) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(manifest).map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to encode report manifest")
            .with_details(e.to_string())
    })?;
    fs::write(path, json + "\n").map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to write report manifest")
            .with_details(format!("path={}: {}", path.display(), e))
    })
}
