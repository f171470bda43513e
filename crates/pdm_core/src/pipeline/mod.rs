//! One report run: incidents, then each incident's full log, then metrics.
//!
//! Incidents are processed one at a time in fetch order. An incident's log
//! is fully paginated before classification starts, so aggregation always
//! sees the complete sequence. A fetch failure anywhere aborts the run.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{classify_log_entry, parse_incident};
use crate::domain::{IncidentFilters, IncidentSummary, MetricsRecord, TimeWindow, ValidationWarning};
use crate::error::AppError;
use crate::fetch::{fetch_incidents, fetch_log_entries, validate_page_size, PageSource, MAX_PAGE_SIZE};
use crate::metrics::compute_incident_metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub page_size: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentMetricsRow {
    pub incident: IncidentSummary,
    pub metrics: MetricsRecord,
    pub warnings: Vec<ValidationWarning>,
}

/// An incident record that could not be reported (no identifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedIncident {
    /// Position in the fetched incident sequence.
    pub position: usize,
    pub error: AppError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub rows: Vec<IncidentMetricsRow>,
    pub skipped: Vec<SkippedIncident>,
}

impl RunOutcome {
    pub fn warning_count(&self) -> usize {
        self.rows.iter().map(|r| r.warnings.len()).sum()
    }
}

pub fn collect_incident_metrics<S: PageSource + ?Sized>(
    source: &S,
    window: &TimeWindow,
    filters: &IncidentFilters,
    options: &RunOptions,
) -> Result<RunOutcome, AppError> {
    let page_size = validate_page_size(options.page_size)?;

    let raw_incidents = fetch_incidents(source, window, filters, page_size)?;
    info!(count = raw_incidents.len(), "fetched incidents");

    let mut outcome = RunOutcome::default();
    for (position, raw) in raw_incidents.iter().enumerate() {
        let mut warnings = Vec::new();
        let incident = match parse_incident(raw, &mut warnings) {
            Ok(i) => i,
            Err(error) => {
                warn!(position, error = %error, "skipping incident record");
                outcome.skipped.push(SkippedIncident { position, error });
                continue;
            }
        };

        let raw_entries = fetch_log_entries(source, &incident.id, page_size)?;
        let entries: Vec<_> = raw_entries
            .iter()
            .map(|e| classify_log_entry(e, &mut warnings))
            .collect();

        let (metrics, metric_warnings) = compute_incident_metrics(&incident, &entries);
        warnings.extend(metric_warnings);
        for w in &warnings {
            debug!(incident = %incident.id, code = %w.code, "{}", w.message);
        }

        outcome.rows.push(IncidentMetricsRow {
            incident,
            metrics,
            warnings,
        });
    }

    info!(
        reported = outcome.rows.len(),
        skipped = outcome.skipped.len(),
        warnings = outcome.warning_count(),
        "run complete"
    );
    Ok(outcome)
}
