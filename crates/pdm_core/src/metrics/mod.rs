use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::domain::{
    format_rfc3339, Actor, ActorKind, IncidentSummary, LogEntry, LogEntryKind, MetricsRecord,
    ValidationWarning,
};
use crate::error::codes;

fn diff_seconds(a: OffsetDateTime, b: OffsetDateTime) -> Option<i64> {
    let secs = (b - a).whole_seconds();
    if secs < 0 {
        None
    } else {
        Some(secs)
    }
}

fn compute_pair(
    a_field: &str,
    a: Option<OffsetDateTime>,
    b_field: &str,
    b: Option<OffsetDateTime>,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<i64> {
    let (Some(a), Some(b)) = (a, b) else {
        return None;
    };
    match diff_seconds(a, b) {
        Some(s) => Some(s),
        None => {
            warnings.push(
                ValidationWarning::new(
                    codes::METRICS_TS_ORDER_VIOLATION,
                    format!("Cannot compute metric: {a_field} must be <= {b_field}"),
                )
                .with_details(format!(
                    "{a_field}={}; {b_field}={}",
                    format_rfc3339(a),
                    format_rfc3339(b)
                )),
            );
            None
        }
    }
}

/// Facts accumulated in one pass over the log, in the order received.
#[derive(Debug, Default)]
struct LogTally {
    notes: Vec<String>,
    resolver: Option<Actor>,
    responders: BTreeSet<String>,
    escalations: u32,
    first_assignment_at: Option<OffsetDateTime>,
    last_assignment_at: Option<OffsetDateTime>,
}

impl LogTally {
    fn fold(entries: &[LogEntry]) -> Self {
        let mut tally = Self::default();
        for entry in entries {
            match entry.kind {
                LogEntryKind::Annotate => {
                    tally.notes.push(entry.note.clone().unwrap_or_default());
                }
                LogEntryKind::Resolve => {
                    // Last resolve entry in sequence order wins, even over an earlier-timestamped
                    // one. An entry without a usable actor leaves the resolver untouched.
                    if let Some(actor) = &entry.actor {
                        tally.resolver = Some(actor.clone());
                    }
                }
                LogEntryKind::Acknowledge => tally.add_responder(entry),
                LogEntryKind::Assign => {
                    tally.add_responder(entry);
                    if let Some(at) = entry.at {
                        if tally.first_assignment_at.is_none() {
                            tally.first_assignment_at = Some(at);
                        } else {
                            tally.last_assignment_at = Some(at);
                        }
                    }
                }
                LogEntryKind::Escalate => tally.escalations += 1,
                LogEntryKind::Other => {}
            }
        }
        tally
    }

    fn add_responder(&mut self, entry: &LogEntry) {
        if let Some(actor) = entry.actor.as_ref().filter(|a| a.is_human()) {
            self.responders.insert(actor.name.clone());
        }
    }
}

/// Fold one incident and its log into a [`MetricsRecord`].
///
/// Lifecycle timestamps come only from the incident's embedded sub-objects:
/// trigger as given, acknowledgement as the earliest candidate, resolution as
/// the latest. The log supplies notes, resolver, responders, escalations and
/// the first assignment time. Durations that would be negative stay unknown
/// and produce a `METRICS_TS_ORDER_VIOLATION` warning.
///
/// Pure: the same inputs always produce the same record.
pub fn compute_incident_metrics(
    incident: &IncidentSummary,
    entries: &[LogEntry],
) -> (MetricsRecord, Vec<ValidationWarning>) {
    let mut warnings = Vec::new();

    let triggered = incident.lifecycle.triggered_at;
    let acknowledged = incident.lifecycle.acknowledged_at.iter().min().copied();
    let resolved = incident.lifecycle.resolved_at.iter().max().copied();

    let time_to_acknowledge_seconds = compute_pair(
        "triggered_at",
        triggered,
        "acknowledged_at",
        acknowledged,
        &mut warnings,
    );
    let time_to_resolve_seconds = compute_pair(
        "triggered_at",
        triggered,
        "resolved_at",
        resolved,
        &mut warnings,
    );

    let tally = LogTally::fold(entries);

    let effort = match (tally.first_assignment_at, resolved, acknowledged) {
        (Some(assigned), Some(r), _) => compute_pair(
            "first_assignment_at",
            Some(assigned),
            "resolved_at",
            Some(r),
            &mut warnings,
        ),
        (Some(assigned), None, Some(a)) if !incident.is_resolved() => compute_pair(
            "first_assignment_at",
            Some(assigned),
            "acknowledged_at",
            Some(a),
            &mut warnings,
        ),
        _ => None,
    };

    let (resolved_by, auto_resolved) = match tally.resolver {
        Some(actor) => {
            let auto = actor.kind == ActorKind::Integration;
            (Some(actor.name), auto)
        }
        None => (None, false),
    };

    (
        MetricsRecord {
            notes: tally.notes,
            resolved_by,
            auto_resolved,
            responders: tally.responders,
            acknowledged_at: acknowledged,
            resolved_at: resolved,
            time_to_acknowledge_seconds,
            time_to_resolve_seconds,
            response_effort_seconds: effort.unwrap_or(0),
            escalations: tally.escalations,
        },
        warnings,
    )
}
