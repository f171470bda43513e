use std::collections::BTreeSet;

use serde::{Deserialize, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{codes, AppError};

/// Rendered in place of any value that is unknown or unset.
pub const NOT_AVAILABLE: &str = "N/A";
/// Separator between annotation notes in a serialized report cell.
pub const NOTE_SEPARATOR: &str = "\n--- NOTE ---\n";
/// Separator between names in list-valued report cells (responders, assignees).
pub const LIST_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    High,
}

impl Urgency {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl IncidentStatus {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "triggered" => Some(Self::Triggered),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

/// Inclusive reporting window. Construction rejects `since > until`, so a
/// `TimeWindow` that exists is always valid to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    since: OffsetDateTime,
    until: OffsetDateTime,
}

impl TimeWindow {
    pub fn new(since: OffsetDateTime, until: OffsetDateTime) -> Result<Self, AppError> {
        if since > until {
            return Err(AppError::new(
                codes::FETCH_INVALID_RANGE,
                "Report window start must not be after its end",
            )
            .with_details(format!(
                "since={}; until={}",
                format_rfc3339(since),
                format_rfc3339(until)
            )));
        }
        Ok(Self { since, until })
    }

    /// Window of `days` whole days ending at `until`.
    pub fn trailing_days(until: OffsetDateTime, days: u32) -> Result<Self, AppError> {
        let since = until
            .checked_sub(time::Duration::days(i64::from(days)))
            .ok_or_else(|| {
                AppError::new(codes::FETCH_INVALID_RANGE, "Report window is out of range")
                    .with_details(format!("days={days}"))
            })?;
        Self::new(since, until)
    }

    pub fn since(&self) -> OffsetDateTime {
        self.since
    }

    pub fn until(&self) -> OffsetDateTime {
        self.until
    }
}

/// Incident query filters. An empty set means "no filter on that dimension".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFilters {
    pub team_ids: Vec<String>,
    pub service_ids: Vec<String>,
    pub statuses: Vec<IncidentStatus>,
}

/// Lifecycle timestamps the remote service embeds directly in an incident.
/// These are authoritative over anything reconstructed from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddedLifecycle {
    #[serde(with = "time::serde::rfc3339::option")]
    pub triggered_at: Option<OffsetDateTime>,
    #[serde(serialize_with = "serialize_instants")]
    pub acknowledged_at: Vec<OffsetDateTime>,
    #[serde(serialize_with = "serialize_instants")]
    pub resolved_at: Vec<OffsetDateTime>,
}

/// One incident as fetched for a report run. Read-only once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentSummary {
    pub id: String,
    pub number: Option<i64>,
    pub title: String,
    pub urgency: Option<Urgency>,
    pub status: Option<IncidentStatus>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    pub service: Option<String>,
    pub priority: Option<String>,
    pub assignees: Vec<String>,
    pub lifecycle: EmbeddedLifecycle,
}

impl IncidentSummary {
    pub fn is_resolved(&self) -> bool {
        self.status == Some(IncidentStatus::Resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    User,
    Integration,
}

impl ActorKind {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "user_reference" => Some(Self::User),
            "integration_reference" => Some(Self::Integration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    pub name: String,
}

impl Actor {
    pub fn is_human(&self) -> bool {
        self.kind == ActorKind::User
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    Annotate,
    Acknowledge,
    Assign,
    Escalate,
    Resolve,
    Other,
}

/// One classified event from an incident's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: Option<String>,
    pub kind: LogEntryKind,
    /// Tag exactly as received; kept so `Other` entries stay auditable.
    pub raw_kind: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub at: Option<OffsetDateTime>,
    pub actor: Option<Actor>,
    /// Set only for `Annotate` entries (empty when the content field is missing).
    pub note: Option<String>,
}

/// Derived reliability metrics for one incident.
///
/// `response_effort_seconds` is an approximation (first assignment to
/// resolution, or to acknowledgement while unresolved), not a work log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsRecord {
    pub notes: Vec<String>,
    pub resolved_by: Option<String>,
    pub auto_resolved: bool,
    pub responders: BTreeSet<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub acknowledged_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
    pub time_to_acknowledge_seconds: Option<i64>,
    pub time_to_resolve_seconds: Option<i64>,
    pub response_effort_seconds: i64,
    pub escalations: u32,
}

impl MetricsRecord {
    pub fn notes_joined(&self) -> String {
        self.notes.join(NOTE_SEPARATOR)
    }

    /// Responders in lexicographic order.
    pub fn responders_joined(&self) -> String {
        self.responders
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR)
    }

    pub fn resolved_by_label(&self) -> &str {
        self.resolved_by.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// RFC3339 rendering that cannot fail for in-range instants; falls back to
/// the `Display` form otherwise.
pub fn format_rfc3339(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

fn serialize_instants<S: Serializer>(
    values: &[OffsetDateTime],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| format_rfc3339(*v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn window_rejects_inverted_range() {
        let err = TimeWindow::new(
            datetime!(2026-01-02 00:00 UTC),
            datetime!(2026-01-01 00:00 UTC),
        )
        .unwrap_err();
        assert_eq!(err.code, codes::FETCH_INVALID_RANGE);

        let same = datetime!(2026-01-01 00:00 UTC);
        assert!(TimeWindow::new(same, same).is_ok());
    }

    #[test]
    fn trailing_days_ends_at_until() {
        let until = datetime!(2026-03-10 12:00 UTC);
        let w = TimeWindow::trailing_days(until, 7).expect("window");
        assert_eq!(w.since(), datetime!(2026-03-03 12:00 UTC));
        assert_eq!(w.until(), until);
    }

    #[test]
    fn responders_serialize_sorted() {
        let mut m = MetricsRecord::default();
        m.responders.insert("zoe".to_string());
        m.responders.insert("Adam".to_string());
        m.responders.insert("bob".to_string());
        assert_eq!(m.responders_joined(), "Adam, bob, zoe");
        assert_eq!(m.resolved_by_label(), NOT_AVAILABLE);
    }
}
