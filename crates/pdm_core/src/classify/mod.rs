//! Raw JSON records to typed values.
//!
//! Every field is read from one fixed path (see [`fields`]); there is no
//! probing of alternative field names. A present field of the wrong shape is
//! treated as absent and reported as a warning. The only fatal anomaly is an
//! incident without an identifier.

use serde_json::Value;

use crate::domain::{
    Actor, ActorKind, EmbeddedLifecycle, IncidentStatus, IncidentSummary, LogEntry, LogEntryKind,
    Urgency, ValidationWarning,
};
use crate::error::{codes, AppError};
use crate::normalize::timestamps::parse_instant;

/// Wire field paths, one per fact.
pub mod fields {
    pub const ENTRY_ID: &[&str] = &["id"];
    pub const ENTRY_TYPE: &[&str] = &["type"];
    pub const ENTRY_CREATED_AT: &[&str] = &["created_at"];
    pub const ENTRY_AGENT_TYPE: &[&str] = &["agent", "type"];
    pub const ENTRY_AGENT_NAME: &[&str] = &["agent", "summary"];
    pub const ENTRY_NOTE: &[&str] = &["channel", "content"];

    pub const INCIDENT_ID: &[&str] = &["id"];
    pub const INCIDENT_NUMBER: &[&str] = &["incident_number"];
    pub const INCIDENT_TITLE: &[&str] = &["title"];
    pub const INCIDENT_URGENCY: &[&str] = &["urgency"];
    pub const INCIDENT_STATUS: &[&str] = &["status"];
    pub const INCIDENT_CREATED_AT: &[&str] = &["created_at"];
    pub const INCIDENT_SERVICE: &[&str] = &["service", "summary"];
    pub const INCIDENT_PRIORITY: &[&str] = &["priority", "summary"];
    pub const INCIDENT_ASSIGNMENTS: &[&str] = &["assignments"];
    pub const ASSIGNMENT_NAME: &[&str] = &["assignee", "summary"];
    pub const INCIDENT_TRIGGERED_AT: &[&str] = &["first_trigger_log_entry", "created_at"];
    pub const INCIDENT_ACKNOWLEDGEMENTS: &[&str] = &["acknowledgements"];
    pub const ACKNOWLEDGEMENT_AT: &[&str] = &["at"];
    pub const INCIDENT_RESOLVED_AT: &[&str] = &["resolved_at"];
    pub const INCIDENT_LAST_STATUS_CHANGE_AT: &[&str] = &["last_status_change_at"];
}

const KIND_TABLE: [(&str, LogEntryKind); 5] = [
    ("annotate_log_entry", LogEntryKind::Annotate),
    ("acknowledge_log_entry", LogEntryKind::Acknowledge),
    ("assign_log_entry", LogEntryKind::Assign),
    ("escalate_log_entry", LogEntryKind::Escalate),
    ("resolve_log_entry", LogEntryKind::Resolve),
];

pub fn kind_from_tag(tag: &str) -> LogEntryKind {
    KIND_TABLE
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, k)| *k)
        .unwrap_or(LogEntryKind::Other)
}

fn at_path<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(raw, |v, key| v.get(key))
        .filter(|v| !v.is_null())
}

fn dotted(path: &[&str]) -> String {
    path.join(".")
}

fn wrong_type(path: &[&str], expected: &str, got: &Value) -> ValidationWarning {
    ValidationWarning::new(
        codes::PARSE_FIELD_WRONG_TYPE,
        format!("{} is not a {expected}; treated as absent", dotted(path)),
    )
    .with_details(format!("value={got}"))
}

fn str_at<'a>(
    raw: &'a Value,
    path: &[&str],
    warnings: &mut Vec<ValidationWarning>,
) -> Option<&'a str> {
    let v = at_path(raw, path)?;
    match v.as_str() {
        Some(s) => Some(s),
        None => {
            warnings.push(wrong_type(path, "string", v));
            None
        }
    }
}

fn array_at<'a>(
    raw: &'a Value,
    path: &[&str],
    warnings: &mut Vec<ValidationWarning>,
) -> &'a [Value] {
    let Some(v) = at_path(raw, path) else {
        return &[];
    };
    match v.as_array() {
        Some(items) => items.as_slice(),
        None => {
            warnings.push(wrong_type(path, "list", v));
            &[]
        }
    }
}

fn instant_at(
    raw: &Value,
    path: &[&str],
    warnings: &mut Vec<ValidationWarning>,
) -> Option<time::OffsetDateTime> {
    let s = str_at(raw, path, warnings)?;
    parse_instant(&dotted(path), s, warnings)
}

fn unrecognized(path: &[&str], value: &str) -> ValidationWarning {
    ValidationWarning::new(
        codes::PARSE_FIELD_UNRECOGNIZED,
        format!("Unrecognized {} value; treated as absent", dotted(path)),
    )
    .with_details(format!("value={value}"))
}

fn classify_actor(raw: &Value, warnings: &mut Vec<ValidationWarning>) -> Option<Actor> {
    let kind = ActorKind::from_wire(str_at(raw, fields::ENTRY_AGENT_TYPE, warnings)?)?;
    let Some(name) = str_at(raw, fields::ENTRY_AGENT_NAME, warnings) else {
        warnings.push(ValidationWarning::new(
            codes::PARSE_ACTOR_NAME_MISSING,
            "Log entry actor has no display name; treated as absent",
        ));
        return None;
    };
    Some(Actor {
        kind,
        name: name.to_string(),
    })
}

/// Classify one raw log entry. Never fails: unknown tags become
/// [`LogEntryKind::Other`] and malformed fields become absent.
pub fn classify_log_entry(raw: &Value, warnings: &mut Vec<ValidationWarning>) -> LogEntry {
    let raw_kind = str_at(raw, fields::ENTRY_TYPE, warnings).map(str::to_string);
    let kind = raw_kind
        .as_deref()
        .map(kind_from_tag)
        .unwrap_or(LogEntryKind::Other);

    let note = match kind {
        LogEntryKind::Annotate => Some(
            str_at(raw, fields::ENTRY_NOTE, warnings)
                .unwrap_or_default()
                .to_string(),
        ),
        _ => None,
    };

    LogEntry {
        id: str_at(raw, fields::ENTRY_ID, warnings).map(str::to_string),
        kind,
        raw_kind,
        at: instant_at(raw, fields::ENTRY_CREATED_AT, warnings),
        actor: classify_actor(raw, warnings),
        note,
    }
}

fn lifecycle(
    raw: &Value,
    status: Option<IncidentStatus>,
    warnings: &mut Vec<ValidationWarning>,
) -> EmbeddedLifecycle {
    let triggered_at = instant_at(raw, fields::INCIDENT_TRIGGERED_AT, warnings);

    let acknowledged_at = array_at(raw, fields::INCIDENT_ACKNOWLEDGEMENTS, warnings)
        .iter()
        .filter_map(|ack| instant_at(ack, fields::ACKNOWLEDGEMENT_AT, warnings))
        .collect();

    let mut resolved_at = Vec::new();
    resolved_at.extend(instant_at(raw, fields::INCIDENT_RESOLVED_AT, warnings));
    if status == Some(IncidentStatus::Resolved) {
        resolved_at.extend(instant_at(
            raw,
            fields::INCIDENT_LAST_STATUS_CHANGE_AT,
            warnings,
        ));
    }

    EmbeddedLifecycle {
        triggered_at,
        acknowledged_at,
        resolved_at,
    }
}

/// Parse one raw incident. Fails only when the identifier is missing, which
/// makes the incident unusable (its log cannot be fetched).
pub fn parse_incident(
    raw: &Value,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<IncidentSummary, AppError> {
    let id = str_at(raw, fields::INCIDENT_ID, warnings)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::new(
                codes::PARSE_INCIDENT_ID_MISSING,
                "Incident record has no identifier",
            )
            .with_details(format!(
                "incident_number={}",
                at_path(raw, fields::INCIDENT_NUMBER)
                    .map(Value::to_string)
                    .unwrap_or_else(|| "none".to_string())
            ))
        })?
        .to_string();

    let number = at_path(raw, fields::INCIDENT_NUMBER).and_then(|v| {
        let n = v.as_i64();
        if n.is_none() {
            warnings.push(wrong_type(fields::INCIDENT_NUMBER, "integer", v));
        }
        n
    });

    let urgency = str_at(raw, fields::INCIDENT_URGENCY, warnings).and_then(|s| {
        let u = Urgency::from_wire(s);
        if u.is_none() {
            warnings.push(unrecognized(fields::INCIDENT_URGENCY, s));
        }
        u
    });

    let status = str_at(raw, fields::INCIDENT_STATUS, warnings).and_then(|s| {
        let st = IncidentStatus::from_wire(s);
        if st.is_none() {
            warnings.push(unrecognized(fields::INCIDENT_STATUS, s));
        }
        st
    });

    let assignees = array_at(raw, fields::INCIDENT_ASSIGNMENTS, warnings)
        .iter()
        .filter_map(|a| str_at(a, fields::ASSIGNMENT_NAME, warnings))
        .map(str::to_string)
        .collect();

    Ok(IncidentSummary {
        id,
        number,
        title: str_at(raw, fields::INCIDENT_TITLE, warnings)
            .unwrap_or_default()
            .to_string(),
        urgency,
        status,
        created_at: instant_at(raw, fields::INCIDENT_CREATED_AT, warnings),
        service: str_at(raw, fields::INCIDENT_SERVICE, warnings).map(str::to_string),
        priority: str_at(raw, fields::INCIDENT_PRIORITY, warnings).map(str::to_string),
        assignees,
        lifecycle: lifecycle(raw, status, warnings),
    })
}
