use time::format_description::well_known::Rfc3339;
use time::{format_description, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::domain::ValidationWarning;
use crate::error::codes;

// Timezone-less forms seen in exported or hand-edited payloads. Interpreted as UTC.
const ASSUME_UTC_FORMATS: [&str; 4] = [
    "[year]-[month]-[day]T[hour]:[minute]:[second]",
    "[year]-[month]-[day] [hour]:[minute]:[second]",
    "[year]-[month]-[day]T[hour]:[minute]",
    "[year]-[month]-[day] [hour]:[minute]",
];

fn parse_primitive_assume_utc(raw: &str, fmt: &str) -> Option<OffsetDateTime> {
    let items = format_description::parse(fmt).ok()?;
    PrimitiveDateTime::parse(raw, &items)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Parse a remote timestamp into a UTC instant.
///
/// RFC3339 is the expected wire form. A small allowlist of timezone-less ISO
/// forms is accepted as UTC with a `PARSE_TS_ASSUMED_UTC` warning. Anything
/// else yields `None` plus a `PARSE_TS_UNPARSEABLE` warning; an unparseable
/// timestamp only ever removes that one fact.
pub fn parse_instant(
    field: &str,
    raw: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(dt.to_offset(UtcOffset::UTC));
    }

    for fmt in ASSUME_UTC_FORMATS {
        if let Some(dt) = parse_primitive_assume_utc(trimmed, fmt) {
            warnings.push(
                ValidationWarning::new(
                    codes::PARSE_TS_ASSUMED_UTC,
                    format!("Assumed UTC timezone for {field}"),
                )
                .with_details(format!("value={trimmed}")),
            );
            return Some(dt);
        }
    }

    warnings.push(
        ValidationWarning::new(
            codes::PARSE_TS_UNPARSEABLE,
            format!("Unparseable timestamp for {field}; treated as absent"),
        )
        .with_details(format!("value={trimmed}")),
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rfc3339_offsets_are_normalized_to_utc() {
        let mut warnings = Vec::new();
        let got = parse_instant("created_at", "2026-01-01T09:30:00+09:00", &mut warnings);
        assert_eq!(got, Some(datetime!(2026-01-01 00:30 UTC)));
        assert_eq!(got.map(|d| d.offset()), Some(UtcOffset::UTC));
        assert!(warnings.is_empty());
    }

    #[test]
    fn naive_timestamps_assume_utc_with_warning() {
        let mut warnings = Vec::new();
        let got = parse_instant("created_at", "2026-01-01 10:00:00", &mut warnings);
        assert_eq!(got, Some(datetime!(2026-01-01 10:00 UTC)));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, codes::PARSE_TS_ASSUMED_UTC);
    }

    #[test]
    fn garbage_is_absent_not_fatal() {
        let mut warnings = Vec::new();
        assert_eq!(parse_instant("at", "yesterday-ish", &mut warnings), None);
        assert_eq!(warnings[0].code, codes::PARSE_TS_UNPARSEABLE);

        let mut warnings = Vec::new();
        assert_eq!(parse_instant("at", "   ", &mut warnings), None);
        assert!(warnings.is_empty());
    }
}
