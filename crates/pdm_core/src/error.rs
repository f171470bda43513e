use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes shared by the engine, the transport and the CLI.
pub mod codes {
    pub const FETCH_INVALID_RANGE: &str = "FETCH_INVALID_RANGE";
    pub const FETCH_INVALID_PAGE_SIZE: &str = "FETCH_INVALID_PAGE_SIZE";
    pub const FETCH_FAILED: &str = "FETCH_FAILED";
    pub const FETCH_HTTP_STATUS: &str = "FETCH_HTTP_STATUS";
    pub const FETCH_DECODE_FAILED: &str = "FETCH_DECODE_FAILED";
    pub const PARSE_INCIDENT_ID_MISSING: &str = "PARSE_INCIDENT_ID_MISSING";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const REPORT_WRITE_FAILED: &str = "REPORT_WRITE_FAILED";
    pub const REPORT_HASH_FAILED: &str = "REPORT_HASH_FAILED";

    // Warning codes. These never abort a run; they ride along on each row.
    pub const PARSE_TS_ASSUMED_UTC: &str = "PARSE_TS_ASSUMED_UTC";
    pub const PARSE_TS_UNPARSEABLE: &str = "PARSE_TS_UNPARSEABLE";
    pub const PARSE_FIELD_WRONG_TYPE: &str = "PARSE_FIELD_WRONG_TYPE";
    pub const PARSE_FIELD_UNRECOGNIZED: &str = "PARSE_FIELD_UNRECOGNIZED";
    pub const PARSE_ACTOR_NAME_MISSING: &str = "PARSE_ACTOR_NAME_MISSING";
    pub const METRICS_TS_ORDER_VIOLATION: &str = "METRICS_TS_ORDER_VIOLATION";
}

/// Single structured error shape used across the engine, the transport and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Page request failure. `params` is rendered `k=v` joined with `&` so the
    /// failing request can be replayed by hand.
    pub fn fetch(
        code: &str,
        endpoint: &str,
        params: &[(String, String)],
        cause: impl fmt::Display,
    ) -> Self {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        Self::new(code, format!("Page request to {endpoint} failed"))
            .with_details(format!("endpoint={endpoint}; params={query}; cause={cause}"))
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
