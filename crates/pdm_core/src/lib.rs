//! Incident reliability metrics: paginated retrieval of incidents and their
//! event logs, event classification, and per-incident metric derivation.
//!
//! Network access lives behind [`fetch::PageSource`]; this crate never opens
//! a connection itself.

pub mod classify;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod report;

#[cfg(test)]
mod tests {
    use super::error::{codes, AppError};

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new(codes::FETCH_FAILED, "fetch failed").with_retryable(true);
        assert_eq!(err.code, "FETCH_FAILED");
        assert_eq!(err.message, "fetch failed");
        assert!(err.retryable);
        assert!(err.is(codes::FETCH_FAILED));
    }

    #[test]
    fn fetch_error_carries_request_context() {
        let params = vec![
            ("offset".to_string(), "200".to_string()),
            ("limit".to_string(), "100".to_string()),
        ];
        let err = AppError::fetch(codes::FETCH_HTTP_STATUS, "/incidents", &params, "status=502");
        assert_eq!(
            err.details.as_deref(),
            Some("endpoint=/incidents; params=offset=200&limit=100; cause=status=502")
        );
        assert_eq!(
            err.to_string(),
            "[FETCH_HTTP_STATUS] Page request to /incidents failed (endpoint=/incidents; params=offset=200&limit=100; cause=status=502)"
        );
    }
}
