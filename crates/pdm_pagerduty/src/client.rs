use std::fmt;
use std::time::Duration;

use pdm_core::domain::{format_rfc3339, IncidentFilters, TimeWindow};
use pdm_core::error::{codes, AppError};
use pdm_core::fetch::{Page, PageSource};
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;

pub const INCIDENTS_ENDPOINT: &str = "/incidents";
const INCIDENTS_KEY: &str = "incidents";
const LOG_ENTRIES_KEY: &str = "log_entries";
// Largest error body excerpt kept in error details.
const BODY_EXCERPT_CHARS: usize = 200;

/// Blocking REST client. One instance serves a whole report run; the
/// underlying agent reuses connections between page requests.
#[derive(Clone)]
pub struct PagerDutyClient {
    base_url: String,
    config: ApiConfig,
    agent: ureq::Agent,
}

impl PagerDutyClient {
    pub fn new(config: ApiConfig) -> Result<Self, AppError> {
        let base_url = crate::config::validate(&config)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Ok(Self {
            base_url,
            config,
            agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Headers sent on every request.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Accept", "application/json".to_string()),
            ("Content-Type", "application/json".to_string()),
            (
                "Authorization",
                format!("Token token={}", self.config.api_token),
            ),
        ];
        if let Some(from) = &self.config.from_email {
            headers.push(("From", from.clone()));
        }
        headers
    }

    fn get_page(
        &self,
        endpoint: &str,
        records_key: &str,
        params: Vec<(String, String)>,
    ) -> Result<Page, AppError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self.agent.get(&url);
        for (name, value) in self.headers() {
            req = req.set(name, &value);
        }
        for (k, v) in &params {
            req = req.query(k, v);
        }

        debug!(endpoint, ?params, "requesting page");
        let body: Value = match req.call() {
            Ok(resp) => resp.into_json().map_err(|e| {
                AppError::fetch(codes::FETCH_DECODE_FAILED, endpoint, &params, e)
            })?,
            Err(ureq::Error::Status(status, resp)) => {
                let excerpt: String = resp
                    .into_string()
                    .unwrap_or_default()
                    .chars()
                    .take(BODY_EXCERPT_CHARS)
                    .collect();
                return Err(AppError::fetch(
                    codes::FETCH_HTTP_STATUS,
                    endpoint,
                    &params,
                    format!("status={status}; body={excerpt}"),
                )
                .with_retryable(status == 429 || status >= 500));
            }
            Err(e) => {
                return Err(
                    AppError::fetch(codes::FETCH_FAILED, endpoint, &params, e).with_retryable(true)
                );
            }
        };

        page_from_body(body, records_key).map_err(|cause| {
            AppError::fetch(codes::FETCH_DECODE_FAILED, endpoint, &params, cause)
        })
    }
}

impl fmt::Debug for PagerDutyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerDutyClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn page_from_body(mut body: Value, records_key: &str) -> Result<Page, String> {
    let records = match body.get_mut(records_key).map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(other) => return Err(format!("`{records_key}` is not a list: {other}")),
        None => return Err(format!("response has no `{records_key}` field")),
    };
    let more = body.get("more").and_then(Value::as_bool).unwrap_or(false);
    Ok(Page { records, more })
}

/// Query parameters for one incident page, sorted oldest first.
pub fn incident_query(
    window: &TimeWindow,
    filters: &IncidentFilters,
    offset: u32,
    limit: u32,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("since".to_string(), format_rfc3339(window.since())),
        ("until".to_string(), format_rfc3339(window.until())),
        ("sort_by".to_string(), "created_at:asc".to_string()),
        ("time_zone".to_string(), "UTC".to_string()),
        (
            "include[]".to_string(),
            "first_trigger_log_entries".to_string(),
        ),
    ];
    params.extend(
        filters
            .statuses
            .iter()
            .map(|s| ("statuses[]".to_string(), s.as_str().to_string())),
    );
    params.extend(
        filters
            .team_ids
            .iter()
            .map(|t| ("team_ids[]".to_string(), t.clone())),
    );
    params.extend(
        filters
            .service_ids
            .iter()
            .map(|s| ("service_ids[]".to_string(), s.clone())),
    );
    params.push(("offset".to_string(), offset.to_string()));
    params.push(("limit".to_string(), limit.to_string()));
    params
}

pub fn log_entry_query(offset: u32, limit: u32) -> Vec<(String, String)> {
    vec![
        ("is_overview".to_string(), "false".to_string()),
        ("offset".to_string(), offset.to_string()),
        ("limit".to_string(), limit.to_string()),
    ]
}

/// Incident IDs are normally alphanumeric; anything else is percent-encoded
/// so it stays inside one path segment.
pub fn log_entries_endpoint(incident_id: &str) -> String {
    format!(
        "/incidents/{}/log_entries",
        urlencoding::encode(incident_id)
    )
}

impl PageSource for PagerDutyClient {
    fn fetch_incident_page(
        &self,
        window: &TimeWindow,
        filters: &IncidentFilters,
        offset: u32,
        limit: u32,
    ) -> Result<Page, AppError> {
        self.get_page(
            INCIDENTS_ENDPOINT,
            INCIDENTS_KEY,
            incident_query(window, filters, offset, limit),
        )
    }

    fn fetch_log_entry_page(
        &self,
        incident_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page, AppError> {
        self.get_page(
            &log_entries_endpoint(incident_id),
            LOG_ENTRIES_KEY,
            log_entry_query(offset, limit),
        )
    }
}
