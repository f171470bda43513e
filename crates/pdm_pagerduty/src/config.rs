use std::fmt;

use pdm_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.pagerduty.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the REST API, passed explicitly to the client.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_token: String,
    /// Requester email sent as the `From` header.
    pub from_email: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl ApiConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.into(),
            from_email: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("pdm/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_from_email(mut self, from_email: impl Into<String>) -> Self {
        self.from_email = Some(from_email.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

// Hand-written so the token never reaches logs.
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn invalid(message: &str, base_url: &str) -> AppError {
    AppError::new(codes::CONFIG_INVALID, message).with_details(format!("base_url={base_url}"))
}

/// Normalize and check the API base URL.
///
/// Accepts `https://host[:port]`, or plain `http` only for `127.0.0.1`.
/// Paths, credentials, queries and fragments are rejected.
pub fn validate_base_url(raw: &str) -> Result<String, AppError> {
    let base_url = raw.trim().trim_end_matches('/');

    let authority = if let Some(rest) = base_url.strip_prefix("https://") {
        rest
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        if rest.split(':').next() != Some("127.0.0.1") {
            return Err(invalid(
                "Plain http is only allowed for 127.0.0.1",
                base_url,
            ));
        }
        rest
    } else {
        return Err(invalid("API base URL must use https", base_url));
    };

    if authority.is_empty() || authority.contains(&['/', '@', '?', '#'][..]) {
        return Err(invalid("API base URL must be scheme://host[:port]", base_url));
    }
    if let Some((host, port)) = authority.rsplit_once(':') {
        let port_ok = port.parse::<u16>().map(|p| p != 0).unwrap_or(false);
        if host.is_empty() || !port_ok {
            return Err(invalid("API base URL has an invalid port", base_url));
        }
    }

    Ok(base_url.to_string())
}

pub fn validate(config: &ApiConfig) -> Result<String, AppError> {
    if config.api_token.trim().is_empty() {
        return Err(AppError::new(
            codes::CONFIG_INVALID,
            "API token is required",
        ));
    }
    if config.timeout_secs == 0 {
        return Err(AppError::new(
            codes::CONFIG_INVALID,
            "Request timeout must be at least one second",
        ));
    }
    validate_base_url(&config.base_url)
}
