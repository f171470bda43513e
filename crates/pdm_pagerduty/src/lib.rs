pub mod client;
pub mod config;

pub use client::PagerDutyClient;
pub use config::ApiConfig;
