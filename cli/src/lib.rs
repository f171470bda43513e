use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use pdm_core::domain::{format_rfc3339, IncidentFilters, IncidentStatus, TimeWindow};
use pdm_core::error::{codes, AppError};
use pdm_core::fetch::MAX_PAGE_SIZE;
use pdm_core::pipeline::{collect_incident_metrics, RunOptions};
use pdm_core::report::manifest::{write_manifest, ReportManifest};
use pdm_core::report::{generate_run_summary, write_report_file, ReportFormat};
use pdm_pagerduty::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use pdm_pagerduty::{ApiConfig, PagerDutyClient};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

pub const DEFAULT_LOG_FILTER: &str = "pdmetrics=info,pdm_core=info,pdm_pagerduty=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Triggered,
    Acknowledged,
    Resolved,
}

impl From<StatusArg> for IncidentStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Triggered => IncidentStatus::Triggered,
            StatusArg::Acknowledged => IncidentStatus::Acknowledged,
            StatusArg::Resolved => IncidentStatus::Resolved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Csv => ReportFormat::Csv,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

/// Fetch incidents and their logs, derive per-incident metrics, write a report.
#[derive(Parser, Debug)]
#[command(name = "pdmetrics", version)]
pub struct Args {
    /// REST API key
    #[arg(long, env = "PAGERDUTY_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Requester email sent as the `From` header
    #[arg(long, env = "PAGERDUTY_FROM")]
    pub from: Option<String>,

    #[arg(long, env = "PAGERDUTY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Window start (RFC3339). Defaults to `--days` before `--until`.
    #[arg(long, value_parser = parse_rfc3339)]
    pub since: Option<OffsetDateTime>,

    /// Window end (RFC3339). Defaults to now.
    #[arg(long, value_parser = parse_rfc3339)]
    pub until: Option<OffsetDateTime>,

    /// Window length in days when `--since` is omitted
    #[arg(long, default_value_t = 1)]
    pub days: u32,

    /// Team ID filter (repeatable)
    #[arg(long = "team", value_name = "TEAM_ID")]
    pub teams: Vec<String>,

    /// Service ID filter (repeatable)
    #[arg(long = "service", value_name = "SERVICE_ID")]
    pub services: Vec<String>,

    /// Status filter (repeatable)
    #[arg(long = "status", value_enum, default_values_t = [StatusArg::Resolved])]
    pub statuses: Vec<StatusArg>,

    /// Report incidents in any status
    #[arg(long, conflicts_with = "statuses")]
    pub all_statuses: bool,

    #[arg(long, default_value_t = MAX_PAGE_SIZE)]
    pub page_size: u32,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, short = 'o', default_value = "pagerduty_incidents_with_metrics.csv")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
    pub format: FormatArg,

    /// Also write `<output>.manifest.json` with window, counts and digest
    #[arg(long)]
    pub manifest: bool,
}

fn parse_rfc3339(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| format!("expected RFC3339 timestamp: {e}"))
}

pub fn resolve_window(args: &Args, now: OffsetDateTime) -> Result<TimeWindow, AppError> {
    let until = args.until.unwrap_or(now);
    match args.since {
        Some(since) => TimeWindow::new(since, until),
        None => TimeWindow::trailing_days(until, args.days),
    }
}

pub fn filters_from_args(args: &Args) -> IncidentFilters {
    let statuses = if args.all_statuses {
        Vec::new()
    } else {
        let mut s: Vec<IncidentStatus> = args.statuses.iter().map(|s| (*s).into()).collect();
        s.sort();
        s.dedup();
        s
    };
    IncidentFilters {
        team_ids: args.teams.clone(),
        service_ids: args.services.clone(),
        statuses,
    }
}

pub fn api_config(args: &Args) -> ApiConfig {
    let config = ApiConfig::new(args.api_key.clone())
        .with_base_url(args.base_url.clone())
        .with_timeout_secs(args.timeout_secs);
    match &args.from {
        Some(from) => config.with_from_email(from.clone()),
        None => config,
    }
}

pub fn manifest_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report".into());
    name.push(".manifest.json");
    output.with_file_name(name)
}

pub fn run(args: &Args) -> Result<(), AppError> {
    let now = OffsetDateTime::now_utc();
    let window = resolve_window(args, now)?;
    let filters = filters_from_args(args);
    let client = PagerDutyClient::new(api_config(args))?;

    info!(
        since = %format_rfc3339(window.since()),
        until = %format_rfc3339(window.until()),
        base_url = client.base_url(),
        "starting report run"
    );
    let outcome = collect_incident_metrics(
        &client,
        &window,
        &filters,
        &RunOptions {
            page_size: args.page_size,
        },
    )?;

    let file = write_report_file(&args.output, &outcome.rows, args.format.into())?;
    info!(path = %args.output.display(), bytes = file.bytes, "report written");

    if args.manifest {
        let path = manifest_path(&args.output);
        let manifest = ReportManifest::new(
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_COMMIT_HASH"),
            now,
            &window,
            &filters,
            &outcome,
        )
        .with_file(file);
        write_manifest(&path, &manifest)?;
        info!(path = %path.display(), "manifest written");
    }

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(generate_run_summary(&outcome).as_bytes())
        .map_err(|e| {
            AppError::new(codes::REPORT_WRITE_FAILED, "Failed to print run summary")
                .with_details(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["pdmetrics", "--api-key", "k"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("args")
    }

    #[test]
    fn defaults_match_the_daily_resolved_report() {
        let args = parse(&[]);
        let now = datetime!(2026-05-02 08:00 UTC);
        let window = resolve_window(&args, now).expect("window");
        assert_eq!(window.since(), datetime!(2026-05-01 08:00 UTC));
        assert_eq!(window.until(), now);
        assert_eq!(filters_from_args(&args).statuses, vec![IncidentStatus::Resolved]);
        assert_eq!(args.page_size, MAX_PAGE_SIZE);
        assert_eq!(args.format, FormatArg::Csv);
    }

    #[test]
    fn explicit_window_is_validated() {
        let args = parse(&[
            "--since",
            "2026-05-02T00:00:00Z",
            "--until",
            "2026-05-01T00:00:00Z",
        ]);
        let err = resolve_window(&args, OffsetDateTime::now_utc()).unwrap_err();
        assert_eq!(err.code, codes::FETCH_INVALID_RANGE);
    }

    #[test]
    fn malformed_timestamps_are_rejected_by_the_parser() {
        let argv = ["pdmetrics", "--api-key", "k", "--since", "yesterday"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn repeated_filters_accumulate() {
        let args = parse(&[
            "--team", "PT1", "--team", "PT2", "--service", "PS1", "--status", "triggered",
            "--status", "acknowledged", "--status", "triggered",
        ]);
        let filters = filters_from_args(&args);
        assert_eq!(filters.team_ids, vec!["PT1".to_string(), "PT2".to_string()]);
        assert_eq!(filters.service_ids, vec!["PS1".to_string()]);
        assert_eq!(
            filters.statuses,
            vec![IncidentStatus::Triggered, IncidentStatus::Acknowledged]
        );
    }

    #[test]
    fn all_statuses_clears_the_status_filter() {
        let args = parse(&["--all-statuses"]);
        assert!(filters_from_args(&args).statuses.is_empty());
    }

    #[test]
    fn manifest_sits_next_to_the_report() {
        assert_eq!(
            manifest_path(Path::new("out/report.csv")),
            PathBuf::from("out/report.csv.manifest.json")
        );
    }

    #[test]
    fn config_carries_optional_from() {
        let args = parse(&["--from", "oncall@example.com", "--base-url", "http://127.0.0.1:9"]);
        let config = api_config(&args);
        assert_eq!(config.from_email.as_deref(), Some("oncall@example.com"));
        assert_eq!(config.base_url, "http://127.0.0.1:9");
    }
}
