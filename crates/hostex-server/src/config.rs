use std::{path::PathBuf, time::Duration};

use clap::Parser;
use hostex_common::error::{HostexError, Result};

use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "hostex", about = "Host performance counter exporter", version)]
pub struct Cli {
    #[arg(
        long = "telemetry.addr",
        env = "HOSTEX_TELEMETRY_ADDR",
        default_value = "0.0.0.0:9182"
    )]
    pub listen_addr: String,

    #[arg(
        long = "telemetry.path",
        env = "HOSTEX_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    pub metrics_path: String,

    /// Concurrent scrapes served before answering 503.
    #[arg(long = "telemetry.max-requests", env = "HOSTEX_MAX_REQUESTS", default_value_t = 5)]
    pub max_requests: usize,

    /// Comma-separated collector names; `[defaults]` stands for all of them.
    #[arg(
        long = "collectors.enabled",
        env = "HOSTEX_COLLECTORS_ENABLED",
        value_delimiter = ',',
        default_value = "[defaults]"
    )]
    pub enabled_collectors: Vec<String>,

    /// List the available collectors and exit.
    #[arg(long = "collectors.print", default_value_t = false)]
    pub print_collectors: bool,

    /// Scrape timeout in seconds when Prometheus does not send one.
    #[arg(long = "scrape.timeout", env = "HOSTEX_SCRAPE_TIMEOUT", default_value_t = 10.0)]
    pub scrape_timeout: f64,

    /// Seconds subtracted from the Prometheus scrape timeout.
    #[arg(
        long = "scrape.timeout-margin",
        env = "HOSTEX_SCRAPE_TIMEOUT_MARGIN",
        default_value_t = 0.5
    )]
    pub timeout_margin: f64,

    #[arg(long = "scrape.channel-capacity", default_value_t = 1024)]
    pub channel_capacity: usize,

    /// Directory of `<class>.json` counter tables.
    #[arg(long = "source.snapshot-dir", env = "HOSTEX_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<PathBuf>,

    #[arg(long = "metrics.namespace", default_value = "windows")]
    pub namespace: String,

    #[arg(long = "log.level", env = "HOSTEX_LOG_LEVEL", default_value = "hostex=info")]
    pub log_level: String,

    #[arg(long = "log.format", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_addr: String,
    pub metrics_path: String,
    pub max_requests: usize,
    pub enabled_collectors: Vec<String>,
    pub scrape_timeout: Duration,
    pub timeout_margin: Duration,
    pub channel_capacity: usize,
    pub snapshot_dir: Option<PathBuf>,
    pub namespace: String,
}

impl TryFrom<&Cli> for ExporterConfig {
    type Error = HostexError;

    fn try_from(cli: &Cli) -> Result<Self> {
        if !cli.metrics_path.starts_with('/')
            || matches!(cli.metrics_path.as_str(), "/" | "/health")
        {
            return Err(HostexError::InvalidArgument(format!(
                "telemetry.path must start with '/' and must not clash with / or /health: {}",
                cli.metrics_path
            )));
        }
        if cli.max_requests == 0 {
            return Err(HostexError::InvalidArgument(
                "telemetry.max-requests must be at least 1".to_string(),
            ));
        }
        if cli.channel_capacity == 0 {
            return Err(HostexError::InvalidArgument(
                "scrape.channel-capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            listen_addr: cli.listen_addr.clone(),
            metrics_path: cli.metrics_path.clone(),
            max_requests: cli.max_requests,
            enabled_collectors: cli.enabled_collectors.clone(),
            scrape_timeout: positive_seconds("scrape.timeout", cli.scrape_timeout)?,
            timeout_margin: non_negative_seconds("scrape.timeout-margin", cli.timeout_margin)?,
            channel_capacity: cli.channel_capacity,
            snapshot_dir: cli.snapshot_dir.clone(),
            namespace: cli.namespace.clone(),
        })
    }
}

fn positive_seconds(flag: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(HostexError::InvalidArgument(format!(
            "{flag} must be a positive number of seconds"
        )));
    }
    Ok(Duration::from_secs_f64(value))
}

fn non_negative_seconds(flag: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(HostexError::InvalidArgument(format!(
            "{flag} must not be negative"
        )));
    }
    Ok(Duration::from_secs_f64(value))
}
