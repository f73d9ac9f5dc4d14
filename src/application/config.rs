use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;

use crate::dispatch::RetryPolicy;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "atrium-core",
    version,
    about = "Atrium Core (realtime hub, webhook dispatcher, reminder engine, resource catalog)"
)]
pub struct Args {
    #[arg(long, env = "ATRIUM_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "ATRIUM_PORT", default_value_t = 18990)]
    pub port: u16,

    /// Token resolving to the built-in admin principal.
    #[arg(long, env = "ATRIUM_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    #[arg(long, env = "ATRIUM_DB_PATH", default_value = "./.atrium-core/atrium.db")]
    pub db_path: PathBuf,

    #[arg(long, env = "ATRIUM_SWEEP_INTERVAL_MS", default_value_t = 60_000)]
    pub sweep_interval_ms: u64,

    #[arg(long, env = "ATRIUM_SWEEP_ENABLED", default_value_t = true)]
    pub sweep_enabled: bool,

    #[arg(long, env = "ATRIUM_WEBHOOK_TIMEOUT_MS", default_value_t = 10_000)]
    pub webhook_timeout_ms: u64,

    #[arg(long, env = "ATRIUM_WEBHOOK_MAX_RETRIES", default_value_t = 3)]
    pub webhook_max_retries: u32,

    #[arg(long, env = "ATRIUM_WEBHOOK_BACKOFF_MS", default_value_t = 1_000)]
    pub webhook_backoff_ms: u64,

    #[arg(long, env = "ATRIUM_WEBHOOK_BACKOFF_FACTOR", default_value_t = 2)]
    pub webhook_backoff_factor: u32,

    /// Refuse non-https subscription URLs. Disable only in development
    /// against local receivers.
    #[arg(long, env = "ATRIUM_WEBHOOK_REQUIRE_HTTPS", default_value_t = true)]
    pub webhook_require_https: bool,

    #[arg(long, env = "ATRIUM_SIGNUP_MAX_ATTEMPTS", default_value_t = 3)]
    pub signup_max_attempts: u32,

    #[arg(long, env = "ATRIUM_SIGNUP_WINDOW_MS", default_value_t = 60_000)]
    pub signup_window_ms: u64,

    #[arg(long, env = "ATRIUM_ACTIVITY_PAGE_SIZE", default_value_t = 100)]
    pub activity_page_size: usize,

    #[arg(long, env = "ATRIUM_RUNTIME_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub runtime_version: String,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,

    #[arg(long, env = "ATRIUM_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: IpAddr,
    pub port: u16,
    pub admin_token: Option<String>,
    pub db_path: PathBuf,
    pub sweep_interval: Duration,
    pub sweep_enabled: bool,
    pub webhook_retry: RetryPolicy,
    pub webhook_require_https: bool,
    pub signup_max_attempts: u32,
    pub signup_window: Duration,
    pub activity_page_size: usize,
    pub runtime_version: String,
    pub log_filter: String,
    pub json_logs: bool,
}

impl RuntimeConfig {
    pub fn from_args(args: Args) -> Result<Self, String> {
        if args.port == 0 {
            return Err("port must be greater than 0".to_owned());
        }
        if args.sweep_interval_ms == 0 {
            return Err("sweep_interval_ms must be greater than 0".to_owned());
        }
        if args.webhook_backoff_factor == 0 {
            return Err("webhook_backoff_factor must be greater than 0".to_owned());
        }
        if args.signup_max_attempts == 0 {
            return Err("signup_max_attempts must be greater than 0".to_owned());
        }
        if args.activity_page_size == 0 {
            return Err("activity_page_size must be greater than 0".to_owned());
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            admin_token: normalize_secret(args.admin_token),
            db_path: args.db_path,
            sweep_interval: Duration::from_millis(args.sweep_interval_ms),
            sweep_enabled: args.sweep_enabled,
            webhook_retry: RetryPolicy {
                max_retries: args.webhook_max_retries,
                backoff_base: Duration::from_millis(args.webhook_backoff_ms),
                backoff_factor: args.webhook_backoff_factor,
                request_timeout: Duration::from_millis(args.webhook_timeout_ms),
            },
            webhook_require_https: args.webhook_require_https,
            signup_max_attempts: args.signup_max_attempts,
            signup_window: Duration::from_millis(args.signup_window_ms),
            activity_page_size: args.activity_page_size,
            runtime_version: args.runtime_version,
            log_filter: args.log_filter,
            json_logs: args.json_logs,
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    #[must_use]
    pub fn for_test(host: IpAddr, port: u16, db_path: PathBuf) -> Self {
        Self {
            host,
            port,
            admin_token: None,
            db_path,
            sweep_interval: Duration::from_millis(200),
            sweep_enabled: false,
            webhook_retry: RetryPolicy {
                max_retries: 3,
                backoff_base: Duration::from_millis(25),
                backoff_factor: 2,
                request_timeout: Duration::from_millis(3_000),
            },
            webhook_require_https: false,
            signup_max_attempts: 100,
            signup_window: Duration::from_millis(5_000),
            activity_page_size: 100,
            runtime_version: "test".to_owned(),
            log_filter: "warn".to_owned(),
            json_logs: false,
        }
    }
}

fn normalize_secret(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}
