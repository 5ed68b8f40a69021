use envconfig::Envconfig;
use pingboard_client::{DashboardConfig, Endpoints, RetryPolicy};
use std::time::Duration;

#[derive(Envconfig)]
pub(crate) struct Env {
    #[envconfig(from = "API_URL", default = "http://localhost:8000")]
    pub api_url: String,

    /// Overrides the push base derived from `API_URL`.
    #[envconfig(from = "WS_URL")]
    pub ws_url: Option<String>,

    #[envconfig(from = "RECONNECT_INTERVAL_MS", default = "1000")]
    pub reconnect_interval_ms: u64,

    #[envconfig(from = "RECONNECT_MAX_INTERVAL_MS", default = "1000")]
    pub reconnect_max_interval_ms: u64,

    #[envconfig(from = "BATCH_UPDATE_DELAY_MS", default = "100")]
    pub batch_update_delay_ms: u64,

    #[envconfig(from = "FALLBACK_FETCH_INTERVAL_SECS", default = "30")] // 0 disables
    pub fallback_fetch_interval_secs: u64,

    #[envconfig(from = "REQUEST_TIMEOUT_SECS", default = "10")]
    pub request_timeout_secs: u64,

    #[envconfig(from = "ERROR_NOTICE_SECS", default = "6")]
    pub error_notice_secs: u64,

    #[envconfig(from = "SUCCESS_NOTICE_SECS", default = "3")]
    pub success_notice_secs: u64,
}

impl Env {
    pub fn endpoints(&self) -> anyhow::Result<Endpoints> {
        Ok(Endpoints::resolve(&self.api_url, self.ws_url.as_deref())?)
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        let base = Duration::from_millis(self.reconnect_interval_ms);
        DashboardConfig {
            retry: RetryPolicy {
                base,
                max: Duration::from_millis(self.reconnect_max_interval_ms).max(base),
            },
            batch_update_delay: Duration::from_millis(self.batch_update_delay_ms),
            fallback_interval: match self.fallback_fetch_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            error_notice_ttl: Duration::from_secs(self.error_notice_secs),
            success_notice_ttl: Duration::from_secs(self.success_notice_secs),
        }
    }
}

pub(crate) fn init() -> anyhow::Result<Env> {
    let config = Env::init_from_env()?;
    Ok(config)
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
