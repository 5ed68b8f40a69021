use crate::connection::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub retry: RetryPolicy,
    pub batch_update_delay: Duration,
    /// Full pulls while the push channel is down; `None` disables them.
    pub fallback_interval: Option<Duration>,
    pub request_timeout: Duration,
    pub error_notice_ttl: Duration,
    pub success_notice_ttl: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            batch_update_delay: Duration::from_millis(100),
            fallback_interval: Some(Duration::from_secs(30)),
            request_timeout: Duration::from_secs(10),
            error_notice_ttl: Duration::from_secs(6),
            success_notice_ttl: Duration::from_secs(3),
        }
    }
}
