use log::{info, warn};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Posted {
    message: String,
    expires_at: Instant,
}

/// The user-visible notice channel: at most one error and one success
/// message, each cleared automatically after its ttl.
#[derive(Debug)]
pub struct Notices {
    error_ttl: Duration,
    success_ttl: Duration,
    error: Option<Posted>,
    success: Option<Posted>,
}

impl Notices {
    pub fn new(error_ttl: Duration, success_ttl: Duration) -> Self {
        Self {
            error_ttl,
            success_ttl,
            error: None,
            success: None,
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.error = Some(Posted {
            message,
            expires_at: Instant::now() + self.error_ttl,
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.success = Some(Posted {
            message,
            expires_at: Instant::now() + self.success_ttl,
        });
    }

    pub fn clear_error(&mut self) -> bool {
        self.error.take().is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|p| p.message.as_str())
    }

    pub fn success_message(&self) -> Option<&str> {
        self.success.as_ref().map(|p| p.message.as_str())
    }

    /// Earliest pending expiry, if any notice is shown.
    pub fn next_expiry(&self) -> Option<Instant> {
        [&self.error, &self.success]
            .into_iter()
            .flatten()
            .map(|p| p.expires_at)
            .min()
    }

    /// Drops every notice due at `now`. Returns whether anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for slot in [&mut self.error, &mut self.success] {
            if slot.as_ref().is_some_and(|p| p.expires_at <= now) {
                *slot = None;
                changed = true;
            }
        }
        changed
    }
}
