use crate::api::HostApi;
use crate::error::ClientError;
use log::debug;
use pingboard_common::protocol::HostRecord;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type FetchResult = Result<Vec<HostRecord>, ClientError>;

/// Pulls the full host list off the event loop and hands it back through a
/// channel, so the result is applied in loop order like any other batch.
/// At most one pull is in flight.
pub struct FallbackFetcher {
    api: Arc<dyn HostApi>,
    in_flight: bool,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results_rx: mpsc::UnboundedReceiver<FetchResult>,
}

impl FallbackFetcher {
    pub fn new(api: Arc<dyn HostApi>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            api,
            in_flight: false,
            results_tx,
            results_rx,
        }
    }

    pub fn fetch_all(&mut self) {
        if self.in_flight {
            debug!("full fetch already in flight");
            return;
        }
        self.in_flight = true;

        let api = Arc::clone(&self.api);
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_all().await;
            let _ = results.send(result);
        });
    }

    #[cfg(test)]
    fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Next completed pull. Cancel-safe.
    pub async fn next_result(&mut self) -> FetchResult {
        let Some(result) = self.results_rx.recv().await else {
            return std::future::pending().await;
        };
        self.in_flight = false;
        result
    }
}
