use crate::api::HostApi;
use crate::coalescer::UpdateCoalescer;
use crate::config::DashboardConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::endpoint::Endpoints;
use crate::error::{ClientError, message_error};
use crate::fetcher::{FallbackFetcher, FetchResult};
use crate::notice::Notices;
use crate::store::HostStore;
use crate::transport::PushTransport;
use log::{debug, info};
use pingboard_common::protocol::{Command, HostCandidate, HostRecord, decode_batch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const ACTION_QUEUE: usize = 64;

/// What the presentation layer reads. `hosts` is shared and immutable.
#[derive(Clone, Debug)]
pub struct DashboardView {
    pub hosts: Arc<[HostRecord]>,
    pub connection: ConnectionState,
    pub error: Option<String>,
    pub success: Option<String>,
    /// Store revision the hosts were taken from.
    pub revision: u64,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            hosts: Arc::from(Vec::new()),
            connection: ConnectionState::Idle,
            error: None,
            success: None,
            revision: 0,
        }
    }
}

enum Action {
    AddHost {
        candidate: HostCandidate,
        reply: oneshot::Sender<Result<HostRecord, ClientError>>,
    },
    Import {
        file_name: String,
        contents: Vec<u8>,
        reply: oneshot::Sender<Result<String, ClientError>>,
    },
    Refresh,
    FetchAll,
}

enum WriteOutcome {
    Created(
        Result<HostRecord, ClientError>,
        oneshot::Sender<Result<HostRecord, ClientError>>,
    ),
    Imported(
        Result<String, ClientError>,
        oneshot::Sender<Result<String, ClientError>>,
    ),
}

/// Cloneable front door to a running dashboard.
#[derive(Clone)]
pub struct DashboardHandle {
    actions: mpsc::Sender<Action>,
    view: watch::Receiver<DashboardView>,
    shutdown: CancellationToken,
}

impl DashboardHandle {
    /// Creates the host on the backend and, on success, writes the returned
    /// canonical record into the table right away.
    pub async fn add_host(&self, candidate: HostCandidate) -> Result<HostRecord, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Action::AddHost { candidate, reply }).await?;
        rx.await.or_else(|_| message_error("dashboard stopped"))?
    }

    /// Uploads a CSV file; on success a refresh is requested over the push
    /// channel and the imported hosts arrive through it.
    pub async fn import(&self, file_name: String, contents: Vec<u8>) -> Result<String, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Action::Import {
            file_name,
            contents,
            reply,
        })
        .await?;
        rx.await.or_else(|_| message_error("dashboard stopped"))?
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.submit(Action::Refresh).await
    }

    pub async fn fetch_all(&self) -> Result<(), ClientError> {
        self.submit(Action::FetchAll).await
    }

    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn submit(&self, action: Action) -> Result<(), ClientError> {
        self.actions
            .send(action)
            .await
            .or_else(|_| message_error("dashboard stopped"))
    }
}

/// The synchronization engine.
///
/// One task runs [`Dashboard::run`] and owns the store, the coalescer, the
/// push connection and the notices; everything that mutates the table is
/// funnelled through its loop, so writes are applied in the order the loop
/// observes them and the store needs no lock.
pub struct Dashboard {
    endpoints: Endpoints,
    store: HostStore,
    coalescer: UpdateCoalescer,
    connection: ConnectionManager,
    fetcher: FallbackFetcher,
    api: Arc<dyn HostApi>,
    notices: Notices,
    fallback_interval: Option<Duration>,
    actions: mpsc::Receiver<Action>,
    writes_tx: mpsc::UnboundedSender<WriteOutcome>,
    writes_rx: mpsc::UnboundedReceiver<WriteOutcome>,
    view: watch::Sender<DashboardView>,
    shutdown: CancellationToken,
}

impl Dashboard {
    pub fn new(
        config: DashboardConfig,
        endpoints: Endpoints,
        transport: Arc<dyn PushTransport>,
        api: Arc<dyn HostApi>,
    ) -> (Self, DashboardHandle) {
        let (actions_tx, actions_rx) = mpsc::channel(ACTION_QUEUE);
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(DashboardView::default());
        let shutdown = CancellationToken::new();

        let dashboard = Self {
            endpoints,
            store: HostStore::new(),
            coalescer: UpdateCoalescer::new(config.batch_update_delay),
            connection: ConnectionManager::new(transport, config.retry),
            fetcher: FallbackFetcher::new(Arc::clone(&api)),
            api,
            notices: Notices::new(config.error_notice_ttl, config.success_notice_ttl),
            fallback_interval: config.fallback_interval.filter(|p| !p.is_zero()),
            actions: actions_rx,
            writes_tx,
            writes_rx,
            view: view_tx,
            shutdown: shutdown.clone(),
        };

        let handle = DashboardHandle {
            actions: actions_tx,
            view: view_rx,
            shutdown,
        };

        (dashboard, handle)
    }

    pub fn spawn(
        config: DashboardConfig,
        endpoints: Endpoints,
        transport: Arc<dyn PushTransport>,
        api: Arc<dyn HostApi>,
    ) -> (DashboardHandle, JoinHandle<()>) {
        let (dashboard, handle) = Self::new(config, endpoints, transport, api);
        (handle, tokio::spawn(dashboard.run()))
    }

    pub async fn run(mut self) {
        info!(
            "dashboard starting: api {} push {}",
            self.endpoints.api_base(),
            self.endpoints.push()
        );

        self.connection.start(self.endpoints.push().clone());
        self.fetcher.fetch_all();
        self.publish();

        let mut fallback = self.fallback_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let flush_at = self.coalescer.deadline();
            let notice_at = self.notices.next_expiry();

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                event = self.connection.next_event() => self.on_connection_event(event),
                _ = sleep_until(flush_at) => self.flush(),
                fetched = self.fetcher.next_result() => self.on_fetched(fetched),
                Some(outcome) = self.writes_rx.recv() => self.on_write(outcome),
                action = self.actions.recv() => match action {
                    Some(action) => self.on_action(action),
                    None => break,
                },
                _ = tick(&mut fallback) => self.on_fallback_tick(),
                _ = sleep_until(notice_at) => {
                    self.notices.expire(Instant::now());
                }
            }

            self.publish();
        }

        self.teardown();
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                if self.notices.clear_error() {
                    debug!("push channel recovered, cleared error notice");
                }
            }
            ConnectionEvent::Closed(reason) => {
                debug!("push channel down: {reason}");
                self.notices.error("connection lost, reconnecting...");
            }
            ConnectionEvent::Message(raw) => match decode_batch(&raw) {
                Ok(batch) => {
                    debug!("received {} host updates", batch.len());
                    self.coalescer.push(batch);
                }
                Err(err) => self.notices.error(format!("failed to process update: {err}")),
            },
        }
    }

    fn flush(&mut self) {
        if let Some(batch) = self.coalescer.flush() {
            let size = batch.len();
            if self.store.apply_batch(batch) {
                debug!("applied {size} coalesced updates, {} hosts", self.store.len());
            }
        }
    }

    fn on_fetched(&mut self, fetched: FetchResult) {
        match fetched {
            Ok(batch) => {
                info!("fetched {} hosts", batch.len());
                self.store.apply_batch(batch);
            }
            Err(err) => self.notices.error(err.user_message("failed to load hosts")),
        }
    }

    fn on_action(&mut self, action: Action) {
        match action {
            Action::AddHost { candidate, reply } => {
                let api = Arc::clone(&self.api);
                let writes = self.writes_tx.clone();
                tokio::spawn(async move {
                    let result = api.create_host(&candidate).await;
                    let _ = writes.send(WriteOutcome::Created(result, reply));
                });
            }
            Action::Import {
                file_name,
                contents,
                reply,
            } => {
                let api = Arc::clone(&self.api);
                let writes = self.writes_tx.clone();
                tokio::spawn(async move {
                    let result = api.import_hosts(&file_name, contents).await;
                    let _ = writes.send(WriteOutcome::Imported(result, reply));
                });
            }
            Action::Refresh => self.connection.send(Command::Refresh),
            Action::FetchAll => self.fetcher.fetch_all(),
        }
    }

    fn on_write(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created(Ok(record), reply) => {
                self.notices.success(format!("host {} added", record.address));
                self.store.apply_optimistic_write(record.clone());
                let _ = reply.send(Ok(record));
            }
            WriteOutcome::Created(Err(err), reply) => {
                self.notices.error(err.user_message("failed to add host"));
                let _ = reply.send(Err(err));
            }
            WriteOutcome::Imported(Ok(summary), reply) => {
                self.notices.success("hosts imported");
                self.connection.send(Command::Refresh);
                let _ = reply.send(Ok(summary));
            }
            WriteOutcome::Imported(Err(err), reply) => {
                self.notices.error(err.user_message("failed to import hosts"));
                let _ = reply.send(Err(err));
            }
        }
    }

    fn on_fallback_tick(&mut self) {
        if self.connection.state() != ConnectionState::Open {
            info!("push channel down, pulling full host list");
            self.fetcher.fetch_all();
        }
    }

    fn publish(&self) {
        let store = &self.store;
        let connection = self.connection.state();
        let error = self.notices.error_message();
        let success = self.notices.success_message();

        self.view.send_if_modified(|view| {
            let mut modified = false;
            if view.revision != store.revision() {
                view.hosts = store.snapshot();
                view.revision = store.revision();
                modified = true;
            }
            if view.connection != connection {
                view.connection = connection;
                modified = true;
            }
            if view.error.as_deref() != error {
                view.error = error.map(str::to_string);
                modified = true;
            }
            if view.success.as_deref() != success {
                view.success = success.map(str::to_string);
                modified = true;
            }
            modified
        });
    }

    /// Stops the push channel first so nothing in flight reaches the table,
    /// then applies what was already buffered and publishes the final view.
    fn teardown(mut self) {
        self.connection.stop();
        self.flush();
        self.publish();
        info!("dashboard stopped with {} hosts", self.store.len());
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
