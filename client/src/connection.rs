use crate::transport::{PushLink, PushTransport};
use log::{debug, info, warn};
use pingboard_common::protocol::Command;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "reconnecting",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed(String),
    Message(String),
}

/// Delay before reconnect attempt `n` (0-based since the last open):
/// `base * 2^n`, capped at `max`. `max == base` gives a fixed delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            max: delay,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).min(self.max.max(self.base))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

struct SessionEvent {
    epoch: u64,
    event: ConnectionEvent,
}

struct Session {
    cancel: CancellationToken,
    retry_now: mpsc::UnboundedSender<()>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

/// Owns the single logical push connection.
///
/// Every `start` that actually spawns a session bumps the epoch, and so does
/// `stop`; events are tagged with the epoch of the session that produced
/// them and anything from an older epoch is discarded by [`next_event`].
/// That makes `stop` retroactive for messages already queued.
///
/// [`next_event`]: ConnectionManager::next_event
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    retry: RetryPolicy,
    epoch: u64,
    session: Option<Session>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn PushTransport>, retry: RetryPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            retry,
            epoch: 0,
            session: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &self.session {
            Some(session) => *session.state.borrow(),
            None => ConnectionState::Idle,
        }
    }

    /// Starts connecting to `endpoint`. A no-op while connecting or open;
    /// while waiting to reconnect it cancels the timer and retries now.
    pub fn start(&mut self, endpoint: Url) {
        if let Some(session) = self.session.as_ref().filter(|s| !s.task.is_finished()) {
            let state = *session.state.borrow();
            match state {
                ConnectionState::Connecting | ConnectionState::Open => {
                    debug!("push channel already {state}, ignoring start");
                }
                ConnectionState::Closed | ConnectionState::Idle => {
                    debug!("start requested while waiting to reconnect, retrying now");
                    let _ = session.retry_now.send(());
                }
            }
            return;
        }

        self.stop();
        self.epoch += 1;

        let cancel = CancellationToken::new();
        let (retry_now, retry_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let worker = SessionWorker {
            transport: Arc::clone(&self.transport),
            endpoint,
            retry: self.retry,
            epoch: self.epoch,
            events: self.events_tx.clone(),
            cancel: cancel.clone(),
            retry_now: retry_rx,
            commands: commands_rx,
            state: state_tx,
        };

        self.session = Some(Session {
            cancel,
            retry_now,
            commands: commands_tx,
            state: state_rx,
            task: tokio::spawn(worker.run()),
        });
    }

    /// Closes the connection and cancels every timer. Idempotent; events
    /// still queued from the stopped session are never delivered.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        info!("stopping push channel");
        session.cancel.cancel();
        self.epoch += 1;
    }

    /// Best-effort send; dropped unless the channel is open.
    pub fn send(&self, command: Command) {
        match &self.session {
            Some(session) if *session.state.borrow() == ConnectionState::Open => {
                if session.commands.send(command).is_err() {
                    debug!("push session gone, dropping {command} command");
                }
            }
            _ => debug!("push channel not open, dropping {command} command"),
        }
    }

    /// Waits for the next event of the current session. Pending forever
    /// while idle. Cancel-safe.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            // the manager keeps a sender, so the channel never closes
            let Some(tagged) = self.events_rx.recv().await else {
                return std::future::pending().await;
            };

            if self.session.is_some() && tagged.epoch == self.epoch {
                return tagged.event;
            }

            debug!("discarding event from stopped push session");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SessionWorker {
    transport: Arc<dyn PushTransport>,
    endpoint: Url,
    retry: RetryPolicy,
    epoch: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    retry_now: mpsc::UnboundedReceiver<()>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
}

impl SessionWorker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            // retry requests that raced the timer are spent by this attempt
            while self.retry_now.try_recv().is_ok() {}
            self.state.send_replace(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                res = self.transport.connect(&self.endpoint) => res,
            };

            let reason = match connected {
                Ok(link) => {
                    attempt = 0;
                    match self.pump(link).await {
                        Some(reason) => reason,
                        None => return,
                    }
                }
                Err(err) => err.to_string(),
            };

            self.state.send_replace(ConnectionState::Closed);
            warn!("push channel closed: {reason}");
            self.emit(ConnectionEvent::Closed(reason));

            // the only retry timer of this session
            let delay = self.retry.delay(attempt);
            attempt = attempt.saturating_add(1);
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => debug!("retry timer fired after {delay:?}"),
                Some(()) = self.retry_now.recv() => debug!("retry timer cancelled, reconnecting now"),
            }
        }
    }

    /// Forwards traffic until the link drops (returns the reason) or the
    /// session is cancelled (returns `None`).
    async fn pump(&mut self, mut link: Box<dyn PushLink>) -> Option<String> {
        // commands are advisory; nothing queued before this open is replayed
        while self.commands.try_recv().is_ok() {}

        self.state.send_replace(ConnectionState::Open);
        info!("push channel open");
        self.emit(ConnectionEvent::Opened);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    link.close().await;
                    return None;
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Err(err) = link.send(command).await {
                            warn!("failed to send {command} command: {err}");
                        }
                    }
                    None => {
                        link.close().await;
                        return None;
                    }
                },
                message = link.next_message() => match message {
                    Some(Ok(raw)) => self.emit(ConnectionEvent::Message(raw)),
                    Some(Err(err)) => return Some(err.to_string()),
                    None => return Some("connection closed by server".to_string()),
                },
            }
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        let tagged = SessionEvent {
            epoch: self.epoch,
            event,
        };
        if self.events.send(tagged).is_err() {
            debug!("connection manager dropped, discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_transport;
    use tokio::time::{sleep, timeout};

    fn endpoint() -> Url {
        Url::parse("ws://127.0.0.1:8000/api/ws/monitor").unwrap()
    }

    fn manager(transport: Arc<dyn PushTransport>) -> ConnectionManager {
        ConnectionManager::new(transport, RetryPolicy::fixed(Duration::from_secs(1)))
    }

    #[test]
    fn retry_policy_doubles_up_to_max() {
        let policy = RetryPolicy {
            base: Duration::from_millis(500),
            max: Duration::from_secs(4),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(40), Duration::from_secs(4));
        assert_eq!(
            RetryPolicy::fixed(Duration::from_secs(1)).delay(9),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_while_open() {
        let (transport, mut servers) = fake_transport(true);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        manager.start(endpoint());
        assert_eq!(manager.next_event().await, ConnectionEvent::Opened);

        manager.start(endpoint());
        let _server = servers.recv().await.unwrap();
        sleep(Duration::from_secs(3)).await;

        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_keep_a_single_retry_timer() {
        let (transport, _servers) = fake_transport(false);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        sleep(Duration::from_millis(5_500)).await;

        // one attempt at t=0 and one per elapsed delay, never more
        assert_eq!(transport.attempts(), 6);
        assert_eq!(manager.state(), ConnectionState::Closed);

        for _ in 0..6 {
            assert!(matches!(
                manager.next_event().await,
                ConnectionEvent::Closed(_)
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_closed_cancels_the_pending_timer() {
        let (transport, _servers) = fake_transport(false);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 1);

        manager.start(endpoint());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 2);

        // the cancelled timer does not fire on top of the new one
        sleep(Duration::from_millis(1_005)).await;
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_while_closed_retries_once() {
        let (transport, _servers) = fake_transport(false);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 1);

        // both land before the worker wakes up
        manager.start(endpoint());
        manager.start(endpoint());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 2);

        // the second request must not cut the next delay short
        sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.attempts(), 2);
        sleep(Duration::from_millis(600)).await;
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_after_timer_does_not_duplicate_attempts() {
        let (transport, mut servers) = fake_transport(true);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        assert_eq!(manager.next_event().await, ConnectionEvent::Opened);

        drop(servers.recv().await.unwrap());
        assert!(matches!(
            manager.next_event().await,
            ConnectionEvent::Closed(_)
        ));

        assert_eq!(manager.next_event().await, ConnectionEvent::Opened);
        let _server = servers.recv().await.unwrap();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.attempts(), 2);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_messages() {
        let (transport, mut servers) = fake_transport(true);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        assert_eq!(manager.next_event().await, ConnectionEvent::Opened);

        let server = servers.recv().await.unwrap();
        server.push(r#"[{"ip":"10.0.0.1"}]"#);
        sleep(Duration::from_millis(10)).await;

        manager.stop();
        manager.stop();
        assert_eq!(manager.state(), ConnectionState::Idle);

        let next = timeout(Duration::from_secs(5), manager.next_event()).await;
        assert!(next.is_err(), "no event may surface after stop");
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_retry_timer() {
        let (transport, _servers) = fake_transport(false);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        sleep(Duration::from_millis(10)).await;
        manager.stop();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_stop_opens_a_fresh_session() {
        let (transport, mut servers) = fake_transport(true);
        let mut manager = manager(transport.clone());

        manager.start(endpoint());
        assert_eq!(manager.next_event().await, ConnectionEvent::Opened);
        manager.stop();

        manager.start(endpoint());
        assert_eq!(manager.next_event().await, ConnectionEvent::Opened);

        let _first = servers.recv().await.unwrap();
        let second = servers.recv().await.unwrap();
        second.push("[]");
        assert_eq!(
            manager.next_event().await,
            ConnectionEvent::Message("[]".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_dropped_unless_open() {
        let (transport, mut servers) = fake_transport(false);
        let mut manager = manager(transport.clone());

        manager.send(Command::Refresh);
        manager.start(endpoint());
        sleep(Duration::from_millis(10)).await;
        manager.send(Command::Refresh);

        transport.set_accept(true);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.state(), ConnectionState::Open);

        let mut server = servers.recv().await.unwrap();
        manager.send(Command::Refresh);
        assert_eq!(server.next_command().await.as_deref(), Some("refresh"));

        sleep(Duration::from_millis(10)).await;
        assert!(server.try_next_command().is_none());
    }
}
