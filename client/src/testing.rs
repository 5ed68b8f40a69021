//! In-memory stand-ins for the push transport and the REST API.

use crate::api::HostApi;
use crate::error::{ClientError, message_error};
use crate::transport::{PushLink, PushTransport};
use async_trait::async_trait;
use pingboard_common::protocol::{Command, HostCandidate, HostRecord, decode_batch};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use url::Url;

pub(crate) struct FakeTransport {
    attempts: AtomicUsize,
    accept: AtomicBool,
    servers: mpsc::UnboundedSender<FakeServer>,
}

impl FakeTransport {
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }
}

/// Server side of one accepted fake connection. Dropping it hangs up.
pub(crate) struct FakeServer {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl FakeServer {
    pub(crate) fn push(&self, payload: &str) {
        let _ = self.to_client.send(payload.to_string());
    }

    pub(crate) async fn next_command(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub(crate) fn try_next_command(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

pub(crate) fn fake_transport(
    accept: bool,
) -> (Arc<FakeTransport>, mpsc::UnboundedReceiver<FakeServer>) {
    let (servers_tx, servers_rx) = mpsc::unbounded_channel();
    let transport = FakeTransport {
        attempts: AtomicUsize::new(0),
        accept: AtomicBool::new(accept),
        servers: servers_tx,
    };
    (Arc::new(transport), servers_rx)
}

struct FakeLink {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self, _endpoint: &Url) -> Result<Box<dyn PushLink>, ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accept.load(Ordering::SeqCst) {
            return message_error("connection refused");
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let _ = self.servers.send(FakeServer {
            to_client,
            from_client,
        });
        Ok(Box::new(FakeLink { inbound, outbound }))
    }
}

#[async_trait]
impl PushLink for FakeLink {
    async fn next_message(&mut self) -> Option<Result<String, ClientError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn send(&mut self, command: Command) -> Result<(), ClientError> {
        self.outbound
            .send(command.as_str().to_string())
            .map_err(|_| ClientError::from("peer gone".to_string()))
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

pub(crate) enum CreateReply {
    Canonical(HostRecord),
    Rejected(String),
}

pub(crate) struct FakeApi {
    hosts: Mutex<Result<String, String>>,
    create: Mutex<CreateReply>,
    import: Mutex<Result<String, String>>,
    fetches: AtomicUsize,
}

impl FakeApi {
    pub(crate) fn new(hosts_payload: &str) -> Arc<Self> {
        Arc::new(Self {
            hosts: Mutex::new(Ok(hosts_payload.to_string())),
            create: Mutex::new(CreateReply::Rejected("not configured".to_string())),
            import: Mutex::new(Ok("imported".to_string())),
            fetches: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_fetch(&self, reason: &str) {
        *self.hosts.lock().unwrap() = Err(reason.to_string());
    }

    pub(crate) fn reply_to_create(&self, reply: CreateReply) {
        *self.create.lock().unwrap() = reply;
    }

    pub(crate) fn fail_import(&self, reason: &str) {
        *self.import.lock().unwrap() = Err(reason.to_string());
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

fn rejected(reason: &str) -> ClientError {
    ClientError::Rejected {
        status: Some(400),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl HostApi for FakeApi {
    async fn fetch_all(&self) -> Result<Vec<HostRecord>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let payload = self.hosts.lock().unwrap().clone();
        match payload {
            Ok(body) => Ok(decode_batch(&body)?),
            Err(reason) => message_error(reason),
        }
    }

    async fn create_host(&self, _candidate: &HostCandidate) -> Result<HostRecord, ClientError> {
        match &*self.create.lock().unwrap() {
            CreateReply::Canonical(record) => Ok(record.clone()),
            CreateReply::Rejected(reason) => Err(rejected(reason)),
        }
    }

    async fn import_hosts(&self, _file_name: &str, _contents: Vec<u8>) -> Result<String, ClientError> {
        let reply = self.import.lock().unwrap().clone();
        reply.map_err(|reason| rejected(&reason))
    }
}
