use std::str::FromStr;
use tokio::runtime::{Builder, Runtime};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeFlavor {
    CurrentThread,
    MultiThread,
}

impl FromStr for RuntimeFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current_thread" | "current" | "" => Ok(RuntimeFlavor::CurrentThread),
            "multi_thread" | "multi" => Ok(RuntimeFlavor::MultiThread),
            other => Err(format!("invalid runtime flavor: {other}")),
        }
    }
}

/// Builds the tokio runtime from `TOKIO_FLAVOR` and `TOKIO_WORKER_THREADS`.
///
/// The dashboard is a single event loop, so the default is a current-thread
/// runtime; `multi_thread` is accepted for embedding next to heavier work.
pub fn build_from_env() -> std::io::Result<Runtime> {
    let flavor = match std::env::var("TOKIO_FLAVOR") {
        Ok(raw) => raw.parse().unwrap_or_else(|err| {
            log::warn!("{err}; using current_thread");
            RuntimeFlavor::CurrentThread
        }),
        Err(_) => RuntimeFlavor::CurrentThread,
    };

    let worker_threads: Option<usize> = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|v| v.parse().ok());

    build(flavor, worker_threads)
}

pub fn build(flavor: RuntimeFlavor, worker_threads: Option<usize>) -> std::io::Result<Runtime> {
    let mut builder = match flavor {
        RuntimeFlavor::CurrentThread => Builder::new_current_thread(),
        RuntimeFlavor::MultiThread => {
            let mut builder = Builder::new_multi_thread();
            if let Some(worker_threads) = worker_threads {
                builder.worker_threads(worker_threads);
            }
            builder
        }
    };

    builder.enable_all().build()
}
