pub mod api;
pub mod coalescer;
pub mod config;
pub mod connection;
pub mod dashboard;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod notice;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{HostApi, RestClient};
pub use config::DashboardConfig;
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, RetryPolicy};
pub use dashboard::{Dashboard, DashboardHandle, DashboardView};
pub use endpoint::Endpoints;
pub use error::ClientError;
pub use store::HostStore;
pub use transport::{PushLink, PushTransport, WebSocketTransport};
