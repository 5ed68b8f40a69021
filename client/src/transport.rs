use crate::error::ClientError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use pingboard_common::protocol::Command;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use url::Url;

type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens links to the push endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn PushLink>, ClientError>;
}

/// One open push connection.
#[async_trait]
pub trait PushLink: Send {
    /// Next text payload; `None` once the peer closed the link.
    async fn next_message(&mut self) -> Option<Result<String, ClientError>>;

    async fn send(&mut self, command: Command) -> Result<(), ClientError>;

    async fn close(&mut self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketTransport;

struct WebSocketLink {
    stream: WebSocket,
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn PushLink>, ClientError> {
        info!("trying {endpoint}");
        let (stream, response) = connect_async(endpoint.as_str()).await?;
        debug!("push handshake completed with status {}", response.status());
        Ok(Box::new(WebSocketLink { stream }))
    }
}

#[async_trait]
impl PushLink for WebSocketLink {
    async fn next_message(&mut self) -> Option<Result<String, ClientError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()));
                }
                Ok(Message::Close(reason)) => {
                    info!("received close message: {reason:?}");
                    return None;
                }
                // ping/pong are answered by tungstenite itself
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }

    async fn send(&mut self, command: Command) -> Result<(), ClientError> {
        self.stream
            .send(Message::text(command.as_str().to_string()))
            .await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!("failed to close push link cleanly: {err}");
        }
    }
}
