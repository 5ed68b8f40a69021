use pingboard_common::protocol::DecodeError;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error)]
struct ClientMessageError(pub String);

impl Display for ClientMessageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}", self.0)
    }
}

impl From<ClientMessageError> for ClientError {
    fn from(message: ClientMessageError) -> Self {
        ClientError::Other(Box::new(message))
    }
}

impl From<String> for ClientError {
    fn from(message: String) -> Self {
        ClientError::Other(Box::new(ClientMessageError(message)))
    }
}

pub fn message_error<T>(msg: impl Into<String>) -> Result<T, ClientError> {
    Err(ClientMessageError(msg.into()).into())
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered but refused the request; `reason` is user-facing.
    #[error("{reason}")]
    Rejected { status: Option<u16>, reason: String },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    /// Message shown to the user, falling back to `generic` unless the
    /// server supplied its own reason.
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            ClientError::Rejected { reason, .. } => reason.clone(),
            other => format!("{generic}: {other}"),
        }
    }
}
