//! Error types for the Manimator clients.

use thiserror::Error;

/// Failure to start an animation job
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The server answered with an error payload; the message is shown as-is
    #[error("{0}")]
    Rejected(String),
    /// Transport failure or a response without a usable error payload
    #[error("API request failed")]
    RequestFailed(#[source] Option<reqwest::Error>),
    /// The server accepted the request but returned no job identifier
    #[error("response did not include a job id")]
    MissingJobId,
}

/// Failure of the reasoning (chat completion) call
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning credential is not configured. Set GROQ_API_KEY")]
    NotConfigured,
    #[error("reasoning request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reasoning API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("reasoning response contained no answer")]
    EmptyAnswer,
}

/// Malformed Engine.IO / Socket.IO frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type '{0}'")]
    UnknownType(char),
    #[error("invalid packet payload: {0}")]
    InvalidPayload(String),
}

/// Failure of the realtime channel
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("server closed the connection")]
    Closed,
}

/// Failure to load or save the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
