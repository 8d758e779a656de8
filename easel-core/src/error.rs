//! Domain-specific error types for the painting agent.
//!
//! All fallible operations return `Result<T, PaintError>`.
//! Nothing here is fatal to the process: the agent logs every error and
//! keeps going, only the connection itself is retried automatically.

use thiserror::Error;

use crate::credential::Credential;

/// Broad category of a [`PaintError`], used to decide how the agent reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect/read/write failure. Triggers an immediate reconnect.
    Transport,
    /// Unrecognized or malformed inbound frame. Logged, rest of buffer dropped.
    Protocol,
    /// The server rejected a credential.
    Credential,
    /// A control call needed something that is not there (socket, tokens, image).
    ResourceUnavailable,
    /// A control call conflicts with the current run state.
    StateConflict,
    /// An operator-supplied value is out of range or unparsable.
    InvalidInput,
    /// Internal plumbing failure (closed channel, unexpected condition).
    Internal,
}

/// The canonical error type of the painting agent.
#[derive(Debug, Error)]
pub enum PaintError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An HTTP request (board snapshot) failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The peer closed the socket.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    // ── Protocol Errors ──────────────────────────────────────────
    /// An inbound frame started with an opcode we do not know.
    #[error("unknown opcode {opcode:#04x}; discarded {discarded} trailing bytes")]
    UnknownOpcode { opcode: u8, discarded: usize },

    /// An inbound frame was cut short.
    #[error("truncated frame {opcode:#04x}: need {needed} bytes, have {available}")]
    Truncated {
        opcode: u8,
        needed: usize,
        available: usize,
    },

    /// A board snapshot had the wrong size.
    #[error("board snapshot has {actual} bytes (expected {expected})")]
    BoardSize { expected: usize, actual: usize },

    // ── Credential Errors ────────────────────────────────────────
    /// The server answered a paint with the invalid-token code.
    #[error("invalid token for uid {uid}: {token}")]
    InvalidCredential { uid: u32, token: String },

    /// A token string is not 32 hex digits.
    #[error("malformed token: {0}")]
    InvalidToken(String),

    /// A credential record line could not be parsed.
    #[error("malformed credential record: {0}")]
    InvalidRecord(String),

    // ── Resource Errors ──────────────────────────────────────────
    /// The socket is not in the Live state.
    #[error("websocket is not connected")]
    NotLive,

    /// No credentials are loaded.
    #[error("no credentials loaded")]
    NoCredentials,

    /// The requested image does not exist.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// The requested image could not be decoded.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    // ── State Errors ─────────────────────────────────────────────
    /// A run is already active.
    #[error("a drawing run is already active")]
    RunActive,

    /// There is no run to stop.
    #[error("no drawing run is active")]
    NoRunActive,

    /// A connection phase transition was attempted from the wrong phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    // ── Input Errors ─────────────────────────────────────────────
    /// A tunable was set outside its bounds.
    #[error("invalid value for {name}: {value}")]
    InvalidTunable { name: &'static str, value: String },

    // ── Internal Errors ──────────────────────────────────────────
    /// An mpsc/oneshot channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Serializing or parsing JSON failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl PaintError {
    /// The broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::WebSocket(_) | Self::Http(_) | Self::ConnectionClosed(_) => {
                ErrorKind::Transport
            }
            Self::UnknownOpcode { .. } | Self::Truncated { .. } | Self::BoardSize { .. } => {
                ErrorKind::Protocol
            }
            Self::InvalidCredential { .. } => ErrorKind::Credential,
            Self::NotLive | Self::NoCredentials | Self::ImageNotFound(_) | Self::ImageDecode(_) => {
                ErrorKind::ResourceUnavailable
            }
            Self::RunActive | Self::NoRunActive | Self::InvalidTransition(_) => {
                ErrorKind::StateConflict
            }
            Self::InvalidTunable { .. } | Self::InvalidToken(_) | Self::InvalidRecord(_) => {
                ErrorKind::InvalidInput
            }
            Self::ChannelClosed | Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

/// A credential the server refused.
impl From<Credential> for PaintError {
    fn from(credential: Credential) -> Self {
        PaintError::InvalidCredential {
            uid: credential.uid,
            token: credential.token.to_string(),
        }
    }
}

impl From<String> for PaintError {
    fn from(s: String) -> Self {
        PaintError::Other(s)
    }
}

impl From<&str> for PaintError {
    fn from(s: &str) -> Self {
        PaintError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PaintError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PaintError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for PaintError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        PaintError::ChannelClosed
    }
}

impl From<image::ImageError> for PaintError {
    fn from(e: image::ImageError) -> Self {
        PaintError::ImageDecode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = PaintError::UnknownOpcode {
            opcode: 0x42,
            discarded: 7,
        };
        assert!(e.to_string().contains("0x42"));
        assert!(e.to_string().contains('7'));

        let e = PaintError::InvalidCredential {
            uid: 123,
            token: "abc".into(),
        };
        assert_eq!(e.to_string(), "invalid token for uid 123: abc");
    }

    #[test]
    fn kinds_follow_categories() {
        assert_eq!(PaintError::NotLive.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(PaintError::NoCredentials.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(PaintError::RunActive.kind(), ErrorKind::StateConflict);
        assert_eq!(PaintError::NoRunActive.kind(), ErrorKind::StateConflict);
        assert_eq!(
            PaintError::ConnectionClosed("reset".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            PaintError::Truncated {
                opcode: 0xfa,
                needed: 7,
                available: 2
            }
            .kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn refused_credential_is_a_credential_error() {
        let token = "00112233-4455-6677-8899-aabbccddeeff".parse().unwrap();
        let credential = Credential::new(77, token).unwrap();
        let e = PaintError::from(credential);
        assert_eq!(e.kind(), ErrorKind::Credential);
        assert_eq!(
            e.to_string(),
            "invalid token for uid 77: 00112233-4455-6677-8899-aabbccddeeff"
        );
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: PaintError = io_err.into();
        assert!(matches!(e, PaintError::Io(_)));
        assert_eq!(e.kind(), ErrorKind::Transport);
    }

    #[test]
    fn from_string() {
        let e: PaintError = "something broke".into();
        assert!(matches!(e, PaintError::Other(_)));
    }
}
