//! Connection state machine.
//!
//! Models the lifecycle of the single canvas socket with validated
//! transitions that return `Result` instead of panicking.

use std::time::Instant;

use crate::error::PaintError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current phase of the canvas socket.
///
/// ```text
///  Disconnected ──► Connecting ──► AwaitingHandshake ──► Live
///                      ▲   │               │               │
///                      │   ▼               ▼               ▼
///                      └── Reconnecting ◄──┴───────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket yet. Initial state.
    #[default]
    Disconnected,

    /// Socket connect in progress.
    Connecting,

    /// Socket is open; waiting for the server's handshake push.
    AwaitingHandshake,

    /// Handshake confirmed; paints may flow.
    Live {
        /// When the connection went live.
        since: Instant,
    },

    /// The socket dropped; a new connect is about to start.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::AwaitingHandshake => write!(f, "AwaitingHandshake"),
            Self::Live { .. } => write!(f, "Live"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

impl ConnectionState {
    /// Returns `true` once the handshake has completed.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// How long the connection has been live, if it is.
    pub fn live_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Live { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`, `Reconnecting`.
    pub fn begin_connect(&mut self) -> Result<(), PaintError> {
        match self {
            Self::Disconnected | Self::Reconnecting => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(PaintError::InvalidTransition(
                "cannot connect: not Disconnected or Reconnecting",
            )),
        }
    }

    /// Transition to `AwaitingHandshake`.
    ///
    /// Valid from: `Connecting`.
    pub fn socket_opened(&mut self) -> Result<(), PaintError> {
        match self {
            Self::Connecting => {
                *self = Self::AwaitingHandshake;
                Ok(())
            }
            _ => Err(PaintError::InvalidTransition(
                "cannot open: not in Connecting state",
            )),
        }
    }

    /// Transition to `Live`.
    ///
    /// Valid from: `AwaitingHandshake`.
    pub fn complete_handshake(&mut self) -> Result<(), PaintError> {
        match self {
            Self::AwaitingHandshake => {
                *self = Self::Live {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(PaintError::InvalidTransition(
                "cannot complete handshake: not in AwaitingHandshake state",
            )),
        }
    }

    /// Transition to `Reconnecting` after an error or close.
    ///
    /// Valid from: `Connecting`, `AwaitingHandshake`, `Live`.
    pub fn connection_lost(&mut self) -> Result<(), PaintError> {
        match self {
            Self::Connecting | Self::AwaitingHandshake | Self::Live { .. } => {
                *self = Self::Reconnecting;
                Ok(())
            }
            _ => Err(PaintError::InvalidTransition(
                "cannot lose connection: no socket",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = ConnectionState::default();

        state.begin_connect().unwrap();
        assert_eq!(state, ConnectionState::Connecting);

        state.socket_opened().unwrap();
        assert_eq!(state, ConnectionState::AwaitingHandshake);

        state.complete_handshake().unwrap();
        assert!(state.is_live());
        assert!(state.live_duration().is_some());

        state.connection_lost().unwrap();
        assert_eq!(state, ConnectionState::Reconnecting);

        state.begin_connect().unwrap();
        assert_eq!(state, ConnectionState::Connecting);
    }

    #[test]
    fn connect_failure_goes_straight_to_reconnecting() {
        let mut state = ConnectionState::Connecting;
        state.connection_lost().unwrap();
        assert_eq!(state, ConnectionState::Reconnecting);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut live = ConnectionState::Live {
            since: Instant::now(),
        };
        assert!(live.begin_connect().is_err());
        assert!(live.complete_handshake().is_err());

        let mut idle = ConnectionState::Disconnected;
        assert!(idle.socket_opened().is_err());
        assert!(idle.connection_lost().is_err());
        assert!(!idle.is_live());
    }

    #[test]
    fn force_disconnect_from_any_state() {
        let mut state = ConnectionState::Live {
            since: Instant::now(),
        };
        state.force_disconnect();
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::AwaitingHandshake.to_string(), "AwaitingHandshake");
        assert_eq!(
            ConnectionState::Live {
                since: Instant::now()
            }
            .to_string(),
            "Live"
        );
        assert_eq!(ConnectionState::Reconnecting.to_string(), "Reconnecting");
    }
}
