//! # easel-core
//!
//! Painting engine for the shared 1000×600 canvas.
//!
//! This crate contains:
//! - **Codec**: paint, broadcast, handshake and ack frames (`codec`)
//! - **Credentials**: token records and the round-robin `CredentialPool`
//! - **Send pump**: `SendPump`, one coalesced frame per flush tick
//! - **Acks**: `AckRegistry` over a cyclic correlation id space
//! - **Network**: `Connection` over a WebSocket, behind the `Connector` trait
//! - **State**: `ConnectionState` and `DrawingState` machines
//! - **Repair**: cold fill, correction rounds and the real-time `Defense`
//! - **Agent**: the `Agent` actor and its `AgentHandle` control surface
//! - **Error**: `PaintError`, a typed `thiserror` enum with an `ErrorKind`

pub mod ack;
pub mod agent;
pub mod board;
pub mod canvas;
pub mod codec;
pub mod credential;
pub mod error;
pub mod governor;
pub mod network;
pub mod pacer;
pub mod painter;
pub mod pump;
pub mod repair;
pub mod report;
pub mod state;
pub mod target;
pub mod tuning;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use ack::{AckOutcome, AckRegistry};
pub use agent::{Agent, AgentHandle, AgentOptions, AgentStatus};
pub use board::{BoardSource, HttpBoard};
pub use canvas::{BOARD_HEIGHT, BOARD_WIDTH, BoardSnapshot, Defense, Placement, Rgb, TargetImage};
pub use codec::{InboundFrame, PaintRequest};
pub use credential::{Credential, CredentialInfo, CredentialPool, Token};
pub use error::{ErrorKind, PaintError};
pub use governor::{RateCounters, RateReport};
pub use network::{Connection, Connector, SocketEvent, WsConnector};
pub use painter::Painter;
pub use pump::SendPump;
pub use report::{EventLog, Report, RunPhase};
pub use state::{ConnectionState, DrawingState, RunParams};
pub use target::{ImageFileLoader, TargetLoader};
pub use tuning::Tunables;
