//! # easel-agent
//!
//! Runs the `easel-core` agent against the live canvas: loads the TOML
//! configuration, connects the WebSocket and HTTP transports, and exposes
//! the control surface as a line-oriented console on stdin.
//!
//! ## Modules
//!
//! - **config**: `AgentConfig` TOML sections and conversion to `AgentOptions`
//! - **console**: operator commands mapped onto `AgentHandle`
//! - **tokens**: token issuance and the tokens file

pub mod config;
pub mod console;
pub mod tokens;
