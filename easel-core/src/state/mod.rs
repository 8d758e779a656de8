pub mod connection;
mod drawing;

pub use connection::ConnectionState;
pub use drawing::{DrawingState, RunParams};
