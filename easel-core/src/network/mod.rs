pub mod connection;

pub use connection::{Connection, Connector, SocketEvent, WsConnector};
