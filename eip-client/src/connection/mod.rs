//! Connection management module

pub mod builder;
pub mod config;
pub mod connection;

#[cfg(test)]
mod fake_plc;

pub use builder::ConnectionBuilder;
pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionState, ConnectionStatus};
