//! Transport layer module for the EtherNet/IP protocol engine
//!
//! This crate provides the byte-stream abstraction the encapsulation layer
//! writes frames to, and its TCP implementation.

pub mod stream;
pub mod tcp;

pub use eip_core::{EipError, EipResult};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
