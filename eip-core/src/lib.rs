//! Core types and utilities for the EtherNet/IP protocol engine
//!
//! This crate provides the error taxonomy, the little-endian wire codec used
//! by every protocol record, and CIP status code descriptions.

pub mod error;
pub mod status;
pub mod wire;

pub use error::{EipError, EipResult};
pub use wire::{WireDecode, WireEncode, WireReader};

/// Standard EtherNet/IP TCP port
pub const EIP_TCP_PORT: u16 = 44818;
