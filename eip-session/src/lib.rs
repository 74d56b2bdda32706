//! Session layer for the EtherNet/IP protocol engine
//!
//! This crate provides the encapsulation header codec, whole-frame I/O on a
//! transport, and the registered session that carries SendRRData and
//! SendUnitData exchanges.

pub mod frame;
pub mod header;
pub mod session;

pub use frame::{EncapsulationFrame, FrameTransport};
pub use header::{
    EncapsulationCommand, EncapsulationHeader, RegisterSessionData, ENCAPSULATION_HEADER_LENGTH,
    PROTOCOL_VERSION,
};
pub use session::{request_context, Session};
