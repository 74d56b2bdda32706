//! eip - Rust implementation of the EtherNet/IP originator protocol
//!
//! This library talks to PLCs over EtherNet/IP: it registers an
//! encapsulation session, opens a CIP connection with Forward Open and carries
//! explicit messages over it.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `eip-core`: Error handling, the little-endian wire codec, CIP status codes
//! - `eip-transport`: Transport layer (TCP with read/write deadlines)
//! - `eip-session`: Encapsulation framing and session registration
//! - `eip-cip`: CIP paths, Common Packet Format items, Forward Open/Close
//! - `eip-client`: Connection management
//!
//! Tag addressing and data type marshaling are left to the caller, who builds
//! the CIP service request bytes and gets the raw Message Router reply back.
//!
//! # Usage
//!
//! ```no_run
//! use eip::client::ConnectionBuilder;
//! use eip::WireDecode;
//!
//! # async fn run() -> eip::EipResult<()> {
//! let conn = ConnectionBuilder::new().tcp("192.168.1.10").build()?;
//! conn.connect().await?;
//! let reply = conn.send_unconnected(&[0x01, 0x02, 0x20, 0x01, 0x24, 0x01]).await?;
//! let reply = eip::cip::MessageRouterResponse::from_bytes(&reply)?.into_result()?;
//! conn.disconnect().await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use eip_core::{EipError, EipResult, WireDecode, WireEncode, WireReader, EIP_TCP_PORT};

// Re-export client API
pub mod client {
    pub use eip_client::*;
}

// Re-export CIP records
pub mod cip {
    pub use eip_cip::*;
}

// Re-export lower layers for callers that drive a session directly
pub mod session {
    pub use eip_session::*;
}

pub mod transport {
    pub use eip_transport::*;
}
