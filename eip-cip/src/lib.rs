//! CIP layer records for the EtherNet/IP protocol engine
//!
//! Everything here is a pure codec on top of `eip_core::wire`:
//!
//! - [`path`]: CIP path builder (port and 8-bit logical segments)
//! - [`item`]: Common Packet Format item list
//! - [`message_router`]: the status envelope of explicit replies
//! - [`forward_open`] / [`forward_close`]: Connection Manager requests

pub mod forward_close;
pub mod forward_open;
pub mod item;
pub mod message_router;
pub mod path;

pub use forward_close::{ForwardCloseRequest, SERVICE_FORWARD_CLOSE};
pub use forward_open::{
    ConnectionParameters, ForwardOpenFormat, ForwardOpenReply, ForwardOpenRequest,
    STANDARD_MAX_CONNECTION_SIZE,
};
pub use item::{CipItem, CommonPacket, RrDataPrefix};
pub use message_router::MessageRouterResponse;
pub use path::{CipPath, PathSegment};
