use crate::status::{extended_status_description, general_status_description};
use thiserror::Error;

/// Main error type for EtherNet/IP operations
#[derive(Error, Debug)]
pub enum EipError {
    /// The TCP socket to the target could not be opened
    #[error("Connect error: {0}")]
    Connect(#[source] std::io::Error),

    /// Read/write fault on an established socket, including deadline expiry
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the socket before a full frame was read
    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Truncated frame: needed {needed} bytes, {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    #[error("Item length mismatch: item declares {declared} bytes, {remaining} remaining")]
    ItemLengthMismatch { declared: usize, remaining: usize },

    #[error("Unsupported path segment: {0}")]
    UnsupportedSegment(String),

    /// Non-zero status in an encapsulation reply header
    #[error("Encapsulation protocol error: status 0x{status:08X}")]
    Protocol { status: u32 },

    #[error(
        "Forward Open rejected: {} (0x{status:02X}), extended status 0x{extended_status:04X} ({})",
        general_status_description(*status),
        extended_status_description(*extended_status)
    )]
    ForwardOpenRejected { status: u8, extended_status: u16 },

    #[error(
        "CIP service 0x{service:02X} failed: {} (0x{status:02X}), extended status 0x{extended_status:04X}",
        general_status_description(*status)
    )]
    ServiceFailed {
        service: u8,
        status: u8,
        extended_status: u16,
    },

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl EipError {
    /// True when the error came from a socket deadline expiring
    pub fn is_timeout(&self) -> bool {
        matches!(self, EipError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }

    /// Build the error used when a socket deadline expires
    pub fn timed_out(what: &str) -> Self {
        EipError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{} timed out", what),
        ))
    }
}

/// Result type alias for EtherNet/IP operations
pub type EipResult<T> = Result<T, EipError>;
