//! EtherNet/IP originator client
//!
//! This crate ties the transport, session and CIP layers together into a
//! [`Connection`]: register an encapsulation session with the target, open a
//! class 3 connection to its Message Router with Forward Open, exchange
//! explicit messages, and tear both down again.
//!
//! ```rust,no_run
//! use eip_client::ConnectionBuilder;
//!
//! # async fn run() -> eip_core::EipResult<()> {
//! let conn = ConnectionBuilder::new()
//!     .tcp("192.168.1.10")
//!     .route("1,0")
//!     .build()?;
//! conn.connect().await?;
//! let reply = conn.send_connected(&[0x01, 0x02, 0x20, 0x01, 0x24, 0x01]).await?;
//! conn.disconnect().await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod connection;

pub use connection::{
    Connection, ConnectionBuilder, ConnectionConfig, ConnectionState, ConnectionStatus,
};
