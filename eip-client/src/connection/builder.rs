//! Connection builder for the EtherNet/IP client
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use eip_client::connection::ConnectionBuilder;
//! use std::time::Duration;
//!
//! let conn = ConnectionBuilder::new()
//!     .tcp("192.168.1.10:44818")
//!     .route("1,2")
//!     .packet_size(4002)
//!     .rpi(Duration::from_millis(500))
//!     .build()?;
//! # Ok::<(), eip_core::EipError>(())
//! ```

use super::config::ConnectionConfig;
use super::connection::Connection;
use eip_core::EipResult;
use std::time::Duration;

/// Fluent builder over [`ConnectionConfig`]
///
/// Unset options keep the defaults of `ConnectionConfig::default()`. The
/// configuration is validated once, in `build()`.
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one loaded from a file
    pub fn from_config(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Target address, `host` or `host:port`
    pub fn tcp(mut self, address: &str) -> Self {
        self.config.address = address.to_string();
        self
    }

    /// Requested connection size; sizes above 511 select the large Forward Open
    pub fn packet_size(mut self, size: u16) -> Self {
        self.config.packet_size = size;
        self
    }

    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.config.vendor_id = vendor_id;
        self
    }

    pub fn originator_serial(mut self, serial: u32) -> Self {
        self.config.originator_serial = serial;
        self
    }

    pub fn sender_context(mut self, context: u64) -> Self {
        self.config.sender_context = context;
        self
    }

    pub fn rpi(mut self, rpi: Duration) -> Self {
        self.config.rpi = rpi;
        self
    }

    pub fn timeout_multiplier(mut self, multiplier: u8) -> Self {
        self.config.timeout_multiplier = multiplier;
        self
    }

    /// Route to the target CPU as `port,link` pairs, e.g. `"1,0"`
    pub fn route(mut self, route: &str) -> Self {
        self.config.route = route.to_string();
        self
    }

    /// Socket deadline; `None` waits forever
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Validate the configuration and create an unregistered connection
    ///
    /// # Errors
    /// See [`ConnectionConfig::validate`].
    pub fn build(self) -> EipResult<Connection> {
        self.config.validate()?;
        Ok(Connection::new(self.config))
    }
}
