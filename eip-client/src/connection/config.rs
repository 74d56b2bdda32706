//! Connection configuration

use eip_cip::forward_open::DEFAULT_TIMEOUT_MULTIPLIER;
use eip_cip::CipPath;
use eip_core::{EipError, EipResult};
use eip_transport::TcpSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default requested connection size, fits the standard Forward Open
pub const DEFAULT_PACKET_SIZE: u16 = 508;
/// Connection size commonly requested with the large Forward Open
pub const LARGE_PACKET_SIZE: u16 = 4002;
/// Originator vendor ID
pub const DEFAULT_VENDOR_ID: u16 = 0x1776;
pub const DEFAULT_ORIGINATOR_SERIAL: u32 = 42;
/// Backplane port 1, slot 0
pub const DEFAULT_ROUTE: &str = "1,0";
pub const DEFAULT_RPI: Duration = Duration::from_secs(2);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of one originator connection
///
/// Every field has a default, so a configuration file only needs the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// `host` or `host:port`; port 44818 is assumed when omitted
    pub address: String,
    /// Requested connection size in bytes; above 511 uses the large Forward Open
    pub packet_size: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
    /// Echoed back by the target in every reply header
    pub sender_context: u64,
    /// Requested packet interval for both directions
    pub rpi: Duration,
    pub timeout_multiplier: u8,
    /// Comma-separated `port,link` pairs from the adapter to the target CPU
    pub route: String,
    /// Deadline for connect and for each socket read and write
    pub io_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            packet_size: DEFAULT_PACKET_SIZE,
            vendor_id: DEFAULT_VENDOR_ID,
            originator_serial: DEFAULT_ORIGINATOR_SERIAL,
            sender_context: 0,
            rpi: DEFAULT_RPI,
            timeout_multiplier: DEFAULT_TIMEOUT_MULTIPLIER,
            route: DEFAULT_ROUTE.to_string(),
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

impl ConnectionConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// Connection path of the Forward Open: the route followed by the
    /// Message Router
    pub fn connection_path(&self) -> EipResult<CipPath> {
        Ok(CipPath::parse_route(&self.route)?.join(&CipPath::message_router()))
    }

    /// RPI in microseconds as carried by the Forward Open, saturating at u32::MAX
    pub fn rpi_micros(&self) -> u32 {
        u32::try_from(self.rpi.as_micros()).unwrap_or(u32::MAX)
    }

    pub fn tcp_settings(&self) -> TcpSettings {
        let mut settings = TcpSettings::new(&self.address);
        settings.timeout = self.io_timeout;
        settings
    }

    /// Check the configuration before any socket is opened
    ///
    /// # Errors
    /// `EipError::InvalidData` for an empty address or a zero packet size,
    /// or whatever encoding the route fails with.
    pub fn validate(&self) -> EipResult<()> {
        if self.address.trim().is_empty() {
            return Err(EipError::InvalidData("address is empty".to_string()));
        }
        if self.packet_size == 0 {
            return Err(EipError::InvalidData(
                "packet size must be greater than zero".to_string(),
            ));
        }
        self.connection_path()?.encode()?;
        Ok(())
    }
}
