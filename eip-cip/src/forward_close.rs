//! Forward Close request
//!
//! The target identifies the connection to tear down by the triple
//! (connection serial, vendor ID, originator serial) sent in the matching
//! Forward Open, not by connection ID.

use crate::forward_open::{
    read_counted_path, ForwardOpenRequest, DEFAULT_PRIORITY_TIME_TICK, DEFAULT_TIMEOUT_TICKS,
};
use crate::path::CipPath;
use bytes::{BufMut, BytesMut};
use eip_core::{EipError, EipResult, WireDecode, WireEncode, WireReader};

/// Forward Close service code
pub const SERVICE_FORWARD_CLOSE: u8 = 0x4E;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCloseRequest {
    /// Path to the Connection Manager, `02 20 06 24 01`
    pub request_path: Vec<u8>,
    pub priority_time_tick: u8,
    pub timeout_ticks: u8,
    pub connection_serial: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
    /// `[words, bytes...]`; a reserved byte follows the size on the wire
    pub connection_path: Vec<u8>,
}

impl ForwardCloseRequest {
    pub fn new(
        connection_serial: u16,
        vendor_id: u16,
        originator_serial: u32,
        connection_path: &CipPath,
    ) -> EipResult<Self> {
        Ok(Self {
            request_path: CipPath::connection_manager().encode()?,
            priority_time_tick: DEFAULT_PRIORITY_TIME_TICK,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            connection_serial,
            vendor_id,
            originator_serial,
            connection_path: connection_path.encode()?,
        })
    }

    /// Close request for the connection `open` established
    pub fn matching(open: &ForwardOpenRequest) -> Self {
        Self {
            request_path: open.request_path.clone(),
            priority_time_tick: open.priority_time_tick,
            timeout_ticks: open.timeout_ticks,
            connection_serial: open.connection_serial,
            vendor_id: open.vendor_id,
            originator_serial: open.originator_serial,
            connection_path: open.connection_path.clone(),
        }
    }
}

impl WireEncode for ForwardCloseRequest {
    fn encoded_len(&self) -> usize {
        // the path size byte is counted in connection_path, the reserved byte is not
        1 + self.request_path.len() + 10 + self.connection_path.len() + 1
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(SERVICE_FORWARD_CLOSE);
        buf.put_slice(&self.request_path);
        buf.put_u8(self.priority_time_tick);
        buf.put_u8(self.timeout_ticks);
        buf.put_u16_le(self.connection_serial);
        buf.put_u16_le(self.vendor_id);
        buf.put_u32_le(self.originator_serial);
        match self.connection_path.split_first() {
            Some((words, segments)) => {
                buf.put_u8(*words);
                buf.put_u8(0);
                buf.put_slice(segments);
            }
            None => {
                buf.put_u8(0);
                buf.put_u8(0);
            }
        }
    }
}

impl WireDecode for ForwardCloseRequest {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        let service = reader.read_u8()?;
        if service != SERVICE_FORWARD_CLOSE {
            return Err(EipError::InvalidData(format!(
                "service 0x{:02X} is not a Forward Close",
                service
            )));
        }
        let request_path = read_counted_path(reader)?;
        let priority_time_tick = reader.read_u8()?;
        let timeout_ticks = reader.read_u8()?;
        let connection_serial = reader.read_u16()?;
        let vendor_id = reader.read_u16()?;
        let originator_serial = reader.read_u32()?;
        let words = reader.read_u8()?;
        let _reserved = reader.read_u8()?;
        let mut connection_path = vec![words];
        connection_path.extend_from_slice(reader.read_bytes(words as usize * 2)?);

        Ok(Self {
            request_path,
            priority_time_tick,
            timeout_ticks,
            connection_serial,
            vendor_id,
            originator_serial,
            connection_path,
        })
    }
}
