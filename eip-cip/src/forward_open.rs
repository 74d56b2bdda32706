//! Forward Open request and reply records
//!
//! Forward Open exists in two layouts that differ only in the width of the
//! network connection parameter words:
//!
//! | format     | service | parameters | max size |
//! |------------|---------|------------|----------|
//! | `Standard` | `0x54`  | 16-bit     | 511      |
//! | `Large`    | `0x5B`  | 32-bit     | 65535    |
//!
//! Both are carried by one [`ForwardOpenRequest`] tagged with its
//! [`ForwardOpenFormat`], so callers build and parse them the same way.

use crate::path::CipPath;
use bytes::{BufMut, BytesMut};
use eip_core::{EipError, EipResult, WireDecode, WireEncode, WireReader};

/// Forward Open service code (16-bit connection parameters)
pub const SERVICE_FORWARD_OPEN: u8 = 0x54;
/// Large Forward Open service code (32-bit connection parameters)
pub const SERVICE_LARGE_FORWARD_OPEN: u8 = 0x5B;

/// Largest connection size the 9-bit size field of a 16-bit parameter word holds
pub const STANDARD_MAX_CONNECTION_SIZE: u16 = 0x01FF;

/// Connection type: point-to-point
pub const CONNECTION_TYPE_POINT_TO_POINT: u16 = 0x4000;
/// Size type: variable
pub const CONNECTION_SIZE_VARIABLE: u16 = 0x0200;

/// Priority/tick time byte, 2^10 ms ticks
pub const DEFAULT_PRIORITY_TIME_TICK: u8 = 0x0A;
/// Timeout ticks, 14 * 1024 ms before the unconnected request is abandoned
pub const DEFAULT_TIMEOUT_TICKS: u8 = 0x0E;
/// Connection timeout multiplier code (x32 RPI)
pub const DEFAULT_TIMEOUT_MULTIPLIER: u8 = 0x03;
/// Class 3, application triggered, server transport
pub const TRANSPORT_CLASS3_SERVER: u8 = 0xA3;

/// Layout of a Forward Open request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOpenFormat {
    /// Service 0x54, 16-bit network connection parameters
    Standard,
    /// Service 0x5B, 32-bit network connection parameters
    Large,
}

impl ForwardOpenFormat {
    /// Smallest layout able to carry `size`
    pub fn for_size(size: u16) -> Self {
        if size <= STANDARD_MAX_CONNECTION_SIZE {
            ForwardOpenFormat::Standard
        } else {
            ForwardOpenFormat::Large
        }
    }

    pub fn service(self) -> u8 {
        match self {
            ForwardOpenFormat::Standard => SERVICE_FORWARD_OPEN,
            ForwardOpenFormat::Large => SERVICE_LARGE_FORWARD_OPEN,
        }
    }

    pub fn from_service(service: u8) -> Option<Self> {
        match service {
            SERVICE_FORWARD_OPEN => Some(ForwardOpenFormat::Standard),
            SERVICE_LARGE_FORWARD_OPEN => Some(ForwardOpenFormat::Large),
            _ => None,
        }
    }

    /// Encoded width of one network connection parameter field
    pub fn parameter_width(self) -> usize {
        match self {
            ForwardOpenFormat::Standard => 2,
            ForwardOpenFormat::Large => 4,
        }
    }
}

/// Network connection parameters of one direction
///
/// `flags` holds the owner/type/priority/size-type bits as they appear in the
/// 16-bit word; the Large layout moves them into the upper half of a 32-bit
/// word and gives the size the whole lower half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub flags: u16,
    pub size: u16,
}

impl ConnectionParameters {
    /// Point-to-point, variable size connection of `size` bytes
    pub fn point_to_point(size: u16) -> Self {
        Self {
            flags: CONNECTION_TYPE_POINT_TO_POINT | CONNECTION_SIZE_VARIABLE,
            size,
        }
    }

    pub fn fits_standard(&self) -> bool {
        self.size <= STANDARD_MAX_CONNECTION_SIZE && self.flags & STANDARD_MAX_CONNECTION_SIZE == 0
    }

    pub fn to_standard(&self) -> u16 {
        self.flags | (self.size & STANDARD_MAX_CONNECTION_SIZE)
    }

    pub fn to_large(&self) -> u32 {
        ((self.flags as u32) << 16) | self.size as u32
    }

    pub fn from_standard(word: u16) -> Self {
        Self {
            flags: word & !STANDARD_MAX_CONNECTION_SIZE,
            size: word & STANDARD_MAX_CONNECTION_SIZE,
        }
    }

    pub fn from_large(word: u32) -> Self {
        Self {
            flags: (word >> 16) as u16,
            size: word as u16,
        }
    }
}

/// Forward Open request, either layout
///
/// Paths are kept in their encoded form: one byte with the size in words,
/// then the segment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOpenRequest {
    pub format: ForwardOpenFormat,
    /// Path to the Connection Manager, `02 20 06 24 01`
    pub request_path: Vec<u8>,
    pub priority_time_tick: u8,
    pub timeout_ticks: u8,
    pub ot_connection_id: u32,
    pub to_connection_id: u32,
    pub connection_serial: u16,
    pub vendor_id: u16,
    pub originator_serial: u32,
    pub timeout_multiplier: u8,
    /// Requested packet interval originator to target, microseconds
    pub ot_rpi: u32,
    pub ot_parameters: ConnectionParameters,
    /// Requested packet interval target to originator, microseconds
    pub to_rpi: u32,
    pub to_parameters: ConnectionParameters,
    pub transport_trigger: u8,
    /// Route to the target module plus the object the connection ends at
    pub connection_path: Vec<u8>,
}

impl ForwardOpenRequest {
    /// Request for a `packet_size`-byte point-to-point connection along
    /// `connection_path`, with the layout chosen from the size
    ///
    /// Identity fields (IDs, serials, vendor) and RPIs start at zero and are
    /// filled in by the connection manager.
    pub fn new(packet_size: u16, connection_path: &CipPath) -> EipResult<Self> {
        if packet_size == 0 {
            return Err(EipError::InvalidData(
                "connection size must be greater than zero".to_string(),
            ));
        }
        let parameters = ConnectionParameters::point_to_point(packet_size);
        let format = ForwardOpenFormat::for_size(packet_size);

        Ok(Self {
            format,
            request_path: CipPath::connection_manager().encode()?,
            priority_time_tick: DEFAULT_PRIORITY_TIME_TICK,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            ot_connection_id: 0,
            to_connection_id: 0,
            connection_serial: 0,
            vendor_id: 0,
            originator_serial: 0,
            timeout_multiplier: DEFAULT_TIMEOUT_MULTIPLIER,
            ot_rpi: 0,
            ot_parameters: parameters,
            to_rpi: 0,
            to_parameters: parameters,
            transport_trigger: TRANSPORT_CLASS3_SERVER,
            connection_path: connection_path.encode()?,
        })
    }

    pub fn service(&self) -> u8 {
        self.format.service()
    }
}

fn put_parameters(buf: &mut BytesMut, format: ForwardOpenFormat, params: &ConnectionParameters) {
    match format {
        ForwardOpenFormat::Standard => buf.put_u16_le(params.to_standard()),
        ForwardOpenFormat::Large => buf.put_u32_le(params.to_large()),
    }
}

fn read_parameters(
    reader: &mut WireReader<'_>,
    format: ForwardOpenFormat,
) -> EipResult<ConnectionParameters> {
    Ok(match format {
        ForwardOpenFormat::Standard => ConnectionParameters::from_standard(reader.read_u16()?),
        ForwardOpenFormat::Large => ConnectionParameters::from_large(reader.read_u32()?),
    })
}

/// Read a path stored as `[words, bytes...]`, keeping the size byte
pub(crate) fn read_counted_path(reader: &mut WireReader<'_>) -> EipResult<Vec<u8>> {
    let words = reader.read_u8()?;
    let mut path = Vec::with_capacity(1 + words as usize * 2);
    path.push(words);
    path.extend_from_slice(reader.read_bytes(words as usize * 2)?);
    Ok(path)
}

impl WireEncode for ForwardOpenRequest {
    fn encoded_len(&self) -> usize {
        // service + paths + fixed fields + two parameter words
        1 + self.request_path.len() + 31 + 2 * self.format.parameter_width()
            + self.connection_path.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.service());
        buf.put_slice(&self.request_path);
        buf.put_u8(self.priority_time_tick);
        buf.put_u8(self.timeout_ticks);
        buf.put_u32_le(self.ot_connection_id);
        buf.put_u32_le(self.to_connection_id);
        buf.put_u16_le(self.connection_serial);
        buf.put_u16_le(self.vendor_id);
        buf.put_u32_le(self.originator_serial);
        buf.put_u8(self.timeout_multiplier);
        buf.put_slice(&[0, 0, 0]);
        buf.put_u32_le(self.ot_rpi);
        put_parameters(buf, self.format, &self.ot_parameters);
        buf.put_u32_le(self.to_rpi);
        put_parameters(buf, self.format, &self.to_parameters);
        buf.put_u8(self.transport_trigger);
        buf.put_slice(&self.connection_path);
    }
}

impl WireDecode for ForwardOpenRequest {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        let service = reader.read_u8()?;
        let format = ForwardOpenFormat::from_service(service).ok_or_else(|| {
            EipError::InvalidData(format!("service 0x{:02X} is not a Forward Open", service))
        })?;
        let request_path = read_counted_path(reader)?;
        let priority_time_tick = reader.read_u8()?;
        let timeout_ticks = reader.read_u8()?;
        let ot_connection_id = reader.read_u32()?;
        let to_connection_id = reader.read_u32()?;
        let connection_serial = reader.read_u16()?;
        let vendor_id = reader.read_u16()?;
        let originator_serial = reader.read_u32()?;
        let timeout_multiplier = reader.read_u8()?;
        reader.skip(3)?;
        let ot_rpi = reader.read_u32()?;
        let ot_parameters = read_parameters(reader, format)?;
        let to_rpi = reader.read_u32()?;
        let to_parameters = read_parameters(reader, format)?;
        let transport_trigger = reader.read_u8()?;
        let connection_path = read_counted_path(reader)?;

        Ok(Self {
            format,
            request_path,
            priority_time_tick,
            timeout_ticks,
            ot_connection_id,
            to_connection_id,
            connection_serial,
            vendor_id,
            originator_serial,
            timeout_multiplier,
            ot_rpi,
            ot_parameters,
            to_rpi,
            to_parameters,
            transport_trigger,
            connection_path,
        })
    }
}

/// Leading part of a successful Forward Open reply
///
/// `reserved` spans the Message Router envelope bytes (reserved, general
/// status, additional status size); check the general status with
/// [`crate::MessageRouterResponse`] before trusting the IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOpenReply {
    pub service: u8,
    pub reserved: [u8; 3],
    /// O->T connection ID chosen by the target
    pub ot_connection_id: u32,
    /// T->O connection ID
    pub to_connection_id: u32,
    pub reserved_tail: u16,
}

impl ForwardOpenReply {
    pub const LENGTH: usize = 14;

    pub fn general_status(&self) -> u8 {
        self.reserved[1]
    }
}

impl WireEncode for ForwardOpenReply {
    fn encoded_len(&self) -> usize {
        Self::LENGTH
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.service);
        buf.put_slice(&self.reserved);
        buf.put_u32_le(self.ot_connection_id);
        buf.put_u32_le(self.to_connection_id);
        buf.put_u16_le(self.reserved_tail);
    }
}

impl WireDecode for ForwardOpenReply {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        Ok(Self {
            service: reader.read_u8()?,
            reserved: reader.read_array()?,
            ot_connection_id: reader.read_u32()?,
            to_connection_id: reader.read_u32()?,
            reserved_tail: reader.read_u16()?,
        })
    }
}
