//! Encapsulation header and commands

use bytes::{BufMut, BytesMut};
use eip_core::{EipResult, WireDecode, WireEncode, WireReader};

/// Encapsulation header length
pub const ENCAPSULATION_HEADER_LENGTH: usize = 24;

/// Encapsulation protocol version sent in RegisterSession
pub const PROTOCOL_VERSION: u16 = 1;

/// Encapsulation command codes used by an originator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapsulationCommand {
    Nop,
    ListIdentity,
    RegisterSession,
    UnRegisterSession,
    SendRRData,
    SendUnitData,
    Other(u16),
}

impl EncapsulationCommand {
    pub fn code(self) -> u16 {
        match self {
            EncapsulationCommand::Nop => 0x0000,
            EncapsulationCommand::ListIdentity => 0x0063,
            EncapsulationCommand::RegisterSession => 0x0065,
            EncapsulationCommand::UnRegisterSession => 0x0066,
            EncapsulationCommand::SendRRData => 0x006F,
            EncapsulationCommand::SendUnitData => 0x0070,
            EncapsulationCommand::Other(code) => code,
        }
    }
}

impl From<u16> for EncapsulationCommand {
    fn from(code: u16) -> Self {
        match code {
            0x0000 => EncapsulationCommand::Nop,
            0x0063 => EncapsulationCommand::ListIdentity,
            0x0065 => EncapsulationCommand::RegisterSession,
            0x0066 => EncapsulationCommand::UnRegisterSession,
            0x006F => EncapsulationCommand::SendRRData,
            0x0070 => EncapsulationCommand::SendUnitData,
            other => EncapsulationCommand::Other(other),
        }
    }
}

/// Encapsulation header (24 bytes, little-endian)
///
/// | Offset | Field          | Size |
/// |--------|----------------|------|
/// | 0      | command        | 2    |
/// | 2      | length         | 2    |
/// | 4      | session handle | 4    |
/// | 8      | status         | 4    |
/// | 12     | sender context | 8    |
/// | 20     | options        | 4    |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapsulationHeader {
    pub command: EncapsulationCommand,
    /// Byte count of the payload following the header
    pub length: u16,
    pub session_handle: u32,
    pub status: u32,
    /// Echoed back verbatim by the target
    pub sender_context: u64,
    pub options: u32,
}

impl EncapsulationHeader {
    /// Request header with zero status and options
    pub fn new(
        command: EncapsulationCommand,
        length: u16,
        session_handle: u32,
        sender_context: u64,
    ) -> Self {
        Self {
            command,
            length,
            session_handle,
            status: 0,
            sender_context,
            options: 0,
        }
    }

    pub fn payload_length(&self) -> usize {
        self.length as usize
    }
}

impl WireEncode for EncapsulationHeader {
    fn encoded_len(&self) -> usize {
        ENCAPSULATION_HEADER_LENGTH
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.command.code());
        buf.put_u16_le(self.length);
        buf.put_u32_le(self.session_handle);
        buf.put_u32_le(self.status);
        buf.put_u64_le(self.sender_context);
        buf.put_u32_le(self.options);
    }
}

impl WireDecode for EncapsulationHeader {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        Ok(Self {
            command: EncapsulationCommand::from(reader.read_u16()?),
            length: reader.read_u16()?,
            session_handle: reader.read_u32()?,
            status: reader.read_u32()?,
            sender_context: reader.read_u64()?,
            options: reader.read_u32()?,
        })
    }
}

/// RegisterSession request/reply payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSessionData {
    pub protocol_version: u16,
    pub option_flags: u16,
}

impl Default for RegisterSessionData {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            option_flags: 0,
        }
    }
}

impl WireEncode for RegisterSessionData {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.protocol_version);
        buf.put_u16_le(self.option_flags);
    }
}

impl WireDecode for RegisterSessionData {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        Ok(Self {
            protocol_version: reader.read_u16()?,
            option_flags: reader.read_u16()?,
        })
    }
}
