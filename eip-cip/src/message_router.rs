//! Message Router reply envelope
//!
//! Every explicit CIP reply starts with the echoed service code (with the
//! reply bit set), a reserved byte, the general status and a counted list of
//! additional status words. Service-specific reply data follows.

use bytes::Bytes;
use eip_core::status::STATUS_SUCCESS;
use eip_core::{EipError, EipResult, WireDecode, WireReader};

/// Bit set in the service code of every reply
pub const REPLY_FLAG: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRouterResponse {
    /// Service code as sent in the reply, reply flag included
    pub reply_service: u8,
    pub general_status: u8,
    pub additional_status: Vec<u16>,
    pub data: Bytes,
}

impl MessageRouterResponse {
    /// Service code of the request this reply answers
    pub fn service(&self) -> u8 {
        self.reply_service & !REPLY_FLAG
    }

    pub fn is_success(&self) -> bool {
        self.general_status == STATUS_SUCCESS
    }

    /// First additional status word, 0 when none was sent
    pub fn extended_status(&self) -> u16 {
        self.additional_status.first().copied().unwrap_or(0)
    }

    /// Turn a failed reply into `EipError::ServiceFailed`
    pub fn into_result(self) -> EipResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(EipError::ServiceFailed {
                service: self.service(),
                status: self.general_status,
                extended_status: self.extended_status(),
            })
        }
    }
}

impl WireDecode for MessageRouterResponse {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        let reply_service = reader.read_u8()?;
        if reply_service & REPLY_FLAG == 0 {
            return Err(EipError::InvalidData(format!(
                "service 0x{:02X} is not a reply",
                reply_service
            )));
        }
        let _reserved = reader.read_u8()?;
        let general_status = reader.read_u8()?;
        let additional_words = reader.read_u8()? as usize;
        let mut additional_status = Vec::with_capacity(additional_words);
        for _ in 0..additional_words {
            additional_status.push(reader.read_u16()?);
        }
        Ok(Self {
            reply_service,
            general_status,
            additional_status,
            data: Bytes::copy_from_slice(reader.read_rest()),
        })
    }
}
