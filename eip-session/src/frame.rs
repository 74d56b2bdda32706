//! Encapsulation framing over a byte stream

use crate::header::{EncapsulationCommand, EncapsulationHeader, ENCAPSULATION_HEADER_LENGTH};
use bytes::{Bytes, BytesMut};
use eip_core::wire::encoded_len_of;
use eip_core::{EipError, EipResult, WireDecode, WireEncode, WireReader};
use eip_transport::{StreamAccessor, TransportLayer};

/// One encapsulation frame: header plus exactly `header.length` payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulationFrame {
    pub header: EncapsulationHeader,
    pub payload: Bytes,
}

impl EncapsulationFrame {
    /// Build a frame whose header length matches `payload`
    pub fn new(
        command: EncapsulationCommand,
        session_handle: u32,
        sender_context: u64,
        payload: Bytes,
    ) -> EipResult<Self> {
        let length = payload_length(payload.len())?;
        Ok(Self {
            header: EncapsulationHeader::new(command, length, session_handle, sender_context),
            payload,
        })
    }

    /// Encode header and payload into one buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ENCAPSULATION_HEADER_LENGTH + self.payload.len());
        self.header.encode(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a frame from a buffer
    ///
    /// Bytes beyond the declared payload length are ignored; fewer than
    /// declared is a `TruncatedFrame` error.
    pub fn decode(data: &[u8]) -> EipResult<Self> {
        let mut reader = WireReader::new(data);
        let header = EncapsulationHeader::decode(&mut reader)?;
        let payload = reader.read_bytes(header.payload_length())?;
        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

fn payload_length(len: usize) -> EipResult<u16> {
    u16::try_from(len).map_err(|_| {
        EipError::InvalidData(format!(
            "encapsulation payload of {} bytes exceeds 65535",
            len
        ))
    })
}

/// Writes and reads whole encapsulation frames on a transport
///
/// Strictly request/response: the caller sends one frame and reads exactly
/// one frame back before sending the next.
#[derive(Debug)]
pub struct FrameTransport<T: TransportLayer> {
    transport: T,
}

impl<T: TransportLayer> FrameTransport<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn open(&mut self) -> EipResult<()> {
        self.transport.open().await
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub async fn close(&mut self) -> EipResult<()> {
        self.transport.close().await
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send `parts` as the payload of one `command` frame
    ///
    /// The header length is the sum of the parts' encoded lengths. Header and
    /// parts go out in a single buffer.
    pub async fn send_frame(
        &mut self,
        command: EncapsulationCommand,
        session_handle: u32,
        sender_context: u64,
        parts: &[&(dyn WireEncode + Sync)],
    ) -> EipResult<()> {
        let length = payload_length(encoded_len_of(parts))?;
        let header = EncapsulationHeader::new(command, length, session_handle, sender_context);

        let mut buf = BytesMut::with_capacity(ENCAPSULATION_HEADER_LENGTH + length as usize);
        header.encode(&mut buf);
        for part in parts {
            part.encode(&mut buf);
        }
        debug_assert_eq!(buf.len(), ENCAPSULATION_HEADER_LENGTH + length as usize);

        log::debug!(
            "-> {:?} session=0x{:08X} length={}",
            command,
            session_handle,
            length
        );
        self.transport.write_all(&buf).await?;
        self.transport.flush().await
    }

    /// Read one frame: the fixed header, then exactly `length` payload bytes
    ///
    /// A failure before the first byte leaves the stream on a frame
    /// boundary. Once part of a frame has been consumed, any failure closes
    /// the transport, since the next read would start mid-frame.
    pub async fn receive_frame(&mut self) -> EipResult<EncapsulationFrame> {
        let mut header_bytes = [0u8; ENCAPSULATION_HEADER_LENGTH];
        let first = self.transport.read(&mut header_bytes).await?;
        if first == 0 {
            return Err(EipError::ConnectionClosed);
        }

        match self.finish_frame(header_bytes, first).await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                log::warn!("Frame read failed mid-frame, closing transport: {}", e);
                let _ = self.transport.close().await;
                Err(e)
            }
        }
    }

    async fn finish_frame(
        &mut self,
        mut header_bytes: [u8; ENCAPSULATION_HEADER_LENGTH],
        filled: usize,
    ) -> EipResult<EncapsulationFrame> {
        self.transport.read_exact(&mut header_bytes[filled..]).await?;
        let header = EncapsulationHeader::from_bytes(&header_bytes)?;

        let mut payload = vec![0u8; header.payload_length()];
        if !payload.is_empty() {
            self.transport.read_exact(&mut payload).await?;
        }

        log::debug!(
            "<- {:?} session=0x{:08X} status=0x{:08X} length={}",
            header.command,
            header.session_handle,
            header.status,
            header.length
        );
        Ok(EncapsulationFrame {
            header,
            payload: Bytes::from(payload),
        })
    }
}
