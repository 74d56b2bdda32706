//! Encapsulation session management
//!
//! A [`Session`] owns the transport, the session handle assigned by the
//! target on RegisterSession, the sender context and the per-session sequence
//! counter. Every outbound encapsulation command bumps the counter by one.
//!
//! Replies are matched to requests by sender context: each request carries
//! the configured context with its sequence number in the top 16 bits, and a
//! reply echoing any other context is a late answer to an earlier request.

use crate::frame::{EncapsulationFrame, FrameTransport};
use crate::header::{EncapsulationCommand, RegisterSessionData};
use bytes::Bytes;
use eip_cip::{CommonPacket, RrDataPrefix};
use eip_core::{EipError, EipResult, WireDecode, WireEncode, WireReader};
use eip_transport::TransportLayer;

/// Timeout in seconds put in the SendRRData prefix
pub const DEFAULT_RR_TIMEOUT: u16 = 5;

/// Sender context of the request sent with `sequence`
pub fn request_context(sender_context: u64, sequence: u16) -> u64 {
    (sender_context & 0x0000_FFFF_FFFF_FFFF) | (u64::from(sequence) << 48)
}

#[derive(Debug)]
pub struct Session<T: TransportLayer> {
    frames: FrameTransport<T>,
    session_handle: u32,
    sender_context: u64,
    sequence_counter: u16,
}

impl<T: TransportLayer> Session<T> {
    /// Create an unregistered session; the transport is opened by `register`
    pub fn new(transport: T, sender_context: u64) -> Self {
        Self {
            frames: FrameTransport::new(transport),
            session_handle: 0,
            sender_context,
            sequence_counter: 0,
        }
    }

    /// Session handle assigned by the target, 0 while unregistered
    pub fn session_handle(&self) -> u32 {
        self.session_handle
    }

    pub fn is_registered(&self) -> bool {
        self.session_handle != 0
    }

    pub fn sender_context(&self) -> u64 {
        self.sender_context
    }

    /// Number of encapsulation commands sent on this session, modulo 2^16
    pub fn sequence_counter(&self) -> u16 {
        self.sequence_counter
    }

    pub fn transport(&self) -> &T {
        self.frames.transport()
    }

    /// Open the transport and register a session with the target
    ///
    /// No-op when already registered.
    ///
    /// # Errors
    /// - `EipError::Connect` if the socket cannot be opened
    /// - `EipError::Protocol` if the reply carries a non-zero status
    pub async fn register(&mut self) -> EipResult<()> {
        if self.is_registered() {
            return Ok(());
        }

        if self.frames.is_closed() {
            self.frames.open().await?;
        }
        self.sequence_counter = 0;

        let result = self.register_on_open_transport().await;
        if result.is_err() {
            let _ = self.frames.close().await;
        }
        result
    }

    async fn register_on_open_transport(&mut self) -> EipResult<()> {
        let request = RegisterSessionData::default();
        let reply = self
            .round_trip(EncapsulationCommand::RegisterSession, &[&request])
            .await?;

        if reply.header.session_handle == 0 {
            return Err(EipError::InvalidData(
                "target registered session handle 0".to_string(),
            ));
        }
        self.session_handle = reply.header.session_handle;
        log::info!("Registered session 0x{:08X}", self.session_handle);
        Ok(())
    }

    /// Unregister the session and close the transport
    ///
    /// No reply is expected. Failures are logged and swallowed: the target
    /// drops stale sessions on its own. No-op when not registered.
    pub async fn unregister(&mut self) {
        if !self.is_registered() {
            return;
        }

        if let Err(e) = self
            .send_command(EncapsulationCommand::UnRegisterSession, &[])
            .await
        {
            log::warn!(
                "UnRegisterSession for 0x{:08X} failed: {}",
                self.session_handle,
                e
            );
        }
        if let Err(e) = self.frames.close().await {
            log::warn!("Closing transport failed: {}", e);
        }
        log::info!("Unregistered session 0x{:08X}", self.session_handle);
        self.session_handle = 0;
    }

    /// Drop the session without talking to the target, e.g. after the peer
    /// closed the socket
    pub async fn abandon(&mut self) {
        let _ = self.frames.close().await;
        self.session_handle = 0;
    }

    /// Send one command without waiting for a reply
    pub async fn send_command(
        &mut self,
        command: EncapsulationCommand,
        parts: &[&(dyn WireEncode + Sync)],
    ) -> EipResult<()> {
        self.sequence_counter = self.sequence_counter.wrapping_add(1);
        let context = request_context(self.sender_context, self.sequence_counter);
        self.frames
            .send_frame(command, self.session_handle, context, parts)
            .await
    }

    /// Send one command and read its reply frame
    ///
    /// Frames echoing another request's context are discarded; each read is
    /// still bounded by the transport deadline.
    ///
    /// # Errors
    /// `EipError::Protocol` when the reply status is non-zero,
    /// `EipError::InvalidData` when the reply answers a different command.
    pub async fn round_trip(
        &mut self,
        command: EncapsulationCommand,
        parts: &[&(dyn WireEncode + Sync)],
    ) -> EipResult<EncapsulationFrame> {
        self.send_command(command, parts).await?;
        let expected = request_context(self.sender_context, self.sequence_counter);
        let reply = loop {
            let frame = self.frames.receive_frame().await?;
            if frame.header.sender_context == expected {
                break frame;
            }
            log::warn!(
                "Discarding stale {:?} reply: context 0x{:016X}, expected 0x{:016X}",
                frame.header.command,
                frame.header.sender_context,
                expected
            );
        };

        if reply.header.status != 0 {
            return Err(EipError::Protocol {
                status: reply.header.status,
            });
        }
        if reply.header.command != command {
            return Err(EipError::InvalidData(format!(
                "expected reply to {:?}, got {:?}",
                command, reply.header.command
            )));
        }
        Ok(reply)
    }

    /// Unconnected explicit exchange: SendRRData carrying `packet`
    pub async fn send_rr_data(&mut self, packet: &CommonPacket) -> EipResult<CommonPacket> {
        self.ensure_registered()?;
        let prefix = RrDataPrefix {
            interface_handle: 0,
            timeout: DEFAULT_RR_TIMEOUT,
        };
        let reply = self
            .round_trip(EncapsulationCommand::SendRRData, &[&prefix, packet])
            .await?;
        decode_item_payload(&reply.payload)
    }

    /// Connected exchange: SendUnitData addressed to `connection_id`
    ///
    /// The connected data item carries the sequence counter value of this
    /// command. Returns the reply's connected data payload without its
    /// sequence number.
    pub async fn send_unit_data(&mut self, connection_id: u32, request: Bytes) -> EipResult<Bytes> {
        self.ensure_registered()?;
        let sequence = self.sequence_counter.wrapping_add(1);
        let packet = CommonPacket::connected(connection_id, sequence, request);
        let prefix = RrDataPrefix::default();
        let reply = self
            .round_trip(EncapsulationCommand::SendUnitData, &[&prefix, &packet])
            .await?;

        let packet = decode_item_payload(&reply.payload)?;
        packet
            .connected_payload()
            .map(|(_, data)| data.clone())
            .ok_or_else(|| {
                EipError::InvalidData("SendUnitData reply without connected data item".to_string())
            })
    }

    /// Keep-alive: NOP with no payload and no reply
    pub async fn nop(&mut self) -> EipResult<()> {
        self.ensure_registered()?;
        self.send_command(EncapsulationCommand::Nop, &[]).await
    }

    fn ensure_registered(&self) -> EipResult<()> {
        if self.is_registered() {
            Ok(())
        } else {
            Err(EipError::NotConnected)
        }
    }
}

fn decode_item_payload(payload: &[u8]) -> EipResult<CommonPacket> {
    let mut reader = WireReader::new(payload);
    let _prefix = RrDataPrefix::decode(&mut reader)?;
    CommonPacket::decode(&mut reader)
}
