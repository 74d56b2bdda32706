//! Connection state machine for the EtherNet/IP client
//!
//! A [`Connection`] owns the socket, the encapsulation session and the CIP
//! connection it opens on top of it.
//!
//! # Lifecycle
//!
//! ```text
//! Unregistered --connect--> Registered --Forward Open--> Open
//!       ^                        ^   |                     |
//!       |                        |   +-- rejected ---------+ (stays Registered)
//!       |                        +------ I/O error on Open-+
//!    (new)                                                 |
//! Closed <----------- disconnect / peer closed ------------+
//! ```
//!
//! # Concurrency
//!
//! The protocol is half-duplex: a request and its reply are paired by
//! position on the socket, and the session drops any reply whose sender
//! context belongs to an earlier request. All mutable state sits behind one
//! `tokio::sync::Mutex` that every public operation holds from its first
//! write until its reply has been read, so concurrent callers queue up
//! instead of interleaving frames.

use super::config::ConnectionConfig;
use bytes::Bytes;
use eip_cip::{
    CommonPacket, ForwardCloseRequest, ForwardOpenReply, ForwardOpenRequest,
    MessageRouterResponse, SERVICE_FORWARD_CLOSE,
};
use eip_core::{EipError, EipResult, WireDecode, WireEncode};
use eip_session::Session;
use eip_transport::{StreamAccessor, TcpTransport};
use std::fmt;
use tokio::sync::Mutex;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket and no session
    Unregistered,
    /// Session registered, no CIP connection
    Registered,
    /// Forward Open accepted, connected messaging available
    Open,
    /// Torn down by `disconnect` or by the peer
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unregistered => "unregistered",
            ConnectionState::Registered => "registered",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of the connection's identifiers and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// 0 while no session is registered
    pub session_handle: u32,
    pub ot_connection_id: u32,
    pub to_connection_id: u32,
    /// Serial of the Forward Open that opened the connection
    pub connection_serial: Option<u16>,
    pub sequence_counter: u16,
    pub packet_size: u16,
}

#[derive(Debug)]
struct ConnectionInner {
    state: ConnectionState,
    session: Option<Session<TcpTransport>>,
    /// Size requested by the next Forward Open
    packet_size: u16,
    ot_connection_id: u32,
    to_connection_id: u32,
    /// The accepted Forward Open, kept for the matching Forward Close
    open_request: Option<ForwardOpenRequest>,
}

/// EtherNet/IP originator connection
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    inner: Mutex<ConnectionInner>,
}

impl Connection {
    /// Create an unregistered connection; nothing is sent until `connect`
    pub fn new(config: ConnectionConfig) -> Self {
        let inner = ConnectionInner {
            state: ConnectionState::Unregistered,
            session: None,
            packet_size: config.packet_size,
            ot_connection_id: 0,
            to_connection_id: 0,
            open_request: None,
        };
        Self {
            config,
            inner: Mutex::new(inner),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Register a session if needed and open the CIP connection
    ///
    /// No-op when already open. A Forward Open rejection leaves the session
    /// registered, so the caller can lower the packet size with
    /// `set_packet_size` and call `connect` again.
    ///
    /// # Errors
    /// - `EipError::Connect` when the socket cannot be opened
    /// - `EipError::Protocol` when RegisterSession is refused
    /// - `EipError::ForwardOpenRejected` with the target's CIP status
    pub async fn connect(&self) -> EipResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            ConnectionState::Open => return Ok(()),
            ConnectionState::Unregistered | ConnectionState::Closed => {
                let mut session = Session::new(
                    TcpTransport::new(self.config.tcp_settings()),
                    self.config.sender_context,
                );
                session.register().await?;
                inner.session = Some(session);
                inner.state = ConnectionState::Registered;
            }
            ConnectionState::Registered => {}
        }

        inner.forward_open(&self.config).await
    }

    /// Close the CIP connection and unregister the session
    ///
    /// No-op when unregistered or closed. Teardown always completes; a failed
    /// Forward Close is returned after the session is gone.
    pub async fn disconnect(&self) -> EipResult<()> {
        let mut inner = self.inner.lock().await;
        if matches!(
            inner.state,
            ConnectionState::Unregistered | ConnectionState::Closed
        ) {
            return Ok(());
        }

        let close_result = if inner.state == ConnectionState::Open {
            inner.forward_close().await
        } else {
            Ok(())
        };
        if let Err(e) = &close_result {
            log::warn!("Forward Close failed: {}", e);
        }

        if let Some(mut session) = inner.session.take() {
            session.unregister().await;
        }
        inner.state = ConnectionState::Closed;
        inner.clear_connection();
        close_result
    }

    /// Unconnected explicit request: SendRRData with `[Null, UnconnectedData]`
    ///
    /// Returns the reply's unconnected data payload, i.e. the Message Router
    /// reply. Needs at least a registered session.
    pub async fn send_unconnected(&self, request: &[u8]) -> EipResult<Bytes> {
        let mut inner = self.inner.lock().await;
        if !matches!(
            inner.state,
            ConnectionState::Registered | ConnectionState::Open
        ) {
            return Err(EipError::NotConnected);
        }

        let packet = CommonPacket::unconnected(Bytes::copy_from_slice(request));
        let reply = inner.exchange_rr_data(&packet).await?;
        reply.unconnected_payload().cloned().ok_or_else(|| {
            EipError::InvalidData("SendRRData reply without unconnected data item".to_string())
        })
    }

    /// Connected explicit request: SendUnitData on the open connection
    ///
    /// The request carries the session's sequence counter as its sequence
    /// number. Returns the reply payload without its sequence number.
    pub async fn send_connected(&self, request: &[u8]) -> EipResult<Bytes> {
        let mut inner = self.inner.lock().await;
        if inner.state != ConnectionState::Open {
            return Err(EipError::NotConnected);
        }

        let connection_id = inner.ot_connection_id;
        let result = inner
            .session_mut()?
            .send_unit_data(connection_id, Bytes::copy_from_slice(request))
            .await;
        match result {
            Ok(data) => Ok(data),
            Err(e) => Err(inner.on_traffic_error(e).await),
        }
    }

    /// Send a NOP so the target does not time the session out
    pub async fn keep_alive(&self) -> EipResult<()> {
        let mut inner = self.inner.lock().await;
        if !matches!(
            inner.state,
            ConnectionState::Registered | ConnectionState::Open
        ) {
            return Err(EipError::NotConnected);
        }

        let result = inner.session_mut()?.nop().await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(inner.on_traffic_error(e).await),
        }
    }

    /// Change the size requested by the next Forward Open
    pub async fn set_packet_size(&self, size: u16) -> EipResult<()> {
        if size == 0 {
            return Err(EipError::InvalidData(
                "packet size must be greater than zero".to_string(),
            ));
        }
        self.inner.lock().await.packet_size = size;
        Ok(())
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn is_open(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    pub async fn session_handle(&self) -> u32 {
        self.status().await.session_handle
    }

    /// `(O->T, T->O)` connection IDs, both 0 unless open
    pub async fn connection_ids(&self) -> (u32, u32) {
        let status = self.status().await;
        (status.ot_connection_id, status.to_connection_id)
    }

    pub async fn sequence_counter(&self) -> u16 {
        self.status().await.sequence_counter
    }

    pub async fn packet_size(&self) -> u16 {
        self.inner.lock().await.packet_size
    }

    pub async fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock().await;
        ConnectionStatus {
            state: inner.state,
            session_handle: inner.session.as_ref().map_or(0, |s| s.session_handle()),
            ot_connection_id: inner.ot_connection_id,
            to_connection_id: inner.to_connection_id,
            connection_serial: inner.open_request.as_ref().map(|r| r.connection_serial),
            sequence_counter: inner.session.as_ref().map_or(0, |s| s.sequence_counter()),
            packet_size: inner.packet_size,
        }
    }
}

impl ConnectionInner {
    fn session_mut(&mut self) -> EipResult<&mut Session<TcpTransport>> {
        self.session.as_mut().ok_or(EipError::NotConnected)
    }

    fn clear_connection(&mut self) {
        self.ot_connection_id = 0;
        self.to_connection_id = 0;
        self.open_request = None;
    }

    /// Apply the state transition an error during traffic implies
    ///
    /// An I/O error that left the socket usable (a deadline expiring between
    /// frames) only drops the CIP connection; late replies on that socket are
    /// discarded by sender context. A socket the transport had to close is
    /// treated like a peer close.
    async fn on_traffic_error(&mut self, error: EipError) -> EipError {
        let socket_lost = match &error {
            EipError::ConnectionClosed => true,
            EipError::Io(_) => self
                .session
                .as_ref()
                .is_none_or(|s| s.transport().is_closed()),
            _ => false,
        };

        if socket_lost {
            log::warn!("Connection to target lost: {}", error);
            if let Some(mut session) = self.session.take() {
                session.abandon().await;
            }
            self.state = ConnectionState::Closed;
            self.clear_connection();
        } else if matches!(error, EipError::Io(_)) && self.state == ConnectionState::Open {
            log::warn!("I/O error on open connection, assuming it is lost: {}", error);
            self.state = ConnectionState::Registered;
            self.clear_connection();
        }
        error
    }

    async fn exchange_rr_data(&mut self, packet: &CommonPacket) -> EipResult<CommonPacket> {
        let result = self.session_mut()?.send_rr_data(packet).await;
        match result {
            Ok(reply) => Ok(reply),
            Err(e) => Err(self.on_traffic_error(e).await),
        }
    }

    async fn forward_open(&mut self, config: &ConnectionConfig) -> EipResult<()> {
        let mut request = ForwardOpenRequest::new(self.packet_size, &config.connection_path()?)?;
        request.ot_connection_id = rand::random();
        request.to_connection_id = rand::random();
        request.connection_serial = rand::random();
        request.vendor_id = config.vendor_id;
        request.originator_serial = config.originator_serial;
        request.timeout_multiplier = config.timeout_multiplier;
        request.ot_rpi = config.rpi_micros();
        request.to_rpi = config.rpi_micros();

        log::debug!(
            "Forward Open ({:?}) size={} serial=0x{:04X}",
            request.format,
            self.packet_size,
            request.connection_serial
        );
        let reply = self
            .exchange_rr_data(&CommonPacket::unconnected(request.to_bytes()))
            .await?;
        let payload = reply.unconnected_payload().ok_or_else(|| {
            EipError::InvalidData("Forward Open reply without unconnected data item".to_string())
        })?;

        let response = MessageRouterResponse::from_bytes(payload)?;
        if !response.is_success() {
            log::warn!(
                "Forward Open rejected: status 0x{:02X}, extended status 0x{:04X}",
                response.general_status,
                response.extended_status()
            );
            return Err(EipError::ForwardOpenRejected {
                status: response.general_status,
                extended_status: response.extended_status(),
            });
        }
        if response.service() != request.service() {
            return Err(EipError::InvalidData(format!(
                "Forward Open answered by service 0x{:02X}",
                response.reply_service
            )));
        }

        let open = ForwardOpenReply::from_bytes(payload)?;
        self.ot_connection_id = open.ot_connection_id;
        self.to_connection_id = open.to_connection_id;
        self.open_request = Some(request);
        self.state = ConnectionState::Open;
        log::info!(
            "Connection open: O->T 0x{:08X}, T->O 0x{:08X}, size {}",
            self.ot_connection_id,
            self.to_connection_id,
            self.packet_size
        );
        Ok(())
    }

    async fn forward_close(&mut self) -> EipResult<()> {
        let Some(open) = self.open_request.as_ref() else {
            return Ok(());
        };
        let request = ForwardCloseRequest::matching(open);
        let reply = self
            .exchange_rr_data(&CommonPacket::unconnected(request.to_bytes()))
            .await?;
        let payload = reply.unconnected_payload().ok_or_else(|| {
            EipError::InvalidData("Forward Close reply without unconnected data item".to_string())
        })?;

        let response = MessageRouterResponse::from_bytes(payload)?.into_result()?;
        if response.service() != SERVICE_FORWARD_CLOSE {
            return Err(EipError::InvalidData(format!(
                "Forward Close answered by service 0x{:02X}",
                response.reply_service
            )));
        }
        log::info!(
            "Connection closed: serial 0x{:04X}",
            request.connection_serial
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::fake_plc::{FakePlc, PlcOptions};
    use crate::ConnectionBuilder;
    use eip_cip::ForwardOpenFormat;
    use eip_session::EncapsulationCommand;
    use std::sync::Arc;
    use std::time::Duration;

    fn connection_to(plc: &FakePlc) -> Connection {
        ConnectionBuilder::new()
            .tcp(&plc.address)
            .build()
            .unwrap()
    }

    /// Connection whose reads give up long before a delayed reply arrives
    fn impatient_connection_to(plc: &FakePlc) -> Connection {
        ConnectionBuilder::new()
            .tcp(&plc.address)
            .io_timeout(Some(Duration::from_millis(100)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = connection_to(&plc);

        conn.connect().await.unwrap();
        let status = conn.status().await;
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.session_handle, FakePlc::SESSION_HANDLE);
        assert_eq!(status.ot_connection_id, FakePlc::OT_CONNECTION_ID);
        assert_eq!(status.sequence_counter, 2);

        let opens = plc.forward_opens();
        assert_eq!(opens.len(), 1);
        assert_eq!(opens[0].format, ForwardOpenFormat::Standard);
        assert_eq!(opens[0].ot_parameters.size, 508);
        assert_eq!(opens[0].vendor_id, 0x1776);
        assert_eq!(opens[0].originator_serial, 42);
        assert_eq!(opens[0].ot_rpi, 2_000_000);
        assert_eq!(status.to_connection_id, opens[0].to_connection_id);
        assert_eq!(status.connection_serial, Some(opens[0].connection_serial));

        conn.disconnect().await.unwrap();
        assert_eq!(conn.state().await, ConnectionState::Closed);
        assert_eq!(conn.connection_ids().await, (0, 0));
        assert_eq!(conn.session_handle().await, 0);

        let closes = plc.forward_closes();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].connection_serial, opens[0].connection_serial);
        assert_eq!(closes[0].vendor_id, opens[0].vendor_id);
        assert_eq!(closes[0].originator_serial, opens[0].originator_serial);

        plc.wait_for(EncapsulationCommand::UnRegisterSession).await;
        assert_eq!(
            plc.commands(),
            vec![
                EncapsulationCommand::RegisterSession,
                EncapsulationCommand::SendRRData,
                EncapsulationCommand::SendRRData,
                EncapsulationCommand::UnRegisterSession,
            ]
        );
    }

    #[tokio::test]
    async fn test_state_machine_no_ops() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = connection_to(&plc);

        // nothing to tear down yet
        conn.disconnect().await.unwrap();
        assert_eq!(conn.state().await, ConnectionState::Unregistered);
        assert!(plc.commands().is_empty());

        conn.connect().await.unwrap();
        conn.connect().await.unwrap();
        assert_eq!(plc.registrations(), 1);
        assert_eq!(plc.forward_opens().len(), 1);

        conn.disconnect().await.unwrap();
        conn.disconnect().await.unwrap();
        assert_eq!(plc.forward_closes().len(), 1);
    }

    #[tokio::test]
    async fn test_large_forward_open_for_large_packet_size() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = ConnectionBuilder::new()
            .tcp(&plc.address)
            .packet_size(4002)
            .build()
            .unwrap();

        conn.connect().await.unwrap();
        let opens = plc.forward_opens();
        assert_eq!(opens[0].format, ForwardOpenFormat::Large);
        assert_eq!(opens[0].ot_parameters.size, 4002);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_forward_open_retries_without_reregistering() {
        let plc = FakePlc::start(PlcOptions {
            max_connection_size: 508,
            ..Default::default()
        })
        .await;
        let conn = ConnectionBuilder::new()
            .tcp(&plc.address)
            .packet_size(4002)
            .build()
            .unwrap();

        match conn.connect().await {
            Err(EipError::ForwardOpenRejected {
                status,
                extended_status,
            }) => {
                assert_eq!(status, 0x01);
                assert_eq!(extended_status, 0x0109);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(conn.state().await, ConnectionState::Registered);
        assert_eq!(conn.connection_ids().await, (0, 0));

        // unconnected messaging works on the registered session
        let reply = conn.send_unconnected(&[0x01, 0x02, 0x20, 0x01, 0x24, 0x01]).await.unwrap();
        assert_eq!(&reply[..4], &[0x81, 0x00, 0x00, 0x00]);
        assert!(matches!(
            conn.send_connected(&[0x01]).await,
            Err(EipError::NotConnected)
        ));

        conn.set_packet_size(508).await.unwrap();
        conn.connect().await.unwrap();
        assert_eq!(conn.state().await, ConnectionState::Open);
        assert_eq!(plc.registrations(), 1);

        let opens = plc.forward_opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[1].format, ForwardOpenFormat::Standard);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_sequence_counter_per_request_and_reset_on_fresh_connect() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = connection_to(&plc);
        conn.connect().await.unwrap();

        let before = conn.sequence_counter().await;
        for i in 0..3u8 {
            let reply = conn.send_connected(&[0x4C, i]).await.unwrap();
            assert_eq!(&reply[..], &[0xCC, 0x00, 0x00, 0x00, i]);
            assert_eq!(conn.sequence_counter().await, before + 1 + i as u16);
        }
        let sequences = plc.unit_data_sequences();
        assert_eq!(sequences, vec![before + 1, before + 2, before + 3]);

        conn.send_unconnected(&[0x4C, 0x09]).await.unwrap();
        assert_eq!(conn.sequence_counter().await, before + 4);

        conn.disconnect().await.unwrap();
        conn.connect().await.unwrap();
        // RegisterSession and Forward Open on the fresh session
        assert_eq!(conn.sequence_counter().await, 2);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_connected_request_addresses_ot_connection() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = connection_to(&plc);
        conn.connect().await.unwrap();
        conn.send_connected(&[0x4C, 0x01]).await.unwrap();
        assert_eq!(plc.unit_data_connection_ids(), vec![FakePlc::OT_CONNECTION_ID]);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_requires_connection() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = connection_to(&plc);
        assert!(matches!(
            conn.send_unconnected(&[0x01]).await,
            Err(EipError::NotConnected)
        ));
        assert!(matches!(
            conn.send_connected(&[0x01]).await,
            Err(EipError::NotConnected)
        ));
        assert!(matches!(conn.keep_alive().await, Err(EipError::NotConnected)));
        assert!(conn.set_packet_size(0).await.is_err());
    }

    #[tokio::test]
    async fn test_keep_alive_sends_nop() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = connection_to(&plc);
        conn.connect().await.unwrap();
        conn.keep_alive().await.unwrap();
        // the NOP has no reply; the next round trip still pairs correctly
        let reply = conn.send_connected(&[0x4C, 0x02]).await.unwrap();
        assert_eq!(&reply[..], &[0xCC, 0x00, 0x00, 0x00, 0x02]);
        assert!(plc.commands().contains(&EncapsulationCommand::Nop));
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_interleave() {
        let plc = FakePlc::start(PlcOptions::default()).await;
        let conn = Arc::new(connection_to(&plc));
        conn.connect().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let conn = Arc::clone(&conn);
            tasks.push(tokio::spawn(async move {
                let request = [0x4C, i, i, i];
                let reply = if i % 2 == 0 {
                    conn.send_connected(&request).await.unwrap()
                } else {
                    conn.send_unconnected(&request).await.unwrap()
                };
                assert_eq!(&reply[4..], &[i, i, i]);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(!plc.saw_interleaving());
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_on_open_connection_drops_to_registered() {
        let plc = FakePlc::start(PlcOptions {
            reply_delay_on_service: Some(0x56),
            ..Default::default()
        })
        .await;
        let conn = impatient_connection_to(&plc);
        conn.connect().await.unwrap();

        let err = conn.send_connected(&[0x56, 0x01]).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(conn.state().await, ConnectionState::Registered);
        assert_eq!(conn.connection_ids().await, (0, 0));
        assert_eq!(conn.session_handle().await, FakePlc::SESSION_HANDLE);

        // the late reply is on the socket when Forward Open runs again
        tokio::time::sleep(Duration::from_millis(300)).await;
        conn.connect().await.unwrap();
        let status = conn.status().await;
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(plc.registrations(), 1);
        let opens = plc.forward_opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(status.to_connection_id, opens[1].to_connection_id);
        assert_eq!(status.connection_serial, Some(opens[1].connection_serial));

        let reply = conn.send_unconnected(&[0x4C, 0x07]).await.unwrap();
        assert_eq!(&reply[..], &[0xCC, 0x00, 0x00, 0x00, 0x07]);

        conn.disconnect().await.unwrap();
        assert_eq!(plc.forward_closes()[0].connection_serial, opens[1].connection_serial);
    }

    #[tokio::test]
    async fn test_timeout_during_forward_open_keeps_session() {
        let plc = FakePlc::start(PlcOptions {
            reply_delay_on_service: Some(0x54),
            ..Default::default()
        })
        .await;
        let conn = impatient_connection_to(&plc);

        let err = conn.connect().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(conn.state().await, ConnectionState::Registered);
        assert_eq!(conn.session_handle().await, FakePlc::SESSION_HANDLE);
        assert_eq!(conn.connection_ids().await, (0, 0));

        // the first attempt's reply arrives late and must not be adopted
        tokio::time::sleep(Duration::from_millis(300)).await;
        conn.connect().await.unwrap();
        let status = conn.status().await;
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(plc.registrations(), 1);
        let opens = plc.forward_opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(status.to_connection_id, opens[1].to_connection_id);
        assert_eq!(status.connection_serial, Some(opens[1].connection_serial));

        let reply = conn.send_connected(&[0x4C, 0x03]).await.unwrap();
        assert_eq!(&reply[..], &[0xCC, 0x00, 0x00, 0x00, 0x03]);

        conn.disconnect().await.unwrap();
        assert_eq!(plc.forward_closes()[0].connection_serial, opens[1].connection_serial);
    }

    #[tokio::test]
    async fn test_peer_close_moves_to_closed() {
        let plc = FakePlc::start(PlcOptions {
            hang_up_on_service: Some(0x55),
            ..Default::default()
        })
        .await;
        let conn = connection_to(&plc);
        conn.connect().await.unwrap();

        assert!(matches!(
            conn.send_connected(&[0x55, 0x00]).await,
            Err(EipError::ConnectionClosed)
        ));
        assert_eq!(conn.state().await, ConnectionState::Closed);
        assert_eq!(conn.session_handle().await, 0);

        // a closed connection reconnects from scratch
        conn.connect().await.unwrap();
        assert_eq!(plc.registrations(), 2);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_stays_unregistered() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let conn = ConnectionBuilder::new().tcp(&address).build().unwrap();
        assert!(matches!(conn.connect().await, Err(EipError::Connect(_))));
        assert_eq!(conn.state().await, ConnectionState::Unregistered);
    }
}
