//! Scripted EtherNet/IP target for client tests
//!
//! Accepts any number of connections on 127.0.0.1 and answers just enough of
//! the protocol to drive the client: RegisterSession, Forward Open/Close,
//! explicit requests (echoed back inside a success reply) and SendUnitData.

use bytes::{BufMut, Bytes, BytesMut};
use eip_cip::{
    CommonPacket, ForwardCloseRequest, ForwardOpenReply, ForwardOpenRequest, RrDataPrefix,
};
use eip_core::{WireDecode, WireEncode};
use eip_session::{EncapsulationCommand, EncapsulationHeader, ENCAPSULATION_HEADER_LENGTH};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub(crate) struct PlcOptions {
    /// Forward Opens asking for more are rejected with 0x01/0x0109
    pub max_connection_size: u16,
    /// Drop the socket when a connected request uses this service
    pub hang_up_on_service: Option<u8>,
    /// Answer the first request using this service `reply_delay` late
    pub reply_delay_on_service: Option<u8>,
    pub reply_delay: Duration,
}

impl Default for PlcOptions {
    fn default() -> Self {
        Self {
            max_connection_size: 4002,
            hang_up_on_service: None,
            reply_delay_on_service: None,
            reply_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Default)]
struct Record {
    commands: Vec<EncapsulationCommand>,
    forward_opens: Vec<ForwardOpenRequest>,
    forward_closes: Vec<ForwardCloseRequest>,
    unit_data: Vec<(u32, u16)>,
    interleaved: bool,
    delayed: bool,
}

pub(crate) struct FakePlc {
    pub address: String,
    record: Arc<Mutex<Record>>,
}

impl FakePlc {
    pub const SESSION_HANDLE: u32 = 0x1234_5678;
    pub const OT_CONNECTION_ID: u32 = 0xA000_0001;

    pub async fn start(options: PlcOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let record = Arc::new(Mutex::new(Record::default()));

        let shared = Arc::clone(&record);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&shared), options.clone()));
            }
        });

        Self { address, record }
    }

    pub fn commands(&self) -> Vec<EncapsulationCommand> {
        self.record.lock().unwrap().commands.clone()
    }

    pub fn registrations(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| **c == EncapsulationCommand::RegisterSession)
            .count()
    }

    pub fn forward_opens(&self) -> Vec<ForwardOpenRequest> {
        self.record.lock().unwrap().forward_opens.clone()
    }

    pub fn forward_closes(&self) -> Vec<ForwardCloseRequest> {
        self.record.lock().unwrap().forward_closes.clone()
    }

    pub fn unit_data_sequences(&self) -> Vec<u16> {
        let record = self.record.lock().unwrap();
        record.unit_data.iter().map(|(_, seq)| *seq).collect()
    }

    pub fn unit_data_connection_ids(&self) -> Vec<u32> {
        let record = self.record.lock().unwrap();
        record.unit_data.iter().map(|(id, _)| *id).collect()
    }

    pub fn saw_interleaving(&self) -> bool {
        self.record.lock().unwrap().interleaved
    }

    /// Wait until `command` has been received; commands without a reply
    /// arrive after the client call returns
    pub async fn wait_for(&self, command: EncapsulationCommand) {
        for _ in 0..200 {
            if self.commands().contains(&command) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{:?} never arrived", command);
    }
}

async fn serve(mut stream: TcpStream, record: Arc<Mutex<Record>>, options: PlcOptions) {
    loop {
        let mut header_bytes = [0u8; ENCAPSULATION_HEADER_LENGTH];
        if stream.read_exact(&mut header_bytes).await.is_err() {
            return;
        }
        let header = EncapsulationHeader::from_bytes(&header_bytes).unwrap();
        let mut payload = vec![0u8; header.payload_length()];
        if stream.read_exact(&mut payload).await.is_err() {
            return;
        }
        record.lock().unwrap().commands.push(header.command);

        let (reply, service) = match header.command {
            EncapsulationCommand::RegisterSession => (
                reply_frame(&header, FakePlc::SESSION_HANDLE, Bytes::from(payload)),
                None,
            ),
            EncapsulationCommand::UnRegisterSession => return,
            EncapsulationCommand::Nop => continue,
            EncapsulationCommand::SendRRData => {
                let packet = CommonPacket::from_bytes(&payload[6..]).unwrap();
                let request = packet.unconnected_payload().unwrap().clone();
                let answer = explicit_reply(&request, &record, &options);
                (
                    rr_frame(&header, &CommonPacket::unconnected(answer)),
                    request.first().copied(),
                )
            }
            EncapsulationCommand::SendUnitData => {
                let packet = CommonPacket::from_bytes(&payload[6..]).unwrap();
                let connection_id = packet.connection_id().unwrap();
                let (sequence, request) = packet.connected_payload().unwrap();
                record
                    .lock()
                    .unwrap()
                    .unit_data
                    .push((connection_id, sequence));
                if options.hang_up_on_service.is_some()
                    && options.hang_up_on_service == request.first().copied()
                {
                    return;
                }
                let answer = echo_reply(request);
                (
                    rr_frame(&header, &CommonPacket::connected(0xB000_0001, sequence, answer)),
                    request.first().copied(),
                )
            }
            other => panic!("unexpected command {:?}", other),
        };

        let delay = service.is_some() && service == options.reply_delay_on_service && {
            let mut record = record.lock().unwrap();
            !std::mem::replace(&mut record.delayed, true)
        };
        if delay {
            tokio::time::sleep(options.reply_delay).await;
        } else {
            // a well-behaved client sends nothing until it has this reply
            let mut pending = [0u8; 1];
            if let Ok(Ok(n)) =
                tokio::time::timeout(Duration::from_millis(5), stream.peek(&mut pending)).await
            {
                if n > 0 {
                    record.lock().unwrap().interleaved = true;
                }
            }
        }

        if stream.write_all(&reply).await.is_err() {
            return;
        }
    }
}

fn reply_frame(request: &EncapsulationHeader, session_handle: u32, payload: Bytes) -> Bytes {
    let mut header = *request;
    header.session_handle = session_handle;
    header.length = payload.len() as u16;
    let mut buf = BytesMut::new();
    header.encode(&mut buf);
    buf.put_slice(&payload);
    buf.freeze()
}

fn rr_frame(request: &EncapsulationHeader, packet: &CommonPacket) -> Bytes {
    let mut payload = BytesMut::new();
    RrDataPrefix::default().encode(&mut payload);
    packet.encode(&mut payload);
    reply_frame(request, request.session_handle, payload.freeze())
}

/// Success reply carrying the request minus its service byte
fn echo_reply(request: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(request[0] | 0x80);
    buf.put_slice(&[0, 0, 0]);
    buf.put_slice(&request[1..]);
    buf.freeze()
}

fn explicit_reply(request: &[u8], record: &Mutex<Record>, options: &PlcOptions) -> Bytes {
    match request[0] {
        0x54 | 0x5B => {
            let open = ForwardOpenRequest::from_bytes(request).unwrap();
            record.lock().unwrap().forward_opens.push(open.clone());
            if open.ot_parameters.size > options.max_connection_size {
                return Bytes::from(vec![request[0] | 0x80, 0x00, 0x01, 0x01, 0x09, 0x01]);
            }
            let reply = ForwardOpenReply {
                service: request[0] | 0x80,
                reserved: [0, 0, 0],
                ot_connection_id: FakePlc::OT_CONNECTION_ID,
                to_connection_id: open.to_connection_id,
                reserved_tail: open.connection_serial,
            };
            reply.to_bytes()
        }
        0x4E => {
            let close = ForwardCloseRequest::from_bytes(request).unwrap();
            record.lock().unwrap().forward_closes.push(close);
            Bytes::from_static(&[0xCE, 0x00, 0x00, 0x00])
        }
        _ => echo_reply(request),
    }
}
