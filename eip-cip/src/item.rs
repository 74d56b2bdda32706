//! Common Packet Format (CPF) item list codec
//!
//! SendRRData and SendUnitData payloads carry an interface handle and a
//! timeout ([`RrDataPrefix`]) followed by a counted list of typed,
//! length-prefixed items ([`CommonPacket`]):
//!
//! ```text
//! count:u16 | type:u16 len:u16 payload[len] | type:u16 len:u16 payload[len] | ...
//! ```
//!
//! Item payloads are treated as opaque bytes; records such as the Forward
//! Open reply are decoded afterwards from a specific item's payload.

use bytes::{BufMut, Bytes, BytesMut};
use eip_core::{EipError, EipResult, WireDecode, WireEncode, WireReader};

/// Null address item, placeholder address of an unconnected exchange
pub const ITEM_NULL: u16 = 0x0000;
/// Connected address item, carries a connection ID
pub const ITEM_CONNECTED_ADDRESS: u16 = 0x00A1;
/// Connected data item, sequence number followed by a service payload
pub const ITEM_CONNECTED_DATA: u16 = 0x00B1;
/// Unconnected data item, an explicit CIP service request or reply
pub const ITEM_UNCONNECTED_DATA: u16 = 0x00B2;

/// One CPF item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipItem {
    Null,
    ConnectedAddress(u32),
    ConnectedData { sequence: u16, data: Bytes },
    UnconnectedData(Bytes),
    /// Any item type this engine does not interpret
    Other { type_id: u16, data: Bytes },
}

impl CipItem {
    pub fn unconnected_data(data: impl Into<Bytes>) -> Self {
        CipItem::UnconnectedData(data.into())
    }

    pub fn connected_data(sequence: u16, data: impl Into<Bytes>) -> Self {
        CipItem::ConnectedData {
            sequence,
            data: data.into(),
        }
    }

    pub fn type_id(&self) -> u16 {
        match self {
            CipItem::Null => ITEM_NULL,
            CipItem::ConnectedAddress(_) => ITEM_CONNECTED_ADDRESS,
            CipItem::ConnectedData { .. } => ITEM_CONNECTED_DATA,
            CipItem::UnconnectedData(_) => ITEM_UNCONNECTED_DATA,
            CipItem::Other { type_id, .. } => *type_id,
        }
    }

    /// Length of the item payload, excluding its 4-byte type/length prefix
    pub fn payload_len(&self) -> usize {
        match self {
            CipItem::Null => 0,
            CipItem::ConnectedAddress(_) => 4,
            CipItem::ConnectedData { data, .. } => 2 + data.len(),
            CipItem::UnconnectedData(data) => data.len(),
            CipItem::Other { data, .. } => data.len(),
        }
    }
}

impl WireEncode for CipItem {
    fn encoded_len(&self) -> usize {
        4 + self.payload_len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.type_id());
        buf.put_u16_le(self.payload_len() as u16);
        match self {
            CipItem::Null => {}
            CipItem::ConnectedAddress(id) => buf.put_u32_le(*id),
            CipItem::ConnectedData { sequence, data } => {
                buf.put_u16_le(*sequence);
                buf.put_slice(data);
            }
            CipItem::UnconnectedData(data) | CipItem::Other { data, .. } => buf.put_slice(data),
        }
    }
}

impl WireDecode for CipItem {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        let type_id = reader.read_u16()?;
        let declared = reader.read_u16()? as usize;
        if declared > reader.remaining() {
            return Err(EipError::ItemLengthMismatch {
                declared,
                remaining: reader.remaining(),
            });
        }
        let payload = reader.read_bytes(declared)?;

        match type_id {
            ITEM_NULL if payload.is_empty() => Ok(CipItem::Null),
            ITEM_NULL => Err(EipError::InvalidData(format!(
                "null address item with {} payload bytes",
                payload.len()
            ))),
            ITEM_CONNECTED_ADDRESS => {
                if payload.len() != 4 {
                    return Err(EipError::InvalidData(format!(
                        "connected address item of {} bytes, expected 4",
                        payload.len()
                    )));
                }
                Ok(CipItem::ConnectedAddress(WireReader::new(payload).read_u32()?))
            }
            ITEM_CONNECTED_DATA => {
                let mut inner = WireReader::new(payload);
                let sequence = inner.read_u16()?;
                Ok(CipItem::ConnectedData {
                    sequence,
                    data: Bytes::copy_from_slice(inner.read_rest()),
                })
            }
            ITEM_UNCONNECTED_DATA => Ok(CipItem::UnconnectedData(Bytes::copy_from_slice(payload))),
            _ => Ok(CipItem::Other {
                type_id,
                data: Bytes::copy_from_slice(payload),
            }),
        }
    }
}

/// Counted item list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonPacket {
    pub items: Vec<CipItem>,
}

impl CommonPacket {
    pub fn new(items: Vec<CipItem>) -> Self {
        Self { items }
    }

    /// `[Null, UnconnectedData(request)]`, the unconnected explicit message layout
    pub fn unconnected(request: impl Into<Bytes>) -> Self {
        Self::new(vec![CipItem::Null, CipItem::unconnected_data(request)])
    }

    /// `[ConnectedAddress(id), ConnectedData(sequence, request)]`
    pub fn connected(connection_id: u32, sequence: u16, request: impl Into<Bytes>) -> Self {
        Self::new(vec![
            CipItem::ConnectedAddress(connection_id),
            CipItem::connected_data(sequence, request),
        ])
    }

    pub fn item(&self, index: usize) -> Option<&CipItem> {
        self.items.get(index)
    }

    /// Payload of the first unconnected data item
    pub fn unconnected_payload(&self) -> Option<&Bytes> {
        self.items.iter().find_map(|item| match item {
            CipItem::UnconnectedData(data) => Some(data),
            _ => None,
        })
    }

    /// Sequence and payload of the first connected data item
    pub fn connected_payload(&self) -> Option<(u16, &Bytes)> {
        self.items.iter().find_map(|item| match item {
            CipItem::ConnectedData { sequence, data } => Some((*sequence, data)),
            _ => None,
        })
    }

    /// Connection ID of the first connected address item
    pub fn connection_id(&self) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            CipItem::ConnectedAddress(id) => Some(*id),
            _ => None,
        })
    }
}

impl WireEncode for CommonPacket {
    fn encoded_len(&self) -> usize {
        2 + self.items.iter().map(|i| i.encoded_len()).sum::<usize>()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.items.len() as u16);
        for item in &self.items {
            item.encode(buf);
        }
    }
}

impl WireDecode for CommonPacket {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        let count = reader.read_u16()? as usize;
        // each item needs at least its 4-byte prefix
        let mut items = Vec::with_capacity(count.min(reader.remaining() / 4));
        for _ in 0..count {
            items.push(CipItem::decode(reader)?);
        }
        Ok(Self { items })
    }
}

/// Interface handle and timeout preceding the item list of SendRRData and
/// SendUnitData
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RrDataPrefix {
    /// Always 0 for CIP
    pub interface_handle: u32,
    /// Seconds; ignored by the target for SendUnitData
    pub timeout: u16,
}

impl WireEncode for RrDataPrefix {
    fn encoded_len(&self) -> usize {
        6
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.interface_handle);
        buf.put_u16_le(self.timeout);
    }
}

impl WireDecode for RrDataPrefix {
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self> {
        Ok(Self {
            interface_handle: reader.read_u32()?,
            timeout: reader.read_u16()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_layout() {
        let packet = CommonPacket::unconnected(vec![0x4C, 0x00]);
        let bytes = packet.to_bytes();
        assert_eq!(
            &bytes[..],
            &[0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB2, 0x00, 0x02, 0x00, 0x4C, 0x00]
        );
        assert_eq!(bytes.len(), packet.encoded_len());
    }

    #[test]
    fn test_connected_round_trip() {
        let packet = CommonPacket::connected(0xDEADBEEF, 7, vec![1, 2, 3]);
        let bytes = packet.to_bytes();
        assert_eq!(&bytes[..8], &[0x02, 0x00, 0xA1, 0x00, 0x04, 0x00, 0xEF, 0xBE]);
        let decoded = CommonPacket::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.connection_id(), Some(0xDEADBEEF));
        let (sequence, data) = decoded.connected_payload().unwrap();
        assert_eq!(sequence, 7);
        assert_eq!(&data[..], &[1, 2, 3]);
    }

    #[test]
    fn test_unknown_item_is_preserved() {
        let packet = CommonPacket::new(vec![
            CipItem::Other {
                type_id: 0x8000,
                data: Bytes::from_static(&[0xAA; 16]),
            },
            CipItem::unconnected_data(vec![0xCC]),
        ]);
        let decoded = CommonPacket::from_bytes(&packet.to_bytes()).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(&decoded.unconnected_payload().unwrap()[..], &[0xCC]);
    }

    #[test]
    fn test_declared_length_beyond_buffer() {
        // one item claiming 10 payload bytes with only 3 present
        let data = [0x01, 0x00, 0xB2, 0x00, 0x0A, 0x00, 1, 2, 3];
        match CommonPacket::from_bytes(&data) {
            Err(EipError::ItemLengthMismatch { declared, remaining }) => {
                assert_eq!(declared, 10);
                assert_eq!(remaining, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_items_is_truncated() {
        // count says two items but only one is present
        let data = [0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            CommonPacket::from_bytes(&data),
            Err(EipError::TruncatedFrame { .. })
        ));
    }

    #[test]
    fn test_malformed_connected_items() {
        let data = [0x01, 0x00, 0xA1, 0x00, 0x02, 0x00, 1, 2];
        assert!(matches!(
            CommonPacket::from_bytes(&data),
            Err(EipError::InvalidData(_))
        ));
        let data = [0x01, 0x00, 0xB1, 0x00, 0x01, 0x00, 1];
        assert!(matches!(
            CommonPacket::from_bytes(&data),
            Err(EipError::TruncatedFrame { .. })
        ));
    }

    #[test]
    fn test_rr_data_prefix() {
        let prefix = RrDataPrefix {
            interface_handle: 0,
            timeout: 5,
        };
        let bytes = prefix.to_bytes();
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 5, 0]);
        assert_eq!(RrDataPrefix::from_bytes(&bytes).unwrap(), prefix);
    }
}
