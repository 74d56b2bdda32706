//! Little-endian wire codec for fixed-layout protocol records
//!
//! Every record on the wire (encapsulation header, Common Packet Format items,
//! Forward Open requests and replies) is a sequence of explicitly sized
//! integers written in declaration order with no padding. Records implement
//! [`WireEncode`] and [`WireDecode`]; decoding goes through a [`WireReader`]
//! that reports short input as [`EipError::TruncatedFrame`].

use crate::error::{EipError, EipResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A record that can be written to the wire
pub trait WireEncode {
    /// Exact number of bytes `encode` appends
    fn encoded_len(&self) -> usize;

    /// Append the record to `buf`
    fn encode(&self, buf: &mut BytesMut);

    /// Encode into a freshly allocated buffer
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// A record that can be read back from the wire
pub trait WireDecode: Sized {
    /// Read one record, advancing the reader past it
    fn decode(reader: &mut WireReader<'_>) -> EipResult<Self>;

    /// Decode a record from the start of `data`, ignoring anything after it
    fn from_bytes(data: &[u8]) -> EipResult<Self> {
        let mut reader = WireReader::new(data);
        Self::decode(&mut reader)
    }
}

/// Bounds-checked little-endian reader over a byte slice
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Create a new reader
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    fn ensure(&self, needed: usize) -> EipResult<()> {
        if self.buf.len() < needed {
            return Err(EipError::TruncatedFrame {
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> EipResult<u8> {
        self.ensure(1)?;
        self.position += 1;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> EipResult<u16> {
        self.ensure(2)?;
        self.position += 2;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32(&mut self) -> EipResult<u32> {
        self.ensure(4)?;
        self.position += 4;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_u64(&mut self) -> EipResult<u64> {
        self.ensure(8)?;
        self.position += 8;
        Ok(self.buf.get_u64_le())
    }

    /// Read a fixed-size byte array
    pub fn read_array<const N: usize>(&mut self) -> EipResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        self.position += N;
        Ok(out)
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> EipResult<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.position += len;
        Ok(head)
    }

    /// Borrow everything that is left
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = self.buf;
        self.position += rest.len();
        self.buf = &[];
        rest
    }

    pub fn skip(&mut self, len: usize) -> EipResult<()> {
        self.read_bytes(len).map(|_| ())
    }
}

impl WireEncode for u8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self);
    }
}

impl WireEncode for u16 {
    fn encoded_len(&self) -> usize {
        2
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(*self);
    }
}

impl WireEncode for u32 {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }
}

impl WireEncode for u64 {
    fn encoded_len(&self) -> usize {
        8
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(*self);
    }
}

impl WireEncode for [u8] {
    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

impl WireEncode for Vec<u8> {
    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

impl WireEncode for Bytes {
    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

/// Total encoded length of a list of parts
pub fn encoded_len_of(parts: &[&(dyn WireEncode + Sync)]) -> usize {
    parts.iter().map(|p| p.encoded_len()).sum()
}
