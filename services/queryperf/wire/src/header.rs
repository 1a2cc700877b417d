//! DNS message header processing.
//!
//! This module defines the fixed 12-byte header that precedes every DNS
//! message. Responses are only ever decoded this far: the id is all the
//! dispatcher needs to match a response to its query.

use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};

use crate::WireError;

/// Header size in bytes
pub const HEADER_SIZE: usize = 12;

/// DNS transaction (message) id
pub type Qid = u16;

const OPCODE_SHIFT: u16 = 11;
const OPCODE_MASK: u16 = 0x7800;
const RCODE_MASK: u16 = 0x000F;

bitflags! {
    /// Single-bit header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u16 {
        /// Message is a response
        const QR = 1 << 15;
        /// Authoritative answer
        const AA = 1 << 10;
        /// Truncated
        const TC = 1 << 9;
        /// Recursion desired
        const RD = 1 << 8;
        /// Recursion available
        const RA = 1 << 7;
        /// Authentic data
        const AD = 1 << 5;
        /// Checking disabled
        const CD = 1 << 4;
    }
}

/// Header opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Standard query
    Query,
    /// Server status request
    Status,
    /// Zone change notification
    Notify,
    /// Dynamic update
    Update,
    /// Anything else, kept verbatim
    Other(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0 => Opcode::Query,
            2 => Opcode::Status,
            4 => Opcode::Notify,
            5 => Opcode::Update,
            v => Opcode::Other(v),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Other(v) => v & 0x0F,
        }
    }
}

/// Decoded DNS message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Transaction id
    pub id: Qid,
    /// Single-bit flags
    pub flags: HeaderFlags,
    /// Opcode
    pub opcode: Opcode,
    /// Response code (low 4 bits)
    pub rcode: u8,
    /// Question count
    pub qdcount: u16,
    /// Answer count
    pub ancount: u16,
    /// Authority count
    pub nscount: u16,
    /// Additional count
    pub arcount: u16,
}

impl MessageHeader {
    /// Create a query header with a single question
    pub fn query(id: Qid) -> Self {
        Self {
            id,
            flags: HeaderFlags::empty(),
            opcode: Opcode::Query,
            rcode: 0,
            qdcount: 1,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }

    /// Whether the QR bit is set
    pub fn is_response(&self) -> bool {
        self.flags.contains(HeaderFlags::QR)
    }

    fn flags_word(&self) -> u16 {
        let opcode = (u8::from(self.opcode) as u16) << OPCODE_SHIFT;
        self.flags.bits() | (opcode & OPCODE_MASK) | (self.rcode as u16 & RCODE_MASK)
    }

    /// Encode the header to bytes (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.id);
        buf.put_u16(self.flags_word());
        buf.put_u16(self.qdcount);
        buf.put_u16(self.ancount);
        buf.put_u16(self.nscount);
        buf.put_u16(self.arcount);
    }

    /// Decode the header from the start of a message
    ///
    /// Only the length is validated; bits the header does not define
    /// (the Z bit) are ignored.
    pub fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::Truncated {
                needed: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let id = buf.get_u16();
        let word = buf.get_u16();
        let qdcount = buf.get_u16();
        let ancount = buf.get_u16();
        let nscount = buf.get_u16();
        let arcount = buf.get_u16();

        Ok(Self {
            id,
            flags: HeaderFlags::from_bits_truncate(word),
            opcode: Opcode::from(((word & OPCODE_MASK) >> OPCODE_SHIFT) as u8),
            rcode: (word & RCODE_MASK) as u8,
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode() {
        let mut header = MessageHeader::query(0xBEEF);
        header.flags = HeaderFlags::QR | HeaderFlags::RD | HeaderFlags::RA;
        header.rcode = 3;
        header.ancount = 2;
        header.arcount = 1;

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = MessageHeader::decode(&buf).unwrap();
        assert_eq!(header, decoded);
        assert!(decoded.is_response());
    }

    #[test]
    fn test_decode_known_bytes() {
        // id=0x1234, QR|RD|RA, NXDOMAIN, one question
        let raw = [0x12, 0x34, 0x81, 0x83, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0xAA];
        let header = MessageHeader::decode(&raw).unwrap();

        assert_eq!(header.id, 0x1234);
        assert!(header.flags.contains(HeaderFlags::QR | HeaderFlags::RD | HeaderFlags::RA));
        assert_eq!(header.opcode, Opcode::Query);
        assert_eq!(header.rcode, 3);
        assert_eq!(header.qdcount, 1);
    }

    #[test]
    fn test_truncated_header() {
        let err = MessageHeader::decode(&[0x00, 0x01, 0x80]).unwrap_err();
        assert_eq!(err, WireError::Truncated { needed: 12, actual: 3 });

        assert!(MessageHeader::decode(&[]).is_err());
    }

    #[test]
    fn test_opcode_roundtrip() {
        let mut header = MessageHeader::query(1);
        header.opcode = Opcode::Notify;

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(MessageHeader::decode(&buf).unwrap().opcode, Opcode::Notify);
        assert_eq!(Opcode::from(9), Opcode::Other(9));
    }
}
