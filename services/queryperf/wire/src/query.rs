//! Query encoding.
//!
//! Queries are encoded once with id 0 and then stamped with a fresh id for
//! every send, so the per-exchange cost is a copy and a two-byte write.

use bytes::{BufMut, Bytes, BytesMut};

use crate::header::{HeaderFlags, MessageHeader, Qid, HEADER_SIZE};
use crate::{RecordType, WireError};

/// Default UDP payload size advertised in the OPT record
pub const DEFAULT_EDNS_UDP_SIZE: u16 = 4096;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const CLASS_IN: u16 = 1;
const TYPE_OPT: u16 = 41;
const EDNS_DO_BIT: u32 = 0x0000_8000;

/// Per-query encoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Set the RD bit
    pub recursion_desired: bool,
    /// Append an EDNS0 OPT record
    pub edns: bool,
    /// Set the DO bit (implies `edns`)
    pub dnssec_ok: bool,
    /// UDP payload size advertised in the OPT record
    pub edns_udp_size: u16,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            recursion_desired: true,
            edns: false,
            dnssec_ok: false,
            edns_udp_size: DEFAULT_EDNS_UDP_SIZE,
        }
    }
}

/// Encode a presentation-format name into uncompressed wire labels
///
/// On error nothing is appended to `buf`.
pub fn encode_name(name: &str, buf: &mut BytesMut) -> Result<(), WireError> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    let labels: Vec<&str> = if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('.').collect()
    };

    let mut encoded = 1;
    for label in &labels {
        if label.is_empty() {
            return Err(WireError::EmptyLabel(name.to_string()));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(WireError::LabelTooLong(label.len()));
        }
        encoded += label.len() + 1;
    }
    if encoded > MAX_NAME_LEN {
        return Err(WireError::NameTooLong(encoded));
    }

    for label in labels {
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
    buf.put_u8(0);
    Ok(())
}

/// Build an IN-class query for `name`/`rtype` with message id 0
pub fn build_query(name: &str, rtype: RecordType, options: &QueryOptions) -> Result<Bytes, WireError> {
    let with_opt = options.edns || options.dnssec_ok;

    let mut header = MessageHeader::query(0);
    if options.recursion_desired {
        header.flags |= HeaderFlags::RD;
    }
    if with_opt {
        header.arcount = 1;
    }

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + name.len() + 2 + 4 + 11);
    header.encode(&mut buf);
    encode_name(name, &mut buf)?;
    buf.put_u16(rtype.to_u16());
    buf.put_u16(CLASS_IN);

    if with_opt {
        // root owner, type OPT, class = payload size, ttl = ext-rcode|version|flags
        buf.put_u8(0);
        buf.put_u16(TYPE_OPT);
        buf.put_u16(options.edns_udp_size);
        buf.put_u32(if options.dnssec_ok { EDNS_DO_BIT } else { 0 });
        buf.put_u16(0);
    }

    Ok(buf.freeze())
}

/// Overwrite the message id of an encoded message
pub fn set_query_id(buf: &mut [u8], qid: Qid) {
    if buf.len() >= 2 {
        buf[..2].copy_from_slice(&qid.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_name() {
        let mut buf = BytesMut::new();
        encode_name("www.example.com.", &mut buf).unwrap();
        assert_eq!(&buf[..], b"\x03www\x07example\x03com\x00");

        let mut root = BytesMut::new();
        encode_name(".", &mut root).unwrap();
        assert_eq!(&root[..], b"\x00");
    }

    #[test]
    fn test_encode_name_errors() {
        let mut buf = BytesMut::new();
        assert!(matches!(encode_name("a..b", &mut buf), Err(WireError::EmptyLabel(_))));

        let long_label = "x".repeat(64);
        assert_eq!(encode_name(&long_label, &mut buf), Err(WireError::LabelTooLong(64)));

        let long_name = vec!["abcdefghi"; 30].join(".");
        assert!(matches!(encode_name(&long_name, &mut buf), Err(WireError::NameTooLong(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_build_query_layout() {
        let query = build_query("example.com", RecordType::AAAA, &QueryOptions::default()).unwrap();
        let header = MessageHeader::decode(&query).unwrap();

        assert_eq!(header.id, 0);
        assert!(!header.is_response());
        assert!(header.flags.contains(HeaderFlags::RD));
        assert_eq!(header.qdcount, 1);
        assert_eq!(header.arcount, 0);
        // header + 13 bytes of name + type + class
        assert_eq!(query.len(), HEADER_SIZE + 13 + 4);
        assert_eq!(&query[query.len() - 4..], &[0, 28, 0, 1]);
    }

    #[test]
    fn test_build_query_with_dnssec() {
        let options = QueryOptions {
            recursion_desired: false,
            dnssec_ok: true,
            ..QueryOptions::default()
        };
        let query = build_query("example.com", RecordType::DNSKEY, &options).unwrap();
        let header = MessageHeader::decode(&query).unwrap();

        assert!(!header.flags.contains(HeaderFlags::RD));
        assert_eq!(header.arcount, 1);
        let opt = &query[query.len() - 11..];
        assert_eq!(opt, &[0, 0, 41, 0x10, 0x00, 0, 0, 0x80, 0, 0, 0]);
    }

    #[test]
    fn test_set_query_id() {
        let query = build_query("example.com", RecordType::A, &QueryOptions::default()).unwrap();
        let mut buf = BytesMut::from(&query[..]);
        set_query_id(&mut buf, 0xABCD);

        assert_eq!(MessageHeader::decode(&buf).unwrap().id, 0xABCD);
        assert_eq!(&buf[2..], &query[2..]);
    }
}
