//! Query record types.

use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// Record type of a query question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms, missing_docs)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    NAPTR,
    DS,
    RRSIG,
    NSEC,
    DNSKEY,
    ANY,
    /// Numeric type without a mnemonic (`TYPEnnn`)
    Other(u16),
}

impl RecordType {
    const TABLE: [(RecordType, u16, &'static str); 15] = [
        (RecordType::A, 1, "A"),
        (RecordType::NS, 2, "NS"),
        (RecordType::CNAME, 5, "CNAME"),
        (RecordType::SOA, 6, "SOA"),
        (RecordType::PTR, 12, "PTR"),
        (RecordType::MX, 15, "MX"),
        (RecordType::TXT, 16, "TXT"),
        (RecordType::AAAA, 28, "AAAA"),
        (RecordType::SRV, 33, "SRV"),
        (RecordType::NAPTR, 35, "NAPTR"),
        (RecordType::DS, 43, "DS"),
        (RecordType::RRSIG, 46, "RRSIG"),
        (RecordType::NSEC, 47, "NSEC"),
        (RecordType::DNSKEY, 48, "DNSKEY"),
        (RecordType::ANY, 255, "ANY"),
    ];

    /// Numeric value on the wire
    pub fn to_u16(self) -> u16 {
        if let RecordType::Other(v) = self {
            return v;
        }
        Self::TABLE
            .iter()
            .find(|(t, _, _)| *t == self)
            .map(|(_, v, _)| *v)
            .unwrap_or_default()
    }

    /// Map a numeric value, falling back to `Other`
    pub fn from_u16(value: u16) -> Self {
        Self::TABLE
            .iter()
            .find(|(_, v, _)| *v == value)
            .map(|(t, _, _)| *t)
            .unwrap_or(RecordType::Other(value))
    }
}

impl FromStr for RecordType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some((t, _, _)) = Self::TABLE.iter().find(|(_, _, name)| *name == upper) {
            return Ok(*t);
        }
        // RFC 3597 generic syntax
        upper
            .strip_prefix("TYPE")
            .and_then(|n| n.parse::<u16>().ok())
            .map(Self::from_u16)
            .ok_or_else(|| WireError::UnknownType(s.to_string()))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::TABLE.iter().find(|(t, _, _)| t == self) {
            Some((_, _, name)) => f.write_str(name),
            None => write!(f, "TYPE{}", self.to_u16()),
        }
    }
}
