//! DNS message header codec and query encoding for queryperf.
//!
//! The dispatcher only needs two things from the wire: a query it can send
//! with an arbitrary message id, and the message id of whatever comes back.
//! This crate provides exactly that and nothing more.
//!
//! ## Wire Format
//!
//! ```text
//! +---------------------+-----------------------------+
//! | u16 id              | transaction id              |
//! +---------------------+-----------------------------+
//! | u16 flags           | QR|OPCODE|AA|TC|RD|RA|Z|AD|CD|RCODE
//! +---------------------+-----------------------------+
//! | u16 qdcount         |                             |
//! | u16 ancount         | section counts              |
//! | u16 nscount         |                             |
//! | u16 arcount         |                             |
//! +---------------------+-----------------------------+
//! | question            | qname, u16 qtype, u16 qclass|
//! +---------------------+-----------------------------+
//! | OPT record (opt)    | EDNS0                       |
//! +---------------------+-----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod header;
pub mod query;
pub mod record_type;

// Re-export main types
pub use error::WireError;
pub use header::{HeaderFlags, MessageHeader, Opcode, Qid, HEADER_SIZE};
pub use query::{build_query, encode_name, set_query_id, QueryOptions, DEFAULT_EDNS_UDP_SIZE};
pub use record_type::RecordType;
