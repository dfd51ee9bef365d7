//! DNS wire format constants and query validation (RFC 1035).
//!
//! Parsing never trusts the datagram: every offset is bounds-checked and
//! anything this responder does not answer is rejected with a [`RejectReason`].

use crate::error::RejectReason;
use std::fmt;

// DNS wire format constants
pub const HEADER_SIZE: usize = 12;
pub const MIN_QUERY_LEN: usize = 18;
pub const MAX_QUERY_LEN: usize = 269;

pub const TYPE_A: u16 = 1;
pub const TYPE_AAAA: u16 = 28;
pub const CLASS_IN: u16 = 1;

const FLAG_QR: u8 = 0x80; // Query/Response bit in flags byte 2
const OPCODE_MASK: u8 = 0x78; // Opcode bits in flags byte 2
const FLAGS_STRICT_QUERY: [u8; 2] = [0x01, 0x00]; // QR=0, OPCODE=0, AA=0, TC=0, RD=1
const LABEL_POINTER_BITS: u8 = 0xC0;

/// Record types this responder serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    AAAA,
}

impl RecordType {
    /// Map a raw QTYPE, `None` for anything other than A or AAAA
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            TYPE_A => Some(RecordType::A),
            TYPE_AAAA => Some(RecordType::AAAA),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => TYPE_A,
            RecordType::AAAA => TYPE_AAAA,
        }
    }

    /// The other address family
    pub fn other(self) -> Self {
        match self {
            RecordType::A => RecordType::AAAA,
            RecordType::AAAA => RecordType::A,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::AAAA => write!(f, "AAAA"),
        }
    }
}

/// How strictly the header flags of a query are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// QR=0 and OPCODE=0; other flag bits are ignored
    #[default]
    Lenient,
    /// Flags must be exactly 0x0100 (standard query, recursion desired)
    Strict,
}

/// Validated query (borrows the question name from the datagram)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsQuery<'a> {
    id: u16,
    qname: &'a [u8],
    qtype: RecordType,
}

impl<'a> DnsQuery<'a> {
    /// Parse with the default (lenient) header policy
    pub fn parse(buf: &'a [u8]) -> Result<DnsQuery<'a>, RejectReason> {
        Self::parse_with(buf, HeaderPolicy::Lenient)
    }

    /// Parse and validate a query datagram.
    ///
    /// The question name is located by walking its labels forward from the
    /// end of the header. Compression pointers are not accepted in a question.
    pub fn parse_with(buf: &'a [u8], policy: HeaderPolicy) -> Result<DnsQuery<'a>, RejectReason> {
        if !(MIN_QUERY_LEN..=MAX_QUERY_LEN).contains(&buf.len()) {
            return Err(RejectReason::LengthOutOfRange);
        }

        // Exactly one question
        if buf[4..6] != [0x00, 0x01] {
            return Err(RejectReason::UnsupportedOpcode);
        }

        let standard_query = match policy {
            HeaderPolicy::Lenient => buf[2] & (FLAG_QR | OPCODE_MASK) == 0,
            HeaderPolicy::Strict => buf[2..4] == FLAGS_STRICT_QUERY,
        };
        if !standard_query {
            return Err(RejectReason::UnsupportedOpcode);
        }

        let terminator = find_name_end(buf, HEADER_SIZE)?;

        let question = buf
            .get(terminator + 1..terminator + 5)
            .ok_or(RejectReason::UnsupportedQuestion)?;
        let qtype_raw = u16::from_be_bytes([question[0], question[1]]);
        let qclass = u16::from_be_bytes([question[2], question[3]]);

        if qclass != CLASS_IN {
            return Err(RejectReason::UnsupportedQuestion);
        }
        let qtype = RecordType::from_u16(qtype_raw).ok_or(RejectReason::UnsupportedQuestion)?;

        Ok(DnsQuery {
            id: u16::from_be_bytes([buf[0], buf[1]]),
            qname: &buf[HEADER_SIZE..terminator],
            qtype,
        })
    }

    /// Transaction ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Question name as length-prefixed labels, root byte excluded
    pub fn name_bytes(&self) -> &'a [u8] {
        self.qname
    }

    pub fn query_type(&self) -> RecordType {
        self.qtype
    }
}

/// Offset of the root byte ending the name that starts at `start`
fn find_name_end(buf: &[u8], start: usize) -> Result<usize, RejectReason> {
    let mut pos = start;

    loop {
        let len = *buf.get(pos).ok_or(RejectReason::MalformedName)?;

        if len == 0 {
            return Ok(pos);
        }

        // Pointers (0xC0) and the reserved 0x40/0x80 label types
        if len & LABEL_POINTER_BITS != 0 {
            return Err(RejectReason::MalformedName);
        }

        pos += 1 + len as usize;
    }
}

// ==================== Helper for building DNS packets (tests) ====================
