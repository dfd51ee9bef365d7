//! Startup-time construction of complete answer messages.

use crate::dns::name::WireName;
use crate::dns::records::RecordEntry;
use crate::dns::wire::{RecordType, CLASS_IN, HEADER_SIZE};

/// Flags: QR=1, RD=1, RA=1, RCODE=0
const FLAGS_RESPONSE: [u8; 2] = [0x81, 0x80];
/// Compression pointer to the question name at offset 12
const NAME_POINTER: [u8; 2] = [0xC0, HEADER_SIZE as u8];
/// TTL of every answer, in seconds
pub const ANSWER_TTL: u32 = 300;

/// Ready-to-send answer with a zeroed transaction ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecomputedResponse {
    bytes: Box<[u8]>,
    qtype_offset: usize,
}

impl PrecomputedResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Offset of the question's QTYPE field
    pub fn qtype_offset(&self) -> usize {
        self.qtype_offset
    }

    /// Copy the template, stamping the transaction ID and echoing `qtype`
    /// in the question. The shared template is never written.
    pub fn render(&self, id: u16, qtype: RecordType) -> Vec<u8> {
        let mut out = self.bytes.to_vec();
        out[0..2].copy_from_slice(&id.to_be_bytes());
        out[self.qtype_offset..self.qtype_offset + 2].copy_from_slice(&qtype.to_u16().to_be_bytes());
        out
    }
}

/// Build the response for `qtype`, or `None` if the entry has no such address.
///
/// A dual-stack entry appends the other family as a second answer so either
/// query returns both addresses.
pub fn build_response(entry: &RecordEntry, qtype: RecordType) -> Option<PrecomputedResponse> {
    let primary = entry.rdata(qtype)?;
    let secondary = entry.rdata(qtype.other());
    let ancount: u16 = if secondary.is_some() { 2 } else { 1 };

    let mut buf = Vec::with_capacity(HEADER_SIZE + entry.wire_name().len() + 4 + 2 * 28);

    write_header(&mut buf, ancount);
    let qtype_offset = write_question(&mut buf, entry.wire_name(), qtype);
    write_answer(&mut buf, qtype, primary);
    if let Some(rdata) = secondary {
        write_answer(&mut buf, qtype.other(), rdata);
    }

    Some(PrecomputedResponse {
        bytes: buf.into_boxed_slice(),
        qtype_offset,
    })
}

fn write_header(buf: &mut Vec<u8>, ancount: u16) {
    buf.extend_from_slice(&[0x00, 0x00]); // ID, patched per query
    buf.extend_from_slice(&FLAGS_RESPONSE);
    buf.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    buf.extend_from_slice(&ancount.to_be_bytes()); // ANCOUNT
    buf.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
    buf.extend_from_slice(&[0x00, 0x00]); // ARCOUNT
}

/// Returns the offset of QTYPE
fn write_question(buf: &mut Vec<u8>, name: &WireName, qtype: RecordType) -> usize {
    buf.extend_from_slice(name.as_bytes());
    let qtype_offset = buf.len();
    buf.extend_from_slice(&qtype.to_u16().to_be_bytes());
    buf.extend_from_slice(&CLASS_IN.to_be_bytes());
    qtype_offset
}

fn write_answer(buf: &mut Vec<u8>, rtype: RecordType, rdata: &[u8]) {
    buf.extend_from_slice(&NAME_POINTER);
    buf.extend_from_slice(&rtype.to_u16().to_be_bytes());
    buf.extend_from_slice(&CLASS_IN.to_be_bytes());
    buf.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    buf.extend_from_slice(rdata);
}
