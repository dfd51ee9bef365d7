//! Domain name to DNS wire format (RFC 1035 section 3.1).

use crate::error::InvalidName;
use std::fmt;

// RFC 1035: label and name length limits
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// Length-prefixed label encoding of a domain name, including the root byte.
///
/// Comparison is plain byte equality, so names are case-sensitive.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WireName(Box<[u8]>);

impl WireName {
    /// Encode a dotted name. A single trailing dot is accepted and ignored.
    pub fn encode(name: &str) -> Result<WireName, InvalidName> {
        let name = name.strip_suffix('.').unwrap_or(name);

        let mut buf = Vec::with_capacity(name.len() + 2);
        for label in name.split('.') {
            if label.is_empty() {
                return Err(InvalidName::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(InvalidName::LabelTooLong(label.len()));
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);

        if buf.len() > MAX_NAME_LEN {
            return Err(InvalidName::NameTooLong(buf.len()));
        }

        Ok(WireName(buf.into_boxed_slice()))
    }

    /// Full encoding, root byte included
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoding without the trailing root byte.
    /// Incoming query names are compared against this form.
    pub fn without_root(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: even the shortest name carries a root byte
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the raw labels
    pub fn labels(&self) -> Labels<'_> {
        Labels {
            buf: self.without_root(),
        }
    }

    /// Dotted presentation form without the trailing dot
    pub fn to_dotted(&self) -> String {
        self.labels()
            .map(|label| String::from_utf8_lossy(label).into_owned())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Debug for WireName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireName({:?})", self.to_dotted())
    }
}

impl fmt::Display for WireName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

/// Iterator over the labels of a length-prefixed label sequence
pub struct Labels<'a> {
    buf: &'a [u8],
}

impl<'a> Labels<'a> {
    /// Walk labels of a borrowed sequence (e.g. a query name from a datagram).
    /// Stops at the first length byte that does not fit.
    pub fn new(buf: &'a [u8]) -> Self {
        Labels { buf }
    }
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.buf.split_first()?;
        let len = len as usize;
        if len == 0 || len > rest.len() {
            self.buf = &[];
            return None;
        }
        let (label, rest) = rest.split_at(len);
        self.buf = rest;
        Some(label)
    }
}
