//! Error types for configuration, query rejection and transmission.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// A domain name that cannot be encoded as a DNS wire name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidName {
    /// Empty label (e.g. "a..b", or an empty name)
    EmptyLabel,
    /// Label longer than 63 bytes
    LabelTooLong(usize),
    /// Encoded name longer than 255 bytes
    NameTooLong(usize),
}

impl fmt::Display for InvalidName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidName::EmptyLabel => write!(f, "empty label"),
            InvalidName::LabelTooLong(len) => {
                write!(f, "label is {} bytes (maximum 63)", len)
            }
            InvalidName::NameTooLong(len) => {
                write!(f, "encoded name is {} bytes (maximum 255)", len)
            }
        }
    }
}

impl std::error::Error for InvalidName {}

/// Fatal startup errors. The server never starts with a partial record table.
#[derive(Debug)]
pub enum ConfigError {
    /// A configured record name failed wire encoding
    InvalidName { name: String, source: InvalidName },
    /// A record has neither an A nor an AAAA address
    MissingAddress(String),
    /// The same name is configured more than once
    DuplicateName(String),
    /// Allowlist entry is neither an IP nor a CIDR range
    InvalidSource(String),
    /// Config file could not be read
    Io(io::Error),
    /// Config file is not valid YAML for our schema
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidName { name, source } => {
                write!(f, "Invalid record name {:?}: {}", name, source)
            }
            ConfigError::MissingAddress(name) => {
                write!(f, "Record {:?} has no A or AAAA address", name)
            }
            ConfigError::DuplicateName(name) => {
                write!(f, "Record {:?} is configured more than once", name)
            }
            ConfigError::InvalidSource(entry) => {
                write!(f, "Invalid allowed source {:?}", entry)
            }
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidName { source, .. } => Some(source),
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Why a datagram was dropped without a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Datagram shorter than 18 or longer than 269 bytes
    LengthOutOfRange,
    /// Not a standard query with exactly one question
    UnsupportedOpcode,
    /// Question name has no reachable terminator
    MalformedName,
    /// Question is not class IN, type A or AAAA
    UnsupportedQuestion,
    /// Name unknown, or known without an address of the requested type
    NameOrTypeNotFound,
    /// Source address not in the allowlist
    SourceNotAllowed,
    /// Client exceeded its query rate
    RateLimited,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::LengthOutOfRange => "length out of range",
            RejectReason::UnsupportedOpcode => "unsupported opcode or question count",
            RejectReason::MalformedName => "malformed question name",
            RejectReason::UnsupportedQuestion => "unsupported question type or class",
            RejectReason::NameOrTypeNotFound => "name or type not found",
            RejectReason::SourceNotAllowed => "source not allowed",
            RejectReason::RateLimited => "rate limited",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for RejectReason {}

/// A reply could not be handed to the socket
#[derive(Debug)]
pub struct TransmitError {
    pub client: SocketAddr,
    pub source: io::Error,
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to send reply to {}: {}", self.client, self.source)
    }
}

impl std::error::Error for TransmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
