//! The fixed record table and its precomputed answers.

use crate::config::RecordConfig;
use crate::dns::name::WireName;
use crate::dns::response::{build_response, PrecomputedResponse};
use crate::dns::wire::RecordType;
use crate::error::ConfigError;
use std::net::{Ipv4Addr, Ipv6Addr};

/// One configured name with its addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    name: String,
    wire_name: WireName,
    a: Option<[u8; 4]>,
    aaaa: Option<[u8; 16]>,
}

impl RecordEntry {
    pub fn new(
        name: &str,
        a: Option<Ipv4Addr>,
        aaaa: Option<Ipv6Addr>,
    ) -> Result<RecordEntry, ConfigError> {
        let wire_name = WireName::encode(name).map_err(|source| ConfigError::InvalidName {
            name: name.to_string(),
            source,
        })?;

        if a.is_none() && aaaa.is_none() {
            return Err(ConfigError::MissingAddress(name.to_string()));
        }

        Ok(RecordEntry {
            name: wire_name.to_dotted(),
            wire_name,
            a: a.map(|ip| ip.octets()),
            aaaa: aaaa.map(|ip| ip.octets()),
        })
    }

    /// Dotted name, without a trailing dot
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_name(&self) -> &WireName {
        &self.wire_name
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.a.map(Ipv4Addr::from)
    }

    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        self.aaaa.map(Ipv6Addr::from)
    }

    /// Raw RDATA for a record type
    pub fn rdata(&self, rtype: RecordType) -> Option<&[u8]> {
        match rtype {
            RecordType::A => self.a.as_ref().map(|a| &a[..]),
            RecordType::AAAA => self.aaaa.as_ref().map(|a| &a[..]),
        }
    }

    pub fn supports(&self, rtype: RecordType) -> bool {
        self.rdata(rtype).is_some()
    }
}

impl TryFrom<&RecordConfig> for RecordEntry {
    type Error = ConfigError;

    fn try_from(config: &RecordConfig) -> Result<Self, Self::Error> {
        RecordEntry::new(&config.name, config.a, config.aaaa)
    }
}

/// An entry together with its answers
#[derive(Debug)]
struct StoredRecord {
    entry: RecordEntry,
    a_response: Option<PrecomputedResponse>,
    aaaa_response: Option<PrecomputedResponse>,
}

impl StoredRecord {
    fn response(&self, qtype: RecordType) -> Option<&PrecomputedResponse> {
        match qtype {
            RecordType::A => self.a_response.as_ref(),
            RecordType::AAAA => self.aaaa_response.as_ref(),
        }
    }
}

/// Result of matching a query against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a RecordEntry, &'a PrecomputedResponse),
    /// Name is known but has no address of the requested type
    TypeNotSupported(&'a RecordEntry),
    NotFound,
}

/// Immutable table built once at startup.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<StoredRecord>,
}

impl RecordStore {
    /// Build the table and every answer. Any invalid entry rejects the whole table.
    pub fn build(entries: Vec<RecordEntry>) -> Result<RecordStore, ConfigError> {
        let mut records: Vec<StoredRecord> = Vec::with_capacity(entries.len());

        for entry in entries {
            if records.iter().any(|r| r.entry.wire_name == entry.wire_name) {
                return Err(ConfigError::DuplicateName(entry.name));
            }

            records.push(StoredRecord {
                a_response: build_response(&entry, RecordType::A),
                aaaa_response: build_response(&entry, RecordType::AAAA),
                entry,
            });
        }

        Ok(RecordStore { records })
    }

    /// Build from configuration
    pub fn from_config(records: &[RecordConfig]) -> Result<RecordStore, ConfigError> {
        let entries = records
            .iter()
            .map(RecordEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(entries)
    }

    /// Match a query name (labels without the root byte) and type.
    /// Linear scan; the table is expected to be small.
    pub fn lookup(&self, qname: &[u8], qtype: RecordType) -> Lookup<'_> {
        let Some(record) = self
            .records
            .iter()
            .find(|r| r.entry.wire_name.without_root() == qname)
        else {
            return Lookup::NotFound;
        };

        match record.response(qtype) {
            Some(response) => Lookup::Found(&record.entry, response),
            None => Lookup::TypeNotSupported(&record.entry),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &RecordEntry> {
        self.records.iter().map(|r| &r.entry)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidName;

    fn sample_store() -> RecordStore {
        RecordStore::build(vec![
            RecordEntry::new(
                "example.com",
                Some(Ipv4Addr::LOCALHOST),
                Some(Ipv6Addr::LOCALHOST),
            )
            .unwrap(),
            RecordEntry::new("ipv6only.test", None, Some(Ipv6Addr::LOCALHOST)).unwrap(),
            RecordEntry::new("ipv4only.test", Some(Ipv4Addr::LOCALHOST), None).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_entry_requires_address() {
        let err = RecordEntry::new("empty.test", None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress(ref n) if n == "empty.test"));
    }

    #[test]
    fn test_entry_rejects_invalid_name() {
        let err = RecordEntry::new("a..b", Some(Ipv4Addr::LOCALHOST), None).unwrap_err();
        match err {
            ConfigError::InvalidName { name, source } => {
                assert_eq!(name, "a..b");
                assert_eq!(source, InvalidName::EmptyLabel);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_entry_normalizes_trailing_dot() {
        let entry = RecordEntry::new("example.com.", Some(Ipv4Addr::LOCALHOST), None).unwrap();
        assert_eq!(entry.name(), "example.com");
        assert_eq!(entry.ipv4(), Some(Ipv4Addr::LOCALHOST));
        assert_eq!(entry.ipv6(), None);
        assert!(entry.supports(RecordType::A));
        assert!(!entry.supports(RecordType::AAAA));
    }

    #[test]
    fn test_lookup_found() {
        let store = sample_store();
        let name = WireName::encode("example.com").unwrap();

        match store.lookup(name.without_root(), RecordType::AAAA) {
            Lookup::Found(entry, response) => {
                assert_eq!(entry.name(), "example.com");
                assert_eq!(&response.as_bytes()[6..8], &[0x00, 0x02]);
            }
            other => panic!("unexpected lookup: {:?}", other),
        }
    }

    #[test]
    fn test_lookup_type_not_supported() {
        let store = sample_store();
        let name = WireName::encode("ipv6only.test").unwrap();
        assert!(matches!(
            store.lookup(name.without_root(), RecordType::A),
            Lookup::TypeNotSupported(e) if e.name() == "ipv6only.test"
        ));
    }

    #[test]
    fn test_lookup_not_found() {
        let store = sample_store();
        let name = WireName::encode("nonexistent.test").unwrap();
        assert_eq!(store.lookup(name.without_root(), RecordType::A), Lookup::NotFound);
    }

    #[test]
    fn test_lookup_with_root_byte_does_not_match() {
        let store = sample_store();
        let name = WireName::encode("example.com").unwrap();
        assert_eq!(store.lookup(name.as_bytes(), RecordType::A), Lookup::NotFound);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let store = sample_store();
        let name = WireName::encode("EXAMPLE.com").unwrap();
        assert_eq!(store.lookup(name.without_root(), RecordType::A), Lookup::NotFound);
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = RecordStore::build(vec![
            RecordEntry::new("dup.test", Some(Ipv4Addr::LOCALHOST), None).unwrap(),
            RecordEntry::new("dup.test.", None, Some(Ipv6Addr::LOCALHOST)).unwrap(),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(ref n) if n == "dup.test"));
    }

    #[test]
    fn test_from_config_fails_whole_table() {
        let records = vec![
            RecordConfig {
                name: "good.test".to_string(),
                a: Some(Ipv4Addr::LOCALHOST),
                aaaa: None,
            },
            RecordConfig {
                name: format!("{}.test", "x".repeat(64)),
                a: Some(Ipv4Addr::LOCALHOST),
                aaaa: None,
            },
        ];
        let err = RecordStore::from_config(&records).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidName {
                source: InvalidName::LabelTooLong(64),
                ..
            }
        ));
    }

    #[test]
    fn test_store_accessors() {
        let store = sample_store();
        assert_eq!(store.len(), 3);
        assert!(!store.is_empty());
        let names: Vec<&str> = store.entries().map(|e| e.name()).collect();
        assert_eq!(names, vec!["example.com", "ipv6only.test", "ipv4only.test"]);
        assert!(RecordStore::default().is_empty());
    }
}
