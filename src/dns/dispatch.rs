//! Query dispatch: match a validated query and render its reply.

use crate::dns::records::{Lookup, RecordStore};
use crate::dns::wire::{DnsQuery, HeaderPolicy, RecordType};
use crate::error::RejectReason;
use std::sync::Arc;

/// Reply ready for the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<'a> {
    /// Configured record name that matched
    pub name: &'a str,
    pub qtype: RecordType,
    pub bytes: Vec<u8>,
}

/// Stateless matcher shared by all query tasks
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<RecordStore>,
    policy: HeaderPolicy,
}

impl Dispatcher {
    pub fn new(store: Arc<RecordStore>, policy: HeaderPolicy) -> Self {
        Dispatcher { store, policy }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn policy(&self) -> HeaderPolicy {
        self.policy
    }

    /// Reply bytes for a validated query, or `None` when the name is unknown
    /// or has no address of the requested type.
    pub fn handle(&self, query: &DnsQuery<'_>) -> Option<Vec<u8>> {
        self.answer(query).ok().map(|reply| reply.bytes)
    }

    /// Like [`Dispatcher::handle`], keeping the matched name for logging
    pub fn answer(&self, query: &DnsQuery<'_>) -> Result<Reply<'_>, RejectReason> {
        let qtype = query.query_type();

        match self.store.lookup(query.name_bytes(), qtype) {
            Lookup::Found(entry, response) => Ok(Reply {
                name: entry.name(),
                qtype,
                bytes: response.render(query.id(), qtype),
            }),
            Lookup::TypeNotSupported(_) | Lookup::NotFound => {
                Err(RejectReason::NameOrTypeNotFound)
            }
        }
    }

    /// Validate a raw datagram and answer it
    pub fn dispatch(&self, datagram: &[u8]) -> Result<Reply<'_>, RejectReason> {
        let query = DnsQuery::parse_with(datagram, self.policy)?;
        self.answer(&query)
    }
}
