//! Lantern - A minimal authoritative DNS responder.
//!
//! Answers A and AAAA questions for a fixed table of names with
//! precomputed responses. Everything else is dropped silently.
//! Exposed as a library for testing and integration purposes.

pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
pub mod security;
