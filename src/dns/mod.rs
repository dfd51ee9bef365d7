//! Authoritative DNS responder: name codec, record table, dispatch and UDP server.

pub mod dispatch;
pub mod name;
pub mod records;
pub mod response;
mod server;
pub mod wire;

pub use dispatch::{Dispatcher, Reply};
pub use server::{build_dispatcher, handle_datagram, run_dns_server, serve};
