//! UDP listener: receive, filter, dispatch, send.

use crate::config::{DnsSecurityConfig, RecordConfig};
use crate::dns::dispatch::Dispatcher;
use crate::dns::records::RecordStore;
use crate::dns::wire::HeaderPolicy;
use crate::error::{ConfigError, RejectReason, TransmitError};
use crate::security::{DnsRateLimiter, SourceFilter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Largest datagram we read; anything longer is rejected by validation anyway
const RECV_BUFFER_SIZE: usize = 512;

/// Bind `listen_addr` and serve until the socket fails
pub async fn run_dns_server(
    listen_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    security: DnsSecurityConfig,
    enable_logging: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let socket = UdpSocket::bind(listen_addr).await?;
    serve(socket, dispatcher, security, enable_logging).await
}

/// Serve on an already bound socket
pub async fn serve(
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
    security: DnsSecurityConfig,
    enable_logging: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let socket = Arc::new(socket);
    let source_filter = SourceFilter::parse(&security.allowed_source_ips)?;
    let rate_limiter = Arc::new(Mutex::new(DnsRateLimiter::new(security.clone())));
    let local_addr = socket.local_addr()?;

    info!(
        listen = %local_addr,
        records = dispatcher.store().len(),
        policy = ?dispatcher.policy(),
        rate_limit = security.rate_limit_enabled,
        max_qps = security.max_qps,
        source_filter = !source_filter.is_empty(),
        "DNS server started"
    );

    // Spawn cleanup task for rate limiter
    if security.rate_limit_enabled {
        let rate_limiter_cleanup = Arc::clone(&rate_limiter);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(10)).await;
                rate_limiter_cleanup.lock().await.cleanup();
            }
        });
    }

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        let Some((len, src)) = recv_datagram(&socket, &mut buf).await else {
            continue;
        };

        if let Err(reason) = admit(&source_filter, &rate_limiter, src).await {
            if enable_logging {
                debug!(client = %src, reason = %reason, "DNS query rejected");
            }
            continue;
        }

        let datagram = buf[..len].to_vec();
        let socket = Arc::clone(&socket);
        let dispatcher = Arc::clone(&dispatcher);

        tokio::spawn(async move {
            if let Err(e) = respond(&socket, &dispatcher, &datagram, src, enable_logging).await {
                report_send_failure(&e);
            }
        });
    }
}

/// Next datagram, or `None` after logging a receive error.
/// Errors here belong to one peer (e.g. ICMP port unreachable surfacing as a
/// reset), so they must not stop the listener.
async fn recv_datagram(socket: &UdpSocket, buf: &mut [u8]) -> Option<(usize, SocketAddr)> {
    match socket.recv_from(buf).await {
        Ok(received) => Some(received),
        Err(e) => {
            warn!(error = %e, "DNS receive failed");
            None
        }
    }
}

/// Source allowlist then rate limit
async fn admit(
    source_filter: &SourceFilter,
    rate_limiter: &Mutex<DnsRateLimiter>,
    src: SocketAddr,
) -> Result<(), RejectReason> {
    if !source_filter.is_allowed(&src.ip()) {
        return Err(RejectReason::SourceNotAllowed);
    }
    if !rate_limiter.lock().await.is_allowed(src.ip()) {
        return Err(RejectReason::RateLimited);
    }
    Ok(())
}

/// Answer one datagram, logging the outcome. `None` means stay silent.
pub fn handle_datagram(
    dispatcher: &Dispatcher,
    datagram: &[u8],
    client: SocketAddr,
    enable_logging: bool,
) -> Option<Vec<u8>> {
    match dispatcher.dispatch(datagram) {
        Ok(reply) => {
            if enable_logging {
                info!(
                    name = %reply.name,
                    qtype = %reply.qtype,
                    client = %client,
                    "DNS query accepted"
                );
            }
            Some(reply.bytes)
        }
        Err(reason) => {
            if enable_logging {
                debug!(
                    client = %client,
                    reason = %reason,
                    bytes = datagram.len(),
                    "DNS query rejected"
                );
            }
            None
        }
    }
}

/// Answer one datagram and send the reply, if any
async fn respond(
    socket: &UdpSocket,
    dispatcher: &Dispatcher,
    datagram: &[u8],
    client: SocketAddr,
    enable_logging: bool,
) -> Result<(), TransmitError> {
    match handle_datagram(dispatcher, datagram, client, enable_logging) {
        Some(reply) => send_reply(socket, &reply, client).await,
        None => Ok(()),
    }
}

/// Logged whether or not per-query logging is on
fn report_send_failure(e: &TransmitError) {
    error!(client = %e.client, error = %e.source, "DNS failed to send response");
}

async fn send_reply(socket: &UdpSocket, reply: &[u8], client: SocketAddr) -> Result<(), TransmitError> {
    socket
        .send_to(reply, client)
        .await
        .map(|_| ())
        .map_err(|source| TransmitError { client, source })
}

/// Build a dispatcher from config, failing on any invalid record
pub fn build_dispatcher(
    records: &[RecordConfig],
    policy: HeaderPolicy,
) -> Result<Dispatcher, ConfigError> {
    let store = RecordStore::from_config(records)?;
    Ok(Dispatcher::new(Arc::new(store), policy))
}
