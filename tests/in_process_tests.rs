//! In-process integration tests for the DNS responder.
//!
//! These tests start the actual server on a loopback socket and exchange
//! real datagrams with it.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

use lantern::config::{parse_config, DnsSecurityConfig, RecordConfig};
use lantern::dns::wire::HeaderPolicy;
use lantern::dns::{build_dispatcher, run_dns_server, serve, Dispatcher};

const TYPE_A: u16 = 1;
const TYPE_AAAA: u16 = 28;
const TYPE_MX: u16 = 15;
const TYPE_ANY: u16 = 255;

/// Helper to find an available UDP port
fn get_available_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn test_records() -> Vec<RecordConfig> {
    vec![
        RecordConfig {
            name: "example.com".to_string(),
            a: Some(Ipv4Addr::new(127, 0, 0, 1)),
            aaaa: Some(Ipv6Addr::LOCALHOST),
        },
        RecordConfig {
            name: "ipv4only.test".to_string(),
            a: Some(Ipv4Addr::new(192, 0, 2, 10)),
            aaaa: None,
        },
        RecordConfig {
            name: "ipv6only.test".to_string(),
            a: None,
            aaaa: Some("2001:db8::10".parse().unwrap()),
        },
    ]
}

fn test_dns_security_config() -> DnsSecurityConfig {
    DnsSecurityConfig {
        allowed_source_ips: vec![],
        rate_limit_enabled: false,
        max_qps: 1000,
        max_tracked_ips: 1000,
        ipv6_subnet_rate_limit: true,
    }
}

fn test_dispatcher(policy: HeaderPolicy) -> Arc<Dispatcher> {
    Arc::new(build_dispatcher(&test_records(), policy).unwrap())
}

/// Start a DNS server on an ephemeral port and return its address
async fn start_test_dns_server(
    policy: HeaderPolicy,
    security: DnsSecurityConfig,
) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let dispatcher = test_dispatcher(policy);

    let handle = tokio::spawn(async move {
        let _ = serve(socket, dispatcher, security, false).await;
    });

    (addr, handle)
}

/// Build a DNS query with an arbitrary type and flags
fn build_dns_query_with(domain: &str, qtype: u16, query_id: u16, flags: [u8; 2]) -> Vec<u8> {
    let mut query = Vec::new();

    // Transaction ID
    query.extend_from_slice(&query_id.to_be_bytes());
    query.extend_from_slice(&flags);

    // Questions: 1, no other records
    query.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    for label in domain.split('.') {
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0x00);

    query.extend_from_slice(&qtype.to_be_bytes());
    // Class: IN (1)
    query.extend_from_slice(&[0x00, 0x01]);

    query
}

/// Standard query with recursion desired
fn build_dns_query(domain: &str, qtype: u16, query_id: u16) -> Vec<u8> {
    build_dns_query_with(domain, qtype, query_id, [0x01, 0x00])
}

/// Send one datagram and wait briefly for a reply
async fn exchange(server: SocketAddr, query: &[u8]) -> Option<Vec<u8>> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(query, server).await.unwrap();

    let mut response = [0u8; 512];
    match tokio::time::timeout(Duration::from_millis(500), socket.recv_from(&mut response)).await {
        Ok(Ok((len, from))) => {
            assert_eq!(from, server, "Reply should come from the server address");
            Some(response[..len].to_vec())
        }
        _ => None,
    }
}

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

/// Offset of the first answer, right after the echoed question
fn answers_offset(query_len: usize) -> usize {
    query_len
}

// ============== Answer Tests ==============

#[tokio::test]
async fn test_dns_dual_stack_a_query() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query("example.com", TYPE_A, 0x1234);
    let response = exchange(dns_addr, &query).await.expect("Should get a response");

    // Transaction ID echoed, standard response flags
    assert_eq!(&response[0..2], &[0x12, 0x34]);
    assert_eq!(&response[2..4], &[0x81, 0x80]);
    // QDCOUNT 1, ANCOUNT 2, no authority or additional
    assert_eq!(u16_at(&response, 4), 1);
    assert_eq!(u16_at(&response, 6), 2);
    assert_eq!(u16_at(&response, 8), 0);
    assert_eq!(u16_at(&response, 10), 0);

    // Question echoed byte for byte
    assert_eq!(&response[12..query.len()], &query[12..]);

    // A answer first
    let a = answers_offset(query.len());
    assert_eq!(&response[a..a + 2], &[0xC0, 0x0C]);
    assert_eq!(u16_at(&response, a + 2), TYPE_A);
    assert_eq!(u16_at(&response, a + 4), 1);
    assert_eq!(&response[a + 6..a + 10], &300u32.to_be_bytes());
    assert_eq!(u16_at(&response, a + 10), 4);
    assert_eq!(&response[a + 12..a + 16], &[0x7f, 0x00, 0x00, 0x01]);

    // Then AAAA
    let aaaa = a + 16;
    assert_eq!(u16_at(&response, aaaa + 2), TYPE_AAAA);
    assert_eq!(u16_at(&response, aaaa + 10), 16);
    let mut loopback = [0u8; 16];
    loopback[15] = 1;
    assert_eq!(&response[aaaa + 12..aaaa + 28], &loopback);
    assert_eq!(response.len(), aaaa + 28);
}

#[tokio::test]
async fn test_dns_dual_stack_aaaa_query_echoes_type() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query("example.com", TYPE_AAAA, 0xBEEF);
    let response = exchange(dns_addr, &query).await.expect("Should get a response");

    assert_eq!(&response[0..2], &[0xBE, 0xEF]);
    assert_eq!(u16_at(&response, 6), 2);
    assert_eq!(u16_at(&response, query.len() - 4), TYPE_AAAA);

    // AAAA answer leads when AAAA was asked
    let first = answers_offset(query.len());
    assert_eq!(u16_at(&response, first + 2), TYPE_AAAA);
    assert_eq!(u16_at(&response, first + 28 + 2), TYPE_A);
}

#[tokio::test]
async fn test_dns_single_family_records() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query("ipv4only.test", TYPE_A, 7);
    let response = exchange(dns_addr, &query).await.expect("Should get a response");
    assert_eq!(u16_at(&response, 6), 1);
    let a = answers_offset(query.len());
    assert_eq!(&response[a + 12..a + 16], &[192, 0, 2, 10]);
    assert_eq!(response.len(), a + 16);

    let query = build_dns_query("ipv6only.test", TYPE_AAAA, 8);
    let response = exchange(dns_addr, &query).await.expect("Should get a response");
    assert_eq!(u16_at(&response, 6), 1);
    let aaaa = answers_offset(query.len());
    let expected: Ipv6Addr = "2001:db8::10".parse().unwrap();
    assert_eq!(&response[aaaa + 12..aaaa + 28], &expected.octets());
}

#[tokio::test]
async fn test_dns_missing_family_is_silent() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query("ipv4only.test", TYPE_AAAA, 1);
    assert!(exchange(dns_addr, &query).await.is_none());

    let query = build_dns_query("ipv6only.test", TYPE_A, 2);
    assert!(exchange(dns_addr, &query).await.is_none());
}

#[tokio::test]
async fn test_dns_multiple_queries() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    for id in [0x0000u16, 0x0001, 0x7fff, 0xffff] {
        let query = build_dns_query("example.com", TYPE_A, id);
        let response = exchange(dns_addr, &query).await.expect("Should get a response");
        assert_eq!(u16_at(&response, 0), id);
    }
}

#[tokio::test]
async fn test_dns_concurrent_clients() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let mut tasks = Vec::new();
    for id in 0..16u16 {
        tasks.push(tokio::spawn(async move {
            let query = build_dns_query("example.com", TYPE_A, id);
            exchange(dns_addr, &query).await.map(|r| u16_at(&r, 0))
        }));
    }
    for (id, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), Some(id as u16));
    }
}

// ============== Silent Drop Tests ==============

#[tokio::test]
async fn test_dns_unknown_name_is_silent() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query("nonexistent.test", TYPE_A, 0x5678);
    assert!(exchange(dns_addr, &query).await.is_none());
}

#[tokio::test]
async fn test_dns_case_sensitive_match() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query("EXAMPLE.com", TYPE_A, 1);
    assert!(exchange(dns_addr, &query).await.is_none());
}

#[tokio::test]
async fn test_dns_unsupported_types_are_silent() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    for qtype in [TYPE_MX, TYPE_ANY] {
        let query = build_dns_query("example.com", qtype, 1);
        assert!(exchange(dns_addr, &query).await.is_none());
    }
}

#[tokio::test]
async fn test_dns_malformed_query() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    // Too short
    assert!(exchange(dns_addr, &[0u8; 10]).await.is_none());

    // Too long
    assert!(exchange(dns_addr, &[0u8; 300]).await.is_none());

    // Label length runs past the end of the datagram
    let mut query = build_dns_query("example.com", TYPE_A, 1);
    query[12] = 60;
    assert!(exchange(dns_addr, &query).await.is_none());

    // Compression pointer in the question name
    let mut query = build_dns_query("example.com", TYPE_A, 1);
    query[12] = 0xC0;
    assert!(exchange(dns_addr, &query).await.is_none());

    // Server keeps answering afterwards
    let query = build_dns_query("example.com", TYPE_A, 2);
    assert!(exchange(dns_addr, &query).await.is_some());
}

#[tokio::test]
async fn test_dns_response_flag_set_is_dropped() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query_with("example.com", TYPE_A, 1, [0x81, 0x00]);
    assert!(exchange(dns_addr, &query).await.is_none());
}

// ============== Header Policy Tests ==============

#[tokio::test]
async fn test_dns_lenient_accepts_no_recursion_desired() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Lenient, test_dns_security_config()).await;

    let query = build_dns_query_with("example.com", TYPE_A, 1, [0x00, 0x00]);
    assert!(exchange(dns_addr, &query).await.is_some());
}

#[tokio::test]
async fn test_dns_strict_requires_exact_flags() {
    let (dns_addr, _handle) =
        start_test_dns_server(HeaderPolicy::Strict, test_dns_security_config()).await;

    let query = build_dns_query_with("example.com", TYPE_A, 1, [0x00, 0x00]);
    assert!(exchange(dns_addr, &query).await.is_none());

    let query = build_dns_query_with("example.com", TYPE_A, 2, [0x01, 0x20]);
    assert!(exchange(dns_addr, &query).await.is_none());

    let query = build_dns_query("example.com", TYPE_A, 3);
    assert!(exchange(dns_addr, &query).await.is_some());
}

// ============== Security Tests ==============

#[tokio::test]
async fn test_dns_source_allowlist() {
    let allowed = DnsSecurityConfig {
        allowed_source_ips: vec!["127.0.0.0/8".to_string()],
        ..test_dns_security_config()
    };
    let (dns_addr, _handle) = start_test_dns_server(HeaderPolicy::Lenient, allowed).await;
    let query = build_dns_query("example.com", TYPE_A, 1);
    assert!(exchange(dns_addr, &query).await.is_some());

    let denied = DnsSecurityConfig {
        allowed_source_ips: vec!["192.0.2.1".to_string()],
        ..test_dns_security_config()
    };
    let (dns_addr, _handle) = start_test_dns_server(HeaderPolicy::Lenient, denied).await;
    assert!(exchange(dns_addr, &query).await.is_none());
}

#[tokio::test]
async fn test_dns_rate_limit() {
    let security = DnsSecurityConfig {
        rate_limit_enabled: true,
        max_qps: 2,
        ..test_dns_security_config()
    };
    let (dns_addr, _handle) = start_test_dns_server(HeaderPolicy::Lenient, security).await;

    // Same source address for every query
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let query = build_dns_query("example.com", TYPE_A, 1);
    for _ in 0..5 {
        socket.send_to(&query, dns_addr).await.unwrap();
    }

    let mut answered = 0;
    let mut response = [0u8; 512];
    while let Ok(Ok(_)) =
        tokio::time::timeout(Duration::from_millis(300), socket.recv_from(&mut response)).await
    {
        answered += 1;
    }
    assert_eq!(answered, 2);
}

// ============== Startup Tests ==============

#[tokio::test]
async fn test_run_dns_server_binds_address() {
    let port = get_available_udp_port();
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();

    let dispatcher = test_dispatcher(HeaderPolicy::Lenient);
    let _handle = tokio::spawn(async move {
        let _ = run_dns_server(addr, dispatcher, test_dns_security_config(), false).await;
    });

    // Wait for server to be ready
    tokio::time::sleep(Duration::from_millis(100)).await;

    let query = build_dns_query("example.com", TYPE_A, 0x4242);
    let response = exchange(addr, &query).await.expect("Should get a response");
    assert_eq!(&response[0..2], &[0x42, 0x42]);
}

#[tokio::test]
async fn test_default_config_serves_example_com() {
    let config = parse_config(lantern::config::DEFAULT_CONFIG_YAML).unwrap();
    let dispatcher = Arc::new(
        build_dispatcher(&config.records, config.dns.header_policy()).unwrap(),
    );

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let _handle = tokio::spawn(serve(socket, dispatcher, test_dns_security_config(), false));

    let query = build_dns_query("example.com", TYPE_AAAA, 9);
    let response = exchange(addr, &query).await.expect("Should get a response");
    assert_eq!(u16_at(&response, 6), 2);
}

#[test]
fn test_duplicate_record_is_fatal() {
    let mut records = test_records();
    records.push(records[0].clone());
    assert!(build_dispatcher(&records, HeaderPolicy::Lenient).is_err());
}
