//! Per-client query rate limiting.
//!
//! - Fixed one-second window per client
//! - Bounded table with oldest-first eviction
//! - IPv6 clients optionally grouped by /64

use crate::config::DnsSecurityConfig;
use crate::security::ip_filter::normalize_ip;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv6Addr};
use std::time::{Duration, Instant};
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(1);
/// Entries idle longer than this are dropped by `cleanup`
const IDLE_EXPIRY: Duration = Duration::from_secs(5);

/// Key a client is counted under
fn rate_limit_key(ip: IpAddr, ipv6_subnet: bool) -> IpAddr {
    match normalize_ip(&ip) {
        IpAddr::V6(v6) if ipv6_subnet => {
            let prefix = u128::from(v6) & (u128::MAX << 64);
            IpAddr::V6(Ipv6Addr::from(prefix))
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Queries-per-second limiter keyed by client address
pub struct DnsRateLimiter {
    clients: HashMap<IpAddr, Window>,
    insertion_order: VecDeque<IpAddr>,
    config: DnsSecurityConfig,
}

impl DnsRateLimiter {
    pub fn new(config: DnsSecurityConfig) -> Self {
        DnsRateLimiter {
            clients: HashMap::new(),
            insertion_order: VecDeque::new(),
            config,
        }
    }

    pub fn is_allowed(&mut self, ip: IpAddr) -> bool {
        self.is_allowed_at(ip, Instant::now())
    }

    fn is_allowed_at(&mut self, ip: IpAddr, now: Instant) -> bool {
        if !self.config.rate_limit_enabled {
            return true;
        }

        let key = rate_limit_key(ip, self.config.ipv6_subnet_rate_limit);

        if !self.clients.contains_key(&key) {
            self.evict_if_needed();
            self.insertion_order.push_back(key);
        }

        let window = self.clients.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started) >= WINDOW {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        window.count = window.count.saturating_add(1);
        window.count <= self.config.max_qps
    }

    fn evict_if_needed(&mut self) {
        let capacity = self.config.max_tracked_ips.max(1);
        if self.clients.len() >= capacity {
            warn!(
                tracked_ips = capacity,
                "DNS rate limiter at capacity, evicting oldest entries"
            );
        }
        while self.clients.len() >= capacity {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.clients.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Forget clients that have been quiet for a while
    pub fn cleanup(&mut self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&mut self, now: Instant) {
        self.clients
            .retain(|_, w| now.saturating_duration_since(w.started) <= IDLE_EXPIRY);
        let clients = &self.clients;
        self.insertion_order.retain(|ip| clients.contains_key(ip));
    }

    pub fn tracked_ip_count(&self) -> usize {
        self.clients.len()
    }
}
