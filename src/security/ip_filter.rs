//! Source address allowlist.

use crate::error::ConfigError;
use std::net::IpAddr;

/// Map IPv4-mapped IPv6 addresses (::ffff:a.b.c.d) to plain IPv4.
/// A dual-stack `[::]` socket reports IPv4 clients in mapped form.
pub fn normalize_ip(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => *ip,
        },
        IpAddr::V4(_) => *ip,
    }
}

/// Check if an IP is within a CIDR range
pub fn ip_in_cidr(ip: &IpAddr, network: &IpAddr, prefix_len: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix_len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            u32::from(*ip) & mask == u32::from(*net) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix_len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            u128::from(*ip) & mask == u128::from(*net) & mask
        }
        _ => false,
    }
}

/// Parsed allowlist. An empty list admits every source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    networks: Vec<(IpAddr, u8)>,
}

impl SourceFilter {
    /// Parse entries such as `"192.168.1.10"`, `"10.0.0.0/8"` or `"fd00::/8"`
    pub fn parse(entries: &[String]) -> Result<SourceFilter, ConfigError> {
        let networks = entries
            .iter()
            .map(|entry| parse_entry(entry).ok_or_else(|| ConfigError::InvalidSource(entry.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SourceFilter { networks })
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn is_allowed(&self, client_ip: &IpAddr) -> bool {
        if self.networks.is_empty() {
            return true;
        }

        let client_ip = normalize_ip(client_ip);
        self.networks
            .iter()
            .any(|(network, prefix_len)| ip_in_cidr(&client_ip, network, *prefix_len))
    }
}

fn parse_entry(entry: &str) -> Option<(IpAddr, u8)> {
    match entry.split_once('/') {
        Some((network, prefix)) => {
            let network = normalize_ip(&network.trim().parse().ok()?);
            let prefix_len: u8 = prefix.trim().parse().ok()?;
            let max = if network.is_ipv4() { 32 } else { 128 };
            (prefix_len <= max).then_some((network, prefix_len))
        }
        None => {
            let ip = normalize_ip(&entry.trim().parse().ok()?);
            let full = if ip.is_ipv4() { 32 } else { 128 };
            Some((ip, full))
        }
    }
}
