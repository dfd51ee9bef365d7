//! Source filtering and rate limiting for the UDP listener.

mod ip_filter;
mod rate_limiter;

pub use ip_filter::{ip_in_cidr, normalize_ip, SourceFilter};
pub use rate_limiter::DnsRateLimiter;
