//! Configuration types and loading for the responder.

use crate::dns::wire::HeaderPolicy;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

/// Default config.yaml embedded at compile time
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../config.yaml");

/// Main configuration struct
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub records: Vec<RecordConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============== Records ==============

/// One static record. Addresses are written in their usual text form.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RecordConfig {
    pub name: String,
    #[serde(default)]
    pub a: Option<Ipv4Addr>,
    #[serde(default)]
    pub aaaa: Option<Ipv6Addr>,
}

// ============== DNS Config ==============

#[derive(Debug, Deserialize, Clone)]
pub struct DnsConfig {
    #[serde(default = "default_dns_listen")]
    pub listen: String,
    /// Require query flags to be exactly 0x0100
    #[serde(default)]
    pub strict_header: bool,
    #[serde(default)]
    pub security: DnsSecurityConfig,
}

impl DnsConfig {
    pub fn header_policy(&self) -> HeaderPolicy {
        if self.strict_header {
            HeaderPolicy::Strict
        } else {
            HeaderPolicy::Lenient
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            listen: default_dns_listen(),
            strict_header: false,
            security: DnsSecurityConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DnsSecurityConfig {
    /// Source IPs or CIDR ranges allowed to query (empty = everyone)
    #[serde(default)]
    pub allowed_source_ips: Vec<String>,
    #[serde(default = "default_dns_rate_limit_enabled")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_dns_max_qps")]
    pub max_qps: u32,
    /// Maximum number of clients tracked by the rate limiter
    #[serde(default = "default_dns_max_tracked_ips")]
    pub max_tracked_ips: usize,
    /// Rate limit IPv6 clients per /64
    #[serde(default = "default_dns_ipv6_subnet_rate_limit")]
    pub ipv6_subnet_rate_limit: bool,
}

fn default_dns_rate_limit_enabled() -> bool {
    true
}

fn default_dns_max_qps() -> u32 {
    20
}

fn default_dns_max_tracked_ips() -> usize {
    50000
}

fn default_dns_ipv6_subnet_rate_limit() -> bool {
    true
}

impl Default for DnsSecurityConfig {
    fn default() -> Self {
        DnsSecurityConfig {
            allowed_source_ips: vec![],
            rate_limit_enabled: default_dns_rate_limit_enabled(),
            max_qps: default_dns_max_qps(),
            max_tracked_ips: default_dns_max_tracked_ips(),
            ipv6_subnet_rate_limit: default_dns_ipv6_subnet_rate_limit(),
        }
    }
}

// ============== Logging Config ==============

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit per-query events
    #[serde(default = "default_log_queries")]
    pub log_queries: bool,
    #[serde(default)]
    pub format: LogFormat,
    /// JSON log file in addition to stdout
    #[serde(default)]
    pub file: Option<FileLoggingConfig>,
}

fn default_log_queries() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_queries: default_log_queries(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileLoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Days to keep rotated files (0 = forever)
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    /// Gzip rotated files
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file_prefix() -> String {
    "dns.log".to_string()
}

fn default_max_age_days() -> u64 {
    7
}

fn default_compress() -> bool {
    true
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        FileLoggingConfig {
            log_dir: default_log_dir(),
            file_prefix: default_log_file_prefix(),
            rotation: LogRotation::Daily,
            max_age_days: default_max_age_days(),
            compress: default_compress(),
        }
    }
}

// ============== Default Values ==============

pub fn default_dns_listen() -> String {
    "[::]:53".to_string()
}

// ============== Config Loading ==============

/// Get the directory containing the executable
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Parse a YAML document
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

/// Load configuration from an explicit path, or from `config.yaml` in the
/// working directory or next to the executable. Only the search falls back
/// to the embedded default; an explicit path must exist.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    if let Some(p) = path {
        println!("Loading config from: {}", p);
        let content = fs::read_to_string(p)?;
        return parse_config(&content);
    }

    let mut config_paths = vec![PathBuf::from("config.yaml")];
    if let Some(dir) = exe_dir() {
        config_paths.push(dir.join("config.yaml"));
    }

    for config_path in config_paths {
        if config_path.exists() {
            println!("Loading config from: {}", config_path.display());
            let content = fs::read_to_string(&config_path)?;
            return parse_config(&content);
        }
    }

    parse_config(DEFAULT_CONFIG_YAML)
}

// ============== Unit Tests ==============
