//! Lantern - A minimal authoritative DNS responder
//!
//! Serves A and AAAA answers for a static table of names over UDP.
//! Supports both IPv4 and IPv6.

use lantern::config::load_config;
use lantern::dns::{build_dispatcher, run_dns_server};
use lantern::logging;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();

    // Parse command line arguments
    let mut config_path: Option<&str> = None;
    let mut cli_listen_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config_path = Some(path.as_str()),
                    None => {
                        eprintln!("Missing value for {}", args[i - 1]);
                        print_usage(&args[0]);
                        std::process::exit(1);
                    }
                }
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            arg if !arg.starts_with('-') && cli_listen_addr.is_none() => {
                cli_listen_addr = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // Load config from file
    let mut config = load_config(config_path)?;

    // CLI arguments override config file
    if let Some(addr) = cli_listen_addr {
        config.dns.listen = addr;
    }

    // Initialize logging system
    let _log_guard = logging::init_logging(&config.logging)?;
    logging::spawn_log_maintenance(&config.logging);

    tracing::debug!(config = ?config, "Configuration loaded");

    // Encode every record up front; a bad entry stops startup
    let dispatcher = Arc::new(build_dispatcher(
        &config.records,
        config.dns.header_policy(),
    )?);
    if dispatcher.store().is_empty() {
        tracing::warn!("No records configured, every query will be dropped");
    }

    let listen_addr: SocketAddr = config.dns.listen.parse()?;
    println!("DNS server listening on {}", listen_addr);
    for entry in dispatcher.store().entries() {
        let a = entry.ipv4().map(|ip| ip.to_string()).unwrap_or_else(|| "-".into());
        let aaaa = entry.ipv6().map(|ip| ip.to_string()).unwrap_or_else(|| "-".into());
        println!("  {}  A {}  AAAA {}", entry.name(), a, aaaa);
    }
    if !config.dns.security.allowed_source_ips.is_empty() {
        println!(
            "Source IP allowlist: {:?}",
            config.dns.security.allowed_source_ips
        );
    }
    if config.dns.security.rate_limit_enabled {
        println!(
            "Rate limit: {} queries/s per client",
            config.dns.security.max_qps
        );
    }

    run_dns_server(
        listen_addr,
        dispatcher,
        config.dns.security.clone(),
        config.logging.log_queries,
    )
    .await
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [listen_addr] [options]", program);
    eprintln!();
    eprintln!("Minimal authoritative DNS responder for a static set of A/AAAA records.");
    eprintln!("Supports both IPv4 and IPv6.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  listen_addr             Address to listen on (e.g., 0.0.0.0:53 or [::]:53)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <path>     Load config from YAML file");
    eprintln!("  -h, --help              Show this help message");
    eprintln!();
    eprintln!("Config file (config.yaml):");
    eprintln!("  dns:");
    eprintln!("    listen: \"[::]:53\"");
    eprintln!("  records:");
    eprintln!("    - name: example.com");
    eprintln!("      a: 127.0.0.1");
    eprintln!("      aaaa: \"::1\"");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} 127.0.0.1:5353                     # Custom port", program);
    eprintln!("  {} --config config.yaml               # Use config file", program);
    eprintln!();
    eprintln!("Client usage:");
    eprintln!("  dig @127.0.0.1 -p 5353 example.com A");
}
