//!
//! habgate server binary
//! ---------------------
//! Command-line entry point for the authorization gateway. The listen port and
//! the openHAB backend come from flags or the environment; every ACL tunable is
//! read from the environment by `GatewayConfig::from_env`.

use anyhow::Result;
use std::env;

use habgate::config::GatewayConfig;

const DEFAULT_PORT: u16 = 8090;
const DEFAULT_HOST: &str = "http://127.0.0.1:8080";

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

/// Value following the first of `flags` present in `args`.
fn arg_value<'a>(args: &'a [String], flags: &[&str]) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if flags.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("habgate Server\n\nUSAGE:\n  habgate_server [--port N] [--host URL]\n\nOPTIONS:\n  -p, --port N      Listen port (env: PORT, default 8090)\n  -o, --host URL    openHAB backend (env: HOST, default http://127.0.0.1:8080)\n\nACL tunables (env): ADMIN_OU, EVERYONE_OU, ACL_PREFIX, ORG_SEPARATOR, SITEMAP_PREFIX,\n  ORG_DELIMITER, CACHE_TIME, CACHE_TIME_ACL, SITEMAPS_DISABLE, HOME_SEPARATOR, CACHE_SWEEP_MS\n");
        return Ok(());
    }

    // CLI arguments override environment
    let port = arg_value(&args, &["--port", "-p"])
        .and_then(|v| v.parse::<u16>().ok())
        .or_else(|| parse_port_env("PORT"))
        .unwrap_or(DEFAULT_PORT);
    let host = arg_value(&args, &["--host", "-o"])
        .map(str::to_string)
        .or_else(|| env::var("HOST").ok().filter(|h| !h.is_empty()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let config = GatewayConfig::from_env();
    println!("habgate starting: port={}, backend={}", port, host);
    tracing::info!("Using port={}, backend={}", port, host);
    habgate::server::run(port, &host, config).await
}
