//! Configuration module for the SOCKS4/4a proxy
//!
//! CLI argument parsing with environment variable support, plus the
//! runtime connection settings derived from it.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use crate::core::RelayWait;

/// Parse duration string (e.g., "5s", "2m") or plain seconds
fn parse_duration(s: &str) -> Result<Duration, String> {
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }
    s.parse::<u64>().map(Duration::from_secs).map_err(|_| {
        format!(
            "Invalid duration '{}'. Use formats like '5s', '2m' or plain seconds",
            s
        )
    })
}

fn parse_relay_wait(s: &str) -> Result<RelayWait, String> {
    s.parse()
}

/// CLI arguments for the proxy
///
/// Supports environment variables with SOCKS4A_PROXY_ prefix
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "SOCKS4/4a relay proxy with HTTP Basic credential capture"
)]
#[command(rename_all = "snake_case")]
pub struct CliArgs {
    /// Address to listen on
    #[arg(long, env = "SOCKS4A_PROXY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SOCKS4A_PROXY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum concurrent sessions (0 = unlimited)
    #[arg(long, env = "SOCKS4A_PROXY_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: usize,

    /// Log mode: trace, debug, info, warn, error
    #[arg(long, env = "SOCKS4A_PROXY_LOG_MODE", default_value = "info")]
    pub log_mode: String,

    /// Destination port whose clear-text traffic is inspected for Basic credentials
    #[arg(long, env = "SOCKS4A_PROXY_SNIFF_PORT", default_value_t = 80)]
    pub sniff_port: u16,

    /// Bytes of client traffic kept for credential matching
    #[arg(long, env = "SOCKS4A_PROXY_SNIFF_LIMIT", default_value_t = 64 * 1024)]
    pub sniff_limit: usize,

    /// Tear down after the first relay direction ends ("first") or after both ("both")
    #[arg(long, env = "SOCKS4A_PROXY_RELAY_WAIT", default_value = "first", value_parser = parse_relay_wait)]
    pub relay_wait: RelayWait,

    // ==================== Performance Tuning ====================
    /// Destination connect timeout
    #[arg(long, env = "SOCKS4A_PROXY_CONNECT_TIMEOUT", default_value = "5s", value_parser = parse_duration, help_heading = "Performance")]
    pub connect_timeout: Duration,

    /// Timeout for receiving the complete handshake
    #[arg(long, env = "SOCKS4A_PROXY_REQUEST_TIMEOUT", default_value = "5s", value_parser = parse_duration, help_heading = "Performance")]
    pub request_timeout: Duration,

    /// Read timeout on the client side while relaying
    #[arg(long, env = "SOCKS4A_PROXY_CLIENT_READ_TIMEOUT", default_value = "5s", value_parser = parse_duration, help_heading = "Performance")]
    pub client_read_timeout: Duration,

    /// Read timeout on the destination side while relaying
    #[arg(long, env = "SOCKS4A_PROXY_DESTINATION_READ_TIMEOUT", default_value = "50s", value_parser = parse_duration, help_heading = "Performance")]
    pub destination_read_timeout: Duration,

    /// Relay buffer size per direction in bytes
    #[arg(long, env = "SOCKS4A_PROXY_BUFFER_SIZE", default_value_t = 1024, help_heading = "Performance")]
    pub buffer_size: usize,

    /// TCP listen backlog
    #[arg(
        long,
        env = "SOCKS4A_PROXY_TCP_BACKLOG",
        default_value_t = 1024,
        help_heading = "Performance"
    )]
    pub tcp_backlog: i32,

    /// Enable TCP_NODELAY on both legs
    #[arg(
        long,
        env = "SOCKS4A_PROXY_TCP_NODELAY",
        default_value_t = true,
        help_heading = "Performance"
    )]
    pub tcp_nodelay: bool,
}

impl CliArgs {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the CLI arguments
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(anyhow!("listen host is required"));
        }
        if self.buffer_size == 0 {
            return Err(anyhow!("buffer_size must be greater than 0"));
        }
        if self.sniff_limit == 0 {
            return Err(anyhow!("sniff_limit must be greater than 0"));
        }
        if self.tcp_backlog <= 0 {
            return Err(anyhow!("tcp_backlog must be greater than 0"));
        }

        let timeouts = [
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
            ("client_read_timeout", self.client_read_timeout),
            ("destination_read_timeout", self.destination_read_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(anyhow!("{} must be greater than 0", name));
            }
        }

        Ok(())
    }

    /// Listen address as "host:port"
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Connection configuration handed to the core
#[derive(Debug, Clone, Copy)]
pub struct ConnConfig {
    /// Destination connect timeout
    pub connect_timeout: Duration,
    /// Handshake read ceiling
    pub request_timeout: Duration,
    /// Client-side read timeout while relaying
    pub client_read_timeout: Duration,
    /// Destination-side read timeout while relaying
    pub destination_read_timeout: Duration,
    /// Relay buffer size per direction
    pub buffer_size: usize,
    /// Destination port watched by the credential sniffer
    pub sniff_port: u16,
    /// Sniffer accumulation cap
    pub sniff_limit: usize,
    /// Teardown policy for the relay pair
    pub relay_wait: RelayWait,
    /// Maximum concurrent sessions (0 = unlimited)
    pub max_connections: usize,
    /// TCP listen backlog
    pub tcp_backlog: i32,
    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,
}

impl ConnConfig {
    /// Create from CLI args
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self {
            connect_timeout: cli.connect_timeout,
            request_timeout: cli.request_timeout,
            client_read_timeout: cli.client_read_timeout,
            destination_read_timeout: cli.destination_read_timeout,
            buffer_size: cli.buffer_size,
            sniff_port: cli.sniff_port,
            sniff_limit: cli.sniff_limit,
            relay_wait: cli.relay_wait,
            max_connections: cli.max_connections,
            tcp_backlog: cli.tcp_backlog,
            tcp_nodelay: cli.tcp_nodelay,
        }
    }
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            client_read_timeout: Duration::from_secs(5),
            destination_read_timeout: Duration::from_secs(50),
            buffer_size: 1024,
            sniff_port: 80,
            sniff_limit: 64 * 1024,
            relay_wait: RelayWait::FirstFinisher,
            max_connections: 20,
            tcp_backlog: 1024,
            tcp_nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let mut argv = vec!["socks4a-proxy"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn test_parse_duration_humantime() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_duration_plain_seconds() {
        assert_eq!(parse_duration("50").unwrap(), Duration::from_secs(50));
    }

    #[test]
    fn test_parse_duration_invalid() {
        let err = parse_duration("soon").unwrap_err();
        assert!(err.contains("Invalid duration"));
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let cli = parse(&[]);
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.max_connections, 20);
        assert_eq!(cli.buffer_size, 1024);
        assert_eq!(cli.sniff_port, 80);
        assert_eq!(cli.connect_timeout, Duration::from_secs(5));
        assert_eq!(cli.client_read_timeout, Duration::from_secs(5));
        assert_eq!(cli.destination_read_timeout, Duration::from_secs(50));
        assert_eq!(cli.relay_wait, RelayWait::FirstFinisher);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_relay_wait_flag() {
        let cli = parse(&["--relay_wait", "both"]);
        assert_eq!(cli.relay_wait, RelayWait::BothDirections);
        assert!(CliArgs::try_parse_from(["socks4a-proxy", "--relay_wait", "never"]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let cli = parse(&["--buffer_size", "0"]);
        let err = cli.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_size"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let cli = parse(&["--connect_timeout", "0"]);
        let err = cli.validate().unwrap_err();
        assert!(err.to_string().contains("connect_timeout"));
    }

    #[test]
    fn test_listen_addr() {
        let cli = parse(&["--host", "127.0.0.1", "--port", "1080"]);
        assert_eq!(cli.listen_addr(), "127.0.0.1:1080");
        let cli = parse(&["--host", "::1", "--port", "1080"]);
        assert_eq!(cli.listen_addr(), "[::1]:1080");
    }

    #[test]
    fn test_conn_config_from_cli() {
        let cli = parse(&["--sniff_port", "8000", "--buffer_size", "4096"]);
        let conf = ConnConfig::from_cli(&cli);
        assert_eq!(conf.sniff_port, 8000);
        assert_eq!(conf.buffer_size, 4096);
        assert_eq!(conf.max_connections, 20);
    }
}
