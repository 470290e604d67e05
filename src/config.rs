//! Server configuration
//!
//! `ServerConfig` is the plain runtime configuration; `ServerArgs` is the
//! command line (with environment fallback) that produces it.

use std::time::Duration;

use clap::Parser;

use crate::codec::MAX_LINE_LENGTH;
use crate::delivery::DELIVERY_CAPACITY;

/// Default listen IP
pub const DEFAULT_IP: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8888;

/// Default idle window before a silent session is kicked
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-session outbound queue capacity
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Time allowed for a closing session to flush its queued lines
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Runtime configuration shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    pub idle_timeout: Duration,
    pub outbound_capacity: usize,
    pub delivery_capacity: usize,
    pub max_line_length: usize,
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// `ip:port` to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            delivery_capacity: DELIVERY_CAPACITY,
            max_line_length: MAX_LINE_LENGTH,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Line-delimited chat server
#[derive(Debug, Parser)]
#[command(name = "im_server", version, about)]
pub struct ServerArgs {
    /// IP address to listen on
    #[arg(long, env = "IM_SERVER_IP", default_value = DEFAULT_IP)]
    pub ip: String,

    /// Port to listen on
    #[arg(long, env = "IM_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds of silence before a client is kicked
    #[arg(
        long,
        env = "IM_SERVER_IDLE_TIMEOUT",
        default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub idle_timeout: u64,

    /// Lines buffered per client before a slow client is disconnected
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    pub outbound_capacity: usize,
}

impl ServerArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            ip: self.ip,
            port: self.port,
            idle_timeout: Duration::from_secs(self.idle_timeout),
            outbound_capacity: self.outbound_capacity,
            ..ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8888");
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert_eq!(config.max_line_length, 4096);
    }

    #[test]
    fn test_args_into_config() {
        let args = ServerArgs::try_parse_from([
            "im_server",
            "--ip",
            "0.0.0.0",
            "--port",
            "9000",
            "--idle-timeout",
            "30",
        ])
        .unwrap();
        let config = args.into_config();

        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
    }

    #[test]
    fn test_idle_timeout_bounds() {
        assert!(ServerArgs::try_parse_from(["im_server", "--idle-timeout", "0"]).is_err());

        let args = ServerArgs::try_parse_from([
            "im_server",
            "--idle-timeout",
            "18446744073709551615",
        ])
        .unwrap();
        assert_eq!(args.into_config().idle_timeout, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(ServerArgs::try_parse_from(["im_server", "--port", "99999"]).is_err());
    }
}
