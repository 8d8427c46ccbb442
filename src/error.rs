use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Unified error type for a proxy session
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error while reading the request or writing the reply
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request carried a version other than 4
    #[error("Unsupported SOCKS protocol version (got {0})")]
    UnsupportedVersion(u8),

    /// Request carried a command other than CONNECT
    #[error("Unsupported SOCKS command (got {0})")]
    UnsupportedCommand(u8),

    /// Request framing is broken (oversized field, early EOF, ...)
    #[error("Malformed request: {0}")]
    Malformed(&'static str),

    /// Handshake did not arrive in time
    #[error("Request read timeout")]
    RequestTimeout,

    /// Hostname supplied under the 4a extension did not resolve
    #[error("Unable to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    /// Destination refused or was unreachable
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Destination did not accept within the connect timeout
    #[error("Connect to {0} timed out")]
    ConnectTimeout(SocketAddr),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Whether the error came from a bad version/command byte
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ProxyError::UnsupportedVersion(_) | ProxyError::UnsupportedCommand(_)
        )
    }

    /// Whether the error happened while reaching the destination
    pub fn is_destination(&self) -> bool {
        matches!(
            self,
            ProxyError::Resolve { .. } | ProxyError::Connect { .. } | ProxyError::ConnectTimeout(_)
        )
    }
}
