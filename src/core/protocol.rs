//! SOCKS4 / SOCKS4a handshake parsing
//!
//! Request layout:
//! - Version (1 byte, must be 4)
//! - Command (1 byte, CONNECT=1)
//! - Port (2 bytes, big-endian)
//! - IPv4 address (4 bytes)
//! - User id (NUL-terminated)
//! - Hostname (NUL-terminated, only when the address is 0.0.0.x with x != 0)
//!
//! Reply layout: 0x00, reply code, port (2 bytes), address (4 bytes).

use bytes::{Buf, BytesMut};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::lookup_host;

use crate::error::{ProxyError, Result};

/// The only protocol version accepted
pub const SOCKS_VERSION: u8 = 4;

/// Longest user id or hostname accepted, excluding the NUL terminator
pub const MAX_FIELD_LEN: usize = 255;

/// Size of the fixed part of a request: version, command, port, address
const FIXED_LEN: usize = 8;

/// SOCKS4 command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks4Cmd {
    /// TCP connect
    Connect = 1,
    /// TCP bind (recognised, never served)
    Bind = 2,
}

impl TryFrom<u8> for Socks4Cmd {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Socks4Cmd::Connect),
            2 => Ok(Socks4Cmd::Bind),
            other => Err(ProxyError::UnsupportedCommand(other)),
        }
    }
}

/// Reply codes sent back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Granted = 90,
    Failed = 91,
}

/// Where the client asked to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Plain SOCKS4 address
    Ipv4(Ipv4Addr),
    /// SOCKS4a hostname, resolved at connect time
    Hostname(String),
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Ipv4(ip) => write!(f, "{}", ip),
            Destination::Hostname(host) => write!(f, "{}", host),
        }
    }
}

impl Destination {
    /// Resolve to a socket address, preferring the first IPv4 result
    pub async fn resolve(&self, port: u16) -> Result<SocketAddr> {
        match self {
            Destination::Ipv4(ip) => Ok(SocketAddr::from((*ip, port))),
            Destination::Hostname(host) => {
                let lookup = format!("{}:{}", host, port);
                let resolve_err = |source| ProxyError::Resolve {
                    host: host.clone(),
                    source,
                };
                let addrs: Vec<SocketAddr> =
                    lookup_host(&lookup).await.map_err(resolve_err)?.collect();
                let preferred = addrs.iter().find(|a| a.is_ipv4()).or_else(|| addrs.first());
                preferred.copied().ok_or_else(|| {
                    resolve_err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no addresses found for {}", host),
                    ))
                })
            }
        }
    }
}

/// Whether raw address bytes signal the SOCKS4a hostname extension
pub fn is_hostname_extension(raw: [u8; 4]) -> bool {
    raw[0] == 0 && raw[1] == 0 && raw[2] == 0 && raw[3] != 0
}

/// Decode result for incremental parsing
#[derive(Debug)]
pub enum DecodeResult<T> {
    /// Successfully decoded, with the number of bytes consumed
    Ok(T, usize),
    /// Need more data
    NeedMoreData,
    /// Invalid data
    Invalid(ProxyError),
}

/// Parsed handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Always `SOCKS_VERSION` once decoded
    pub version: u8,
    pub command: Socks4Cmd,
    pub port: u16,
    /// Address bytes exactly as sent, echoed in the reply
    pub raw_addr: [u8; 4],
    pub user_id: Vec<u8>,
    pub destination: Destination,
}

/// Position of the first NUL at or after `start`, bounded by `MAX_FIELD_LEN`
fn find_nul(buf: &[u8], start: usize, field: &'static str) -> Result<Option<usize>> {
    let window = &buf[start..];
    match window.iter().position(|&b| b == 0) {
        Some(pos) if pos > MAX_FIELD_LEN => Err(ProxyError::Malformed(field)),
        Some(pos) => Ok(Some(start + pos)),
        None if window.len() > MAX_FIELD_LEN => Err(ProxyError::Malformed(field)),
        None => Ok(None),
    }
}

/// Validate version and command; the first two bytes decide rejection
pub fn check_header(version: u8, command: u8) -> Result<Socks4Cmd> {
    if version != SOCKS_VERSION {
        return Err(ProxyError::UnsupportedVersion(version));
    }
    match Socks4Cmd::try_from(command)? {
        Socks4Cmd::Connect => Ok(Socks4Cmd::Connect),
        Socks4Cmd::Bind => Err(ProxyError::UnsupportedCommand(command)),
    }
}

impl ProxyRequest {
    /// Decode a request from the front of `buf` without consuming it
    pub fn decode(buf: &[u8]) -> DecodeResult<Self> {
        if buf.len() < 2 {
            return DecodeResult::NeedMoreData;
        }
        let command = match check_header(buf[0], buf[1]) {
            Ok(cmd) => cmd,
            Err(e) => return DecodeResult::Invalid(e),
        };

        if buf.len() < FIXED_LEN {
            return DecodeResult::NeedMoreData;
        }
        let port = u16::from_be_bytes([buf[2], buf[3]]);
        let raw_addr = [buf[4], buf[5], buf[6], buf[7]];

        let user_end = match find_nul(buf, FIXED_LEN, "user id too long") {
            Ok(Some(end)) => end,
            Ok(None) => return DecodeResult::NeedMoreData,
            Err(e) => return DecodeResult::Invalid(e),
        };
        let user_id = buf[FIXED_LEN..user_end].to_vec();

        if !is_hostname_extension(raw_addr) {
            let request = ProxyRequest {
                version: buf[0],
                command,
                port,
                raw_addr,
                user_id,
                destination: Destination::Ipv4(Ipv4Addr::from(raw_addr)),
            };
            return DecodeResult::Ok(request, user_end + 1);
        }

        let host_start = user_end + 1;
        let host_end = match find_nul(buf, host_start, "hostname too long") {
            Ok(Some(end)) => end,
            Ok(None) => return DecodeResult::NeedMoreData,
            Err(e) => return DecodeResult::Invalid(e),
        };
        // One char per byte, as the hostname is opaque to the protocol
        let host: String = buf[host_start..host_end].iter().map(|&b| b as char).collect();

        let request = ProxyRequest {
            version: buf[0],
            command,
            port,
            raw_addr,
            user_id,
            destination: Destination::Hostname(host),
        };
        DecodeResult::Ok(request, host_end + 1)
    }

    /// Decode and consume the request from `buf`; trailing bytes stay put
    pub fn decode_from(buf: &mut BytesMut) -> DecodeResult<Self> {
        match Self::decode(buf) {
            DecodeResult::Ok(req, consumed) => {
                buf.advance(consumed);
                DecodeResult::Ok(req, consumed)
            }
            other => other,
        }
    }

    /// Reply for this request with the given outcome
    pub fn reply(&self, code: ReplyCode) -> Reply {
        Reply {
            code,
            port: self.port,
            addr: self.raw_addr,
        }
    }
}

/// Fixed-size handshake reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub code: ReplyCode,
    pub port: u16,
    pub addr: [u8; 4],
}

impl Reply {
    pub const SIZE: usize = 8;

    /// Failure reply built from whatever was parsed before the error
    pub fn failed(port: u16, addr: [u8; 4]) -> Self {
        Self {
            code: ReplyCode::Failed,
            port,
            addr,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let port = self.port.to_be_bytes();
        [
            0,
            self.code as u8,
            port[0],
            port[1],
            self.addr[0],
            self.addr[1],
            self.addr[2],
            self.addr[3],
        ]
    }
}

/// Best-effort port and address from a partial request, for failure replies
pub fn partial_fields(buf: &[u8]) -> (u16, [u8; 4]) {
    let port = if buf.len() >= 4 {
        u16::from_be_bytes([buf[2], buf[3]])
    } else {
        0
    };
    let mut addr = [0u8; 4];
    if buf.len() >= FIXED_LEN {
        addr.copy_from_slice(&buf[4..FIXED_LEN]);
    }
    (port, addr)
}

/// Read and decode a complete request from the stream
///
/// Reads continue until the request is complete. Bytes past the request
/// are left in `buf` for the caller to forward.
pub async fn read_request<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    buffer_size: usize,
) -> Result<ProxyRequest>
where
    S: AsyncRead + Unpin,
{
    let mut temp_buf = vec![0u8; buffer_size.max(FIXED_LEN)];

    loop {
        match ProxyRequest::decode_from(buf) {
            DecodeResult::Ok(req, _) => return Ok(req),
            DecodeResult::Invalid(e) => return Err(e),
            DecodeResult::NeedMoreData => {}
        }

        let n = stream.read(&mut temp_buf).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(ProxyError::Malformed("connection closed before request"));
            }
            return Err(ProxyError::Malformed("connection closed with incomplete request"));
        }
        buf.extend_from_slice(&temp_buf[..n]);
    }
}
