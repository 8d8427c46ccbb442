//! Core proxy module
//!
//! - Protocol parsing (SOCKS4 / SOCKS4a)
//! - Completion gate and bidirectional relay
//! - Credential sniffing
//! - Hook traits for extensibility

mod gate;
pub mod hooks;
mod protocol;
mod relay;
mod server;
mod sniffer;

pub use gate::{CompletionGate, RelayWait};
pub use protocol::{
    check_header, is_hostname_extension, partial_fields, read_request, DecodeResult, Destination,
    ProxyRequest, Reply, ReplyCode, Socks4Cmd, MAX_FIELD_LEN, SOCKS_VERSION,
};
pub use relay::{relay_pair, Direction, PumpEnd, RelayOptions, RelayStats};
pub use server::{Server, ServerBuilder};
pub use sniffer::{extract_credential, CredentialSniffer, ExtractedCredential};
