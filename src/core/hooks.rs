//! Hook traits for extensibility
//!
//! Lets the caller decide where captured credentials end up.

use std::net::SocketAddr;

use super::sniffer::ExtractedCredential;
use crate::logger::log;

/// Receives credentials captured by the sniffer
pub trait CredentialSink: Send + Sync {
    /// Called once per relay direction that produced a match
    fn record(&self, peer: SocketAddr, credential: &ExtractedCredential);
}

/// Default sink: one line on the diagnostic log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCredentialSink;

impl CredentialSink for LogCredentialSink {
    fn record(&self, peer: SocketAddr, credential: &ExtractedCredential) {
        log::credential(&peer.to_string(), &credential.to_string());
    }
}
