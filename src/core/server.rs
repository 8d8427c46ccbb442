//! Core proxy server value
//!
//! Holds the configuration and hooks every session reads from.

use std::sync::Arc;

use super::hooks::{CredentialSink, LogCredentialSink};
use crate::config::ConnConfig;
use crate::error::{ProxyError, Result};

/// Core proxy server
pub struct Server {
    /// Connection performance configuration
    pub conn_config: ConnConfig,
    /// Where captured credentials go
    pub credential_sink: Arc<dyn CredentialSink>,
}

impl Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }
}

/// Builder for constructing a Server
#[derive(Default)]
pub struct ServerBuilder {
    conn_config: Option<ConnConfig>,
    credential_sink: Option<Arc<dyn CredentialSink>>,
}

impl ServerBuilder {
    /// Create a new server builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connection configuration
    pub fn conn_config(mut self, config: ConnConfig) -> Self {
        self.conn_config = Some(config);
        self
    }

    /// Set credential sink
    pub fn credential_sink(mut self, sink: Arc<dyn CredentialSink>) -> Self {
        self.credential_sink = Some(sink);
        self
    }

    /// Build the server
    ///
    /// Fails if conn_config is not set. The sink defaults to logging.
    pub fn build(self) -> Result<Server> {
        let conn_config = self
            .conn_config
            .ok_or_else(|| ProxyError::Config("conn_config is required".to_string()))?;
        if conn_config.buffer_size == 0 {
            return Err(ProxyError::Config("buffer_size must be greater than 0".to_string()));
        }
        Ok(Server {
            conn_config,
            credential_sink: self
                .credential_sink
                .unwrap_or_else(|| Arc::new(LogCredentialSink)),
        })
    }
}
