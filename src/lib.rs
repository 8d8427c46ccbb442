//! SOCKS4/4a relay proxy
//!
//! Architecture:
//! - `core/`: Protocol codec, relay pair, completion gate, credential sniffer
//! - `handler`: Per-connection session state machine
//! - `server_runner`: Listener setup and accept loop

pub mod config;
pub mod core;
pub mod error;
pub mod handler;
pub mod logger;
pub mod server_runner;
