//! SOCKS4/4a relay proxy binary

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use std::sync::Arc;

use socks4a_proxy::config::{CliArgs, ConnConfig};
use socks4a_proxy::core::Server;
use socks4a_proxy::logger::{self, log};
use socks4a_proxy::server_runner;

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                log::info!("SIGINT received, shutting down...");
            }
            _ = sigterm.recv() => {
                log::info!("SIGTERM received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        log::info!("Shutdown signal received...");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = CliArgs::parse_args();
    cli.validate()?;

    // Initialize logger
    logger::init_logger(&cli.log_mode);

    let listen_addr = cli.listen_addr();
    log::info!(
        address = %listen_addr,
        version = env!("CARGO_PKG_VERSION"),
        "Starting SOCKS4/4a proxy"
    );

    // Build connection config from CLI args
    let conn_config = ConnConfig::from_cli(&cli);
    let server = Arc::new(Server::builder().conn_config(conn_config).build()?);

    let listener = server_runner::bind_listener(&listen_addr, conn_config.tcp_backlog)?;

    tokio::select! {
        result = server_runner::run_server(server, listener) => result,
        signal = shutdown_signal() => {
            signal?;
            log::info!("Server stopped");
            Ok(())
        }
    }
}
