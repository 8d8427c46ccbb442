//! Server startup and accept loop
//!
//! This module handles listener setup and the main connection accept loop.

use crate::core::Server;
use crate::handler::{process_connection, SessionOutcome};
use crate::logger::log;

use anyhow::{anyhow, Result};
use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// TCP keepalive interval on accepted client sockets.
/// Dead peers are detected in ~45s (3 probes x 15s).
const TCP_KEEPALIVE_SECS: u64 = 15;

/// Bind a TCP listener with SO_REUSEADDR and an explicit backlog
pub fn bind_listener(addr: &str, backlog: i32) -> Result<TcpListener> {
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow!("Invalid listen address '{}': {}", addr, e))?;
    let socket = socket2::Socket::new(
        match socket_addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    // Allow immediate rebind after restart (skip TIME_WAIT)
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(backlog)?;

    Ok(TcpListener::from_std(socket.into())?)
}

fn configure_client_socket(server: &Server, stream: &TcpStream) {
    if server.conn_config.tcp_nodelay {
        let _ = stream.set_nodelay(true);
    }
    let keepalive = TcpKeepalive::new()
        .with_time(std::time::Duration::from_secs(TCP_KEEPALIVE_SECS))
        .with_interval(std::time::Duration::from_secs(TCP_KEEPALIVE_SECS));
    let _ = SockRef::from(stream).set_tcp_keepalive(&keepalive);
}

async fn handle_client(server: Arc<Server>, stream: TcpStream, peer: SocketAddr) {
    configure_client_socket(&server, &stream);
    let peer_str = peer.to_string();

    match process_connection(&server, stream, peer).await {
        SessionOutcome::Relayed(stats) => {
            log::debug!(
                peer = %peer_str,
                up = stats.client_to_destination,
                down = stats.destination_to_client,
                "Session finished"
            );
        }
        SessionOutcome::Rejected(e)
        | SessionOutcome::ConnectFailed(e)
        | SessionOutcome::Aborted(e) => {
            log::debug!(peer = %peer_str, error = %e, "Session ended early");
        }
    }
    log::connection(&peer_str, "closed");
}

/// Run the server accept loop
///
/// Never returns on its own; accept errors are logged and the loop goes on.
pub async fn run_server(server: Arc<Server>, listener: TcpListener) -> Result<()> {
    // Connection limiter: 0 = unlimited
    let conn_limiter = if server.conn_config.max_connections > 0 {
        Some(Arc::new(Semaphore::new(server.conn_config.max_connections)))
    } else {
        None
    };

    log::info!(
        address = %listener.local_addr()?,
        max_connections = server.conn_config.max_connections,
        relay_wait = %server.conn_config.relay_wait,
        sniff_port = server.conn_config.sniff_port,
        "Server started"
    );

    loop {
        // Acquire connection permit before accepting (backpressure when at limit)
        let permit = match conn_limiter {
            Some(ref limiter) => match Arc::clone(limiter).acquire_owned().await {
                Ok(permit) => Some(permit),
                // Semaphore closed, shutting down
                Err(_) => break,
            },
            None => None,
        };

        match listener.accept().await {
            Ok((stream, peer)) => {
                log::connection(&peer.to_string(), "new");
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    // Hold permit for the lifetime of this connection
                    let _permit = permit;
                    handle_client(server, stream, peer).await;
                });
            }
            Err(e) => {
                log::error!(error = %e, "Failed to accept connection");
            }
        }
    }

    Ok(())
}
