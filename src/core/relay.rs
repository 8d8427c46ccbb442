//! Bidirectional relay between client and destination
//!
//! Each direction is an independent task copying through a fixed buffer.
//! Both share one completion gate; once it opens, the remaining direction
//! is cancelled and both streams are dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::gate::{CompletionGate, RelayWait};
use super::sniffer::{CredentialSniffer, ExtractedCredential};
use crate::logger::log;

/// Relay tuning for one session
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Buffer size per direction
    pub buffer_size: usize,
    /// Read timeout on the client side
    pub client_read_timeout: Duration,
    /// Read timeout on the destination side
    pub destination_read_timeout: Duration,
    /// Teardown policy
    pub wait: RelayWait,
}

/// Relay direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToDestination,
    DestinationToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ClientToDestination => write!(f, "client->destination"),
            Direction::DestinationToClient => write!(f, "destination->client"),
        }
    }
}

/// Why a direction stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpEnd {
    /// Source reached end of stream
    #[default]
    Eof,
    /// No data within the read timeout
    Timeout,
    /// Source read failed
    ReadError,
    /// Sink write failed
    WriteError,
    /// Sink accepted nothing within the read timeout
    WriteTimeout,
    /// The other direction finished first and the session tore down
    Cancelled,
}

/// What one direction did
#[derive(Debug, Default)]
struct PumpReport {
    bytes: u64,
    end: PumpEnd,
    credential: Option<ExtractedCredential>,
}

/// Result of a relay pair
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Bytes forwarded client -> destination
    pub client_to_destination: u64,
    /// Bytes forwarded destination -> client
    pub destination_to_client: u64,
    /// How each direction ended
    pub upstream_end: PumpEnd,
    pub downstream_end: PumpEnd,
    /// Credential found on the client -> destination direction
    pub credential: Option<ExtractedCredential>,
}

/// Parameters for one pump
struct Pump {
    direction: Direction,
    buffer_size: usize,
    read_timeout: Duration,
    sniffer: Option<CredentialSniffer>,
    gate: Arc<CompletionGate>,
    cancel: CancellationToken,
}

impl Pump {
    async fn run<R, W>(mut self, mut source: R, mut sink: W) -> PumpReport
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let mut bytes = 0u64;

        let end = loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break PumpEnd::Cancelled,
                r = tokio::time::timeout(self.read_timeout, source.read(&mut buf)) => r,
            };
            let n = match read {
                Err(_) => break PumpEnd::Timeout,
                Ok(Ok(0)) => break PumpEnd::Eof,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    log::trace!(direction = %self.direction, error = %e, "Relay read error");
                    break PumpEnd::ReadError;
                }
            };

            // Writes share the read timeout
            let write = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break PumpEnd::Cancelled,
                r = tokio::time::timeout(self.read_timeout, async {
                    sink.write_all(&buf[..n]).await?;
                    sink.flush().await
                }) => r,
            };
            match write {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::trace!(direction = %self.direction, error = %e, "Relay write error");
                    break PumpEnd::WriteError;
                }
                Err(_) => break PumpEnd::WriteTimeout,
            }

            bytes += n as u64;
            if let Some(sniffer) = self.sniffer.as_mut() {
                sniffer.observe(&buf[..n]);
            }
        };

        // Propagate EOF so the peer sees the half-close
        if end != PumpEnd::Cancelled {
            let _ = sink.shutdown().await;
        }

        log::debug!(direction = %self.direction, bytes = bytes, end = ?end, "Relay direction finished");
        self.gate.count_down();

        PumpReport {
            bytes,
            end,
            credential: self.sniffer.as_ref().and_then(CredentialSniffer::finish),
        }
    }
}

async fn join_pump(handle: tokio::task::JoinHandle<PumpReport>, direction: Direction) -> PumpReport {
    match handle.await {
        Ok(report) => report,
        Err(e) => {
            log::warn!(direction = %direction, error = %e, "Relay task failed");
            PumpReport {
                end: PumpEnd::ReadError,
                ..PumpReport::default()
            }
        }
    }
}

/// Relay bytes both ways until the gate opens, then tear down
///
/// `sniffer`, when given, observes the client -> destination direction.
pub async fn relay_pair<C, D>(
    client: C,
    destination: D,
    options: RelayOptions,
    sniffer: Option<CredentialSniffer>,
) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    D: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (dest_read, dest_write) = tokio::io::split(destination);

    let gate = Arc::new(CompletionGate::new(options.wait.count()));
    let cancel = CancellationToken::new();

    let upstream = Pump {
        direction: Direction::ClientToDestination,
        buffer_size: options.buffer_size,
        read_timeout: options.client_read_timeout,
        sniffer,
        gate: Arc::clone(&gate),
        cancel: cancel.clone(),
    };
    let downstream = Pump {
        direction: Direction::DestinationToClient,
        buffer_size: options.buffer_size,
        read_timeout: options.destination_read_timeout,
        sniffer: None,
        gate: Arc::clone(&gate),
        cancel: cancel.clone(),
    };

    let upstream = tokio::spawn(upstream.run(client_read, dest_write));
    let downstream = tokio::spawn(downstream.run(dest_read, client_write));

    gate.wait().await;
    cancel.cancel();

    let up = join_pump(upstream, Direction::ClientToDestination).await;
    let down = join_pump(downstream, Direction::DestinationToClient).await;

    RelayStats {
        client_to_destination: up.bytes,
        destination_to_client: down.bytes,
        upstream_end: up.end,
        downstream_end: down.end,
        credential: up.credential,
    }
}
