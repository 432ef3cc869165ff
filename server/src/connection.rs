//! Per-peer transport: framing of inbound bytes, queued outbound writes, and
//! idempotent teardown
//!
//! Each accepted socket is split into a read half driven by [`read_loop`] and
//! a write half driven by [`write_loop`]. The [`Connection`] handle itself is
//! cheap to share: handlers queue outbound envelopes on it without ever
//! touching the socket, so no state lock is held across network I/O.

use crate::network::GameServer;
use log::{debug, warn};
use shared::{decode, encode, Envelope, MessageFramer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, Notify};

/// Outbound envelopes buffered per connection before the peer counts as a
/// slow consumer and is dropped.
pub const OUTBOUND_QUEUE_SIZE: usize = 64;

const READ_BUFFER_SIZE: usize = 4096;

/// Handle to one client's transport.
pub struct Connection {
    player_id: String,
    addr: SocketAddr,
    outbound: mpsc::Sender<Envelope>,
    connected: AtomicBool,
    closed: Notify,
}

impl Connection {
    pub fn new(player_id: String, addr: SocketAddr, outbound: mpsc::Sender<Envelope>) -> Self {
        Self {
            player_id,
            addr,
            outbound,
            connected: AtomicBool::new(true),
            closed: Notify::new(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queues one envelope for transmission.
    ///
    /// Returns false when the peer should be dropped: the connection is
    /// already closed, or its outbound queue is full because the peer is not
    /// draining broadcasts fast enough.
    pub fn send(&self, envelope: Envelope) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.outbound.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for {}, dropping slow consumer",
                    self.player_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Marks the connection closed and wakes its reader and writer tasks.
    ///
    /// Idempotent: returns true only for the call that actually closed it.
    /// Safe to invoke from the read loop (EOF/error), the write loop (write
    /// failure), or externally (server shutdown).
    pub fn disconnect(&self) -> bool {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.closed.notify_waiters();
            true
        } else {
            false
        }
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        let notified = self.closed.notified();
        tokio::pin!(notified);
        // Register before re-checking the flag so a concurrent disconnect
        // cannot slip between the check and the wait.
        notified.as_mut().enable();
        if !self.is_connected() {
            return;
        }
        notified.await;
    }
}

/// Reads raw bytes, reassembles newline-delimited frames, and dispatches
/// every decoded message to the server.
///
/// Exits on orderly EOF (zero-length read), a transport error, or an
/// external disconnect, then removes the client from the server exactly
/// once. A frame that fails to decode is logged and skipped; the connection
/// stays up.
pub async fn read_loop(server: Arc<GameServer>, conn: Arc<Connection>, mut reader: OwnedReadHalf) {
    let mut framer = MessageFramer::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = conn.closed() => break,
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    debug!("{} closed the connection", conn.player_id());
                    break;
                }
                Ok(n) => {
                    framer.extend(&buf[..n]);
                    while let Some(frame) = framer.next_frame() {
                        if frame.iter().all(|b| b.is_ascii_whitespace()) {
                            continue;
                        }
                        match decode(&frame) {
                            Ok(envelope) => server.dispatch(conn.player_id(), envelope).await,
                            Err(e) => {
                                warn!("Invalid message from {}: {}", conn.player_id(), e);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Read error from {}: {}", conn.player_id(), e);
                    break;
                }
            }
        }
    }

    conn.disconnect();
    server.remove_client(conn.player_id()).await;
}

/// Drains the outbound queue, serializing each envelope and writing it with
/// its newline terminator. A write failure is connection-fatal.
pub async fn write_loop(
    conn: Arc<Connection>,
    mut outbound: mpsc::Receiver<Envelope>,
    mut writer: OwnedWriteHalf,
) {
    loop {
        tokio::select! {
            _ = conn.closed() => break,
            maybe = outbound.recv() => match maybe {
                Some(envelope) => {
                    let line = match encode(&envelope) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Failed to serialize envelope for {}: {}", conn.player_id(), e);
                            continue;
                        }
                    };
                    if let Err(e) = writer.write_all(&line).await {
                        warn!("Write error to {}: {}", conn.player_id(), e);
                        break;
                    }
                }
                None => break,
            }
        }
    }

    conn.disconnect();
    let _ = writer.shutdown().await;
}
