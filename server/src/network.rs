//! Server lifecycle, identity assignment, message dispatch, and broadcast
//! fan-out
//!
//! One [`GameServer`] owns the single arena room and the registry of live
//! connections. Both sit behind `RwLock`s inside an `Arc`, shared by the
//! accept loop and every connection task. Lock rule: take the room lock
//! before touching any player entry, and never hold either lock across a
//! network write. Handlers collect what they need under the lock, release
//! it, then queue outbound messages.

use crate::arena::ArenaRoom;
use crate::connection::{self, Connection, OUTBOUND_QUEUE_SIZE};
use log::{debug, error, info};
use shared::{Envelope, Message, PlayerMoveData, SpellCastData, ARENA_ID};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify, RwLock};

/// The authoritative arena server.
pub struct GameServer {
    arena: RwLock<ArenaRoom>,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    next_player_id: AtomicU32,
    running: AtomicBool,
    shutdown: Notify,
}

impl GameServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            arena: RwLock::new(ArenaRoom::new(ARENA_ID)),
            connections: RwLock::new(HashMap::new()),
            next_player_id: AtomicU32::new(1),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    /// Binds the listening socket and spawns the accept loop.
    ///
    /// Returns the bound address so callers (and tests) can use port 0 for
    /// an ephemeral port. A bind failure is server-fatal: the error is
    /// returned and nothing runs.
    pub async fn start(
        self: &Arc<Self>,
        addr: &str,
    ) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        info!("Server listening on {}", local_addr);

        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.accept_loop(listener).await;
        });

        Ok(local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops accepting and disconnects every registered client.
    ///
    /// Idempotent, and safe to call from the Ctrl-C path while the accept
    /// loop is live: the loop observes the flag or the wakeup, exits, and
    /// drops the listener.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping server");
        self.shutdown.notify_waiters();

        let conns: Vec<Arc<Connection>> =
            self.connections.read().await.values().cloned().collect();
        for conn in conns {
            conn.disconnect();
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let shutdown = self.shutdown.notified();
            tokio::pin!(shutdown);
            // Register before re-checking the flag so stop() cannot race
            // between the check and the accept await.
            shutdown.as_mut().enable();
            if !self.is_running() {
                break;
            }

            tokio::select! {
                _ = shutdown => break,
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.register_client(stream, addr).await,
                    Err(e) => {
                        if self.is_running() {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
        info!("Accept loop stopped");
    }

    /// Assigns a fresh player id, registers the connection, and spawns its
    /// reader and writer tasks.
    async fn register_client(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let player_id = format!(
            "player_{}",
            self.next_player_id.fetch_add(1, Ordering::SeqCst)
        );
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let conn = Arc::new(Connection::new(player_id.clone(), addr, tx));

        let total = {
            let mut conns = self.connections.write().await;
            conns.insert(player_id.clone(), Arc::clone(&conn));
            conns.len()
        };
        info!("{} connected from {} ({} total)", player_id, addr, total);

        tokio::spawn(connection::write_loop(Arc::clone(&conn), rx, writer));
        tokio::spawn(connection::read_loop(Arc::clone(self), conn, reader));
    }

    /// Routes one inbound message to its handler.
    pub async fn dispatch(&self, player_id: &str, envelope: Envelope) {
        match envelope.message {
            Message::JoinArena => self.handle_join(player_id).await,
            Message::PlayerMove(data) => self.handle_move(player_id, data).await,
            Message::CastSpell(data) => self.handle_cast(player_id, data).await,
            // Server-to-client kinds arriving inbound are not an error,
            // just noise from a confused client.
            other => {
                debug!(
                    "Ignoring unexpected {} message from {}",
                    other.kind(),
                    player_id
                );
            }
        }
    }

    /// Seats the player, replies with the full arena snapshot, and announces
    /// them to everyone else. A second JoinArena from a seated player is a
    /// no-op and keeps their original spawn.
    async fn handle_join(&self, player_id: &str) {
        let seated = {
            let mut arena = self.arena.write().await;
            if arena.contains(player_id) {
                debug!("{} sent JoinArena while already seated", player_id);
                None
            } else {
                let joined = arena.add_player(player_id);
                Some((joined, arena.state_snapshot()))
            }
        };

        let Some((joined, snapshot)) = seated else {
            return;
        };
        info!("{} joined the arena", player_id);

        self.send_to(player_id, Message::ArenaState(snapshot)).await;
        self.broadcast_except(player_id, Message::PlayerJoined(joined))
            .await;
    }

    /// Stores the reported position (clamped into bounds) and relays the
    /// payload to every other player. The server trusts client-reported
    /// movement beyond the clamp.
    async fn handle_move(&self, player_id: &str, data: PlayerMoveData) {
        {
            let mut arena = self.arena.write().await;
            if !arena.contains(player_id) {
                debug!("Ignoring PlayerMove from {} before JoinArena", player_id);
                return;
            }
            arena.update_position(player_id, data.position, data.velocity);
        }

        self.broadcast_except(player_id, Message::PlayerMove(data))
            .await;
    }

    /// Resolves a cast and fans out the results: one SpellCast to everyone,
    /// then one PlayerDamaged per hit. The caster id in the payload is
    /// overwritten with the dispatching player's id.
    async fn handle_cast(&self, player_id: &str, mut data: SpellCastData) {
        data.player_id = player_id.to_string();

        let results = {
            let mut arena = self.arena.write().await;
            if !arena.contains(player_id) {
                debug!("Ignoring CastSpell from {} before JoinArena", player_id);
                return;
            }
            arena.process_spell(&data)
        };

        info!(
            "{} cast {} at ({:.1}, {:.1})",
            player_id, data.spell_type, data.position.x, data.position.y
        );

        self.broadcast(Message::SpellCast(data)).await;
        for result in results {
            self.broadcast(Message::PlayerDamaged(result)).await;
        }
    }

    /// Removes a player from the room and the registry, then tells the
    /// remaining players. Idempotent: only the call that finds the
    /// connection registered does any work.
    pub async fn remove_client(&self, player_id: &str) {
        let conn = { self.connections.write().await.remove(player_id) };
        let Some(conn) = conn else {
            return;
        };
        conn.disconnect();

        let remaining = {
            let mut arena = self.arena.write().await;
            arena.remove_player(player_id);
            arena.player_count()
        };
        info!("{} disconnected ({} players remain)", player_id, remaining);

        self.broadcast(Message::PlayerLeft {
            player_id: player_id.to_string(),
        })
        .await;
    }

    /// Sends one message to a single player, if still registered.
    async fn send_to(&self, player_id: &str, message: Message) {
        let conn = { self.connections.read().await.get(player_id).cloned() };
        if let Some(conn) = conn {
            if !conn.send(Envelope::new(message)) {
                // The reader task observes the disconnect and runs removal.
                conn.disconnect();
            }
        }
    }

    /// Queues a message on every registered connection, except the excluded
    /// id if any. Operates on a registry snapshot taken at call time, so a
    /// player joining or leaving mid-broadcast may miss this particular
    /// message; best-effort, not transactional.
    async fn broadcast_message(&self, message: Message, exclude: Option<&str>) {
        let conns: Vec<Arc<Connection>> =
            self.connections.read().await.values().cloned().collect();
        let envelope = Envelope::new(message);

        for conn in conns {
            if Some(conn.player_id()) == exclude {
                continue;
            }
            if !conn.send(envelope.clone()) {
                conn.disconnect();
            }
        }
    }

    pub async fn broadcast(&self, message: Message) {
        self.broadcast_message(message, None).await;
    }

    pub async fn broadcast_except(&self, exclude: &str, message: Message) {
        self.broadcast_message(message, Some(exclude)).await;
    }

    /// Number of registered connections, joined or not.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of players currently seated in the arena.
    pub async fn player_count(&self) -> usize {
        self.arena.read().await.player_count()
    }
}
