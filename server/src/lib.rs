//! # Spell Slingers Arena Server
//!
//! Authoritative server for the spell-slinging arena game. It accepts TCP
//! connections, keeps the canonical player state (positions, health),
//! resolves spell-cast collisions, and fans every state change out to all
//! connected clients.
//!
//! ## Architecture
//!
//! One accept loop task plus two tasks per connection (reader and writer).
//! All of them share one [`network::GameServer`] behind an `Arc`: the arena
//! room and the connection registry each live in a `RwLock`, and handlers
//! never hold either lock across socket I/O. Clients are trusted for their
//! own movement (positions are only clamped into arena bounds); spawn
//! assignment, spell collision, and damage are decided here.
//!
//! ## Wire protocol
//!
//! Newline-delimited JSON envelopes as defined in the `shared` crate. The
//! read path reassembles frames with `shared::MessageFramer`, so messages
//! split across TCP reads are never lost or duplicated. A malformed line is
//! logged and skipped; transport errors tear down only that connection.
//!
//! ## Module organization
//!
//! - [`arena`]: the arena room with spawn points, position bookkeeping and
//!   bounds clamping, and the spell-resolution algorithm.
//! - [`connection`]: per-peer transport with framed reads, queued writes
//!   behind a bounded outbound buffer (slow consumers get dropped), and
//!   idempotent disconnect.
//! - [`network`]: server lifecycle, player-id assignment, dispatch of the
//!   client message kinds, and the broadcast primitives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use server::network::GameServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = GameServer::new();
//!     server.start("0.0.0.0:7000").await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod connection;
pub mod network;
