//! Wire protocol and data model shared between the arena server and clients.
//!
//! Every message travels as one JSON-encoded [`Envelope`] followed by a
//! single `\n`. The newline is the only framing signal on the wire, so
//! [`MessageFramer`] is the canonical way to turn a raw byte stream back
//! into discrete records regardless of how the transport chunks reads.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 600.0;
pub const MAX_HEALTH: f32 = 100.0;
pub const DEFAULT_PORT: u16 = 7000;
pub const ARENA_ID: &str = "main_arena";

/// Current Unix time in milliseconds, used to stamp envelopes and player state.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Planar position or direction inside the arena.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Authoritative per-player state owned by the arena room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerState {
    pub player_id: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub last_update: u64,
}

impl PlayerState {
    /// Creates a freshly spawned player at full health.
    pub fn new(player_id: impl Into<String>, spawn: Vec2) -> Self {
        Self {
            player_id: player_id.into(),
            position: spawn,
            velocity: Vec2::ZERO,
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            last_update: timestamp_millis(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Applies damage, clamping health at zero. Returns the resulting health.
    pub fn apply_damage(&mut self, damage: f32) -> f32 {
        self.health = (self.health - damage).max(0.0);
        self.health
    }
}

/// Payload of a PlayerMove message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerMoveData {
    pub player_id: String,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Payload of CastSpell / SpellCast messages.
///
/// The server overwrites `player_id` with the id of the connection that sent
/// the cast, so a client cannot attribute a spell to someone else.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpellCastData {
    pub player_id: String,
    pub spell_type: String,
    pub position: Vec2,
    pub direction: Vec2,
    pub speed: f32,
    pub damage: f32,
    pub radius: f32,
}

/// One player hit by one spell cast.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DamageResult {
    /// The player who was hit.
    pub player_id: String,
    pub attacker_id: String,
    pub damage: f32,
    pub new_health: f32,
    pub hit_position: Vec2,
}

/// Full snapshot of the arena, sent to a player when they join.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ArenaState {
    pub arena_id: String,
    pub players: Vec<PlayerState>,
    pub last_update: u64,
}

/// All message kinds exchanged between server and clients.
///
/// Serializes as `{"type": ..., "data": ...}` so each kind carries a strongly
/// shaped payload instead of a re-encoded string blob.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// Client wants to enter the arena. No payload.
    JoinArena,
    /// Reply to JoinArena: the complete current arena state.
    ArenaState(ArenaState),
    /// Sent to everyone else when a player joins.
    PlayerJoined(PlayerState),
    /// Sent to everyone else when a player leaves.
    PlayerLeft { player_id: String },
    /// Client position update, relayed to everyone else.
    PlayerMove(PlayerMoveData),
    /// Client wants to cast a spell.
    CastSpell(SpellCastData),
    /// Sent to all players when a spell was cast, caster id corrected.
    SpellCast(SpellCastData),
    /// Sent to all players for each player a spell hit.
    PlayerDamaged(DamageResult),
}

impl Message {
    /// Human-readable kind tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::JoinArena => "JoinArena",
            Message::ArenaState(_) => "ArenaState",
            Message::PlayerJoined(_) => "PlayerJoined",
            Message::PlayerLeft { .. } => "PlayerLeft",
            Message::PlayerMove(_) => "PlayerMove",
            Message::CastSpell(_) => "CastSpell",
            Message::SpellCast(_) => "SpellCast",
            Message::PlayerDamaged(_) => "PlayerDamaged",
        }
    }
}

/// The unit of wire transmission: a message plus the time it was produced.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    pub timestamp: u64,
}

impl Envelope {
    /// Wraps a message with the current timestamp.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            timestamp: timestamp_millis(),
        }
    }
}

/// Serializes an envelope to one wire record, newline terminator included.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(envelope)?;
    line.push(b'\n');
    Ok(line)
}

/// Parses one complete frame (without its newline) back into an envelope.
pub fn decode(frame: &[u8]) -> Result<Envelope, serde_json::Error> {
    serde_json::from_slice(frame)
}

/// Accumulates raw transport bytes and yields complete newline-delimited
/// frames.
///
/// A single read may carry several complete records, a fraction of one, or
/// anything in between; bytes after the last newline are retained until the
/// next [`extend`](MessageFramer::extend) completes them. Frames are yielded
/// exactly once and never reordered.
#[derive(Debug, Default)]
pub struct MessageFramer {
    buffer: Vec<u8>,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes to the accumulation buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete frame, newline stripped.
    ///
    /// Returns `None` when no terminator is buffered yet. Callers should
    /// drain in a loop after every `extend`.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut frame: Vec<u8> = self.buffer.drain(..=end).collect();
        frame.pop();
        Some(frame)
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
