//! Authoritative arena state: spawn assignment, position bookkeeping, and
//! spell-collision resolution
//!
//! The room exclusively owns every player's state. All mutation happens
//! through methods called with the server's room lock held; nothing in here
//! touches the network.

use log::info;
use shared::{
    timestamp_millis, ArenaState, DamageResult, PlayerState, SpellCastData, Vec2, ARENA_HEIGHT,
    ARENA_WIDTH,
};
use std::collections::HashMap;

/// Fixed spawn positions, assigned cyclically as players join.
pub const SPAWN_POINTS: [Vec2; 5] = [
    Vec2 { x: 100.0, y: 100.0 }, // Top-left
    Vec2 { x: 700.0, y: 100.0 }, // Top-right
    Vec2 { x: 100.0, y: 500.0 }, // Bottom-left
    Vec2 { x: 700.0, y: 500.0 }, // Bottom-right
    Vec2 { x: 400.0, y: 300.0 }, // Center (for 5th player)
];

/// One game session's player roster and the rules applied to it.
pub struct ArenaRoom {
    id: String,
    players: HashMap<String, PlayerState>,
}

impl ArenaRoom {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            players: HashMap::new(),
        }
    }

    /// Seats a player at the next spawn point and returns their fresh state.
    ///
    /// The k-th player to join gets `SPAWN_POINTS[(k - 1) % len]`; the index
    /// wraps, so a sixth player shares the first spawn.
    pub fn add_player(&mut self, player_id: &str) -> PlayerState {
        let spawn = SPAWN_POINTS[self.players.len() % SPAWN_POINTS.len()];
        let player = PlayerState::new(player_id, spawn);

        info!(
            "{} spawned at ({:.0}, {:.0})",
            player_id, spawn.x, spawn.y
        );
        self.players.insert(player_id.to_string(), player.clone());
        player
    }

    /// Removes a player's state. Returns false if they were never seated.
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        self.players.remove(player_id).is_some()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerState> {
        self.players.get(player_id)
    }

    /// Stores a client-reported position and velocity.
    ///
    /// The position is clamped into arena bounds; beyond that the server
    /// trusts what the client reported. Unknown players are ignored.
    pub fn update_position(&mut self, player_id: &str, position: Vec2, velocity: Vec2) {
        if let Some(player) = self.players.get_mut(player_id) {
            player.position = Vec2 {
                x: position.x.clamp(0.0, ARENA_WIDTH),
                y: position.y.clamp(0.0, ARENA_HEIGHT),
            };
            player.velocity = velocity;
            player.last_update = timestamp_millis();
        }
    }

    /// Resolves one instantaneous cast against every seated player.
    ///
    /// Skips the caster and anyone already at zero health; every other
    /// player within `radius` of the cast position takes the full damage
    /// amount (flat hit-or-miss, no falloff). Results follow the player-map
    /// iteration order, which is not stable across calls.
    pub fn process_spell(&mut self, spell: &SpellCastData) -> Vec<DamageResult> {
        let mut results = Vec::new();

        for target in self.players.values_mut() {
            if target.player_id == spell.player_id || !target.is_alive() {
                continue;
            }

            let distance = spell.position.distance(target.position);
            if distance <= spell.radius {
                let new_health = target.apply_damage(spell.damage);

                info!(
                    "{} hit {} for {} damage (HP: {:.0})",
                    spell.player_id, target.player_id, spell.damage, new_health
                );
                if new_health <= 0.0 {
                    info!("{} was defeated by {}", target.player_id, spell.player_id);
                }

                results.push(DamageResult {
                    player_id: target.player_id.clone(),
                    attacker_id: spell.player_id.clone(),
                    damage: spell.damage,
                    new_health,
                    hit_position: target.position,
                });
            }
        }

        results
    }

    /// Snapshot of the whole room, sent to newly joining players.
    pub fn state_snapshot(&self) -> ArenaState {
        ArenaState {
            arena_id: self.id.clone(),
            players: self.players.values().cloned().collect(),
            last_update: timestamp_millis(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
