use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RosterError;
use crate::types::{Player, PlayerId, SkillRange};

/// The ordered player roster. Order is insertion order and breaks ties
/// when candidates are sorted by times-played.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<Player>,
    next_player_id: PlayerId,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            next_player_id: 1,
        }
    }

    /// Add a player with zeroed history. The name is trimmed and the skill
    /// clamped into `range`.
    pub fn add(&mut self, name: &str, skill: i64, range: SkillRange) -> Result<PlayerId, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }

        // A deserialized default roster starts the counter at zero
        let id = self.next_player_id.max(1);
        self.next_player_id = id + 1;

        let player = Player::new(id, name, range.clamp(skill));
        info!(player_id = id, name, skill = player.skill, "player added");
        self.players.push(player);
        Ok(id)
    }

    /// Remove a player. No protection for players in a pending match.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(idx);
        info!(player_id = id, name = %player.name, "player removed");
        Some(player)
    }

    pub fn set_skill(&mut self, id: PlayerId, value: i64, range: SkillRange) {
        if let Some(player) = self.get_mut(id) {
            player.skill = range.clamp(value);
        }
    }

    /// Negative values floor to zero
    pub fn set_times_played(&mut self, id: PlayerId, value: i64) {
        if let Some(player) = self.get_mut(id) {
            player.times_played = value.clamp(0, u32::MAX as i64) as u32;
        }
    }

    /// Clear teammate and opponent history; times-played is kept
    pub fn reset_history(&mut self) {
        for player in &mut self.players {
            player.clear_history();
        }
        info!(players = self.players.len(), "recent history reset");
    }

    /// Re-clamp every skill, used after the valid range changes
    pub fn clamp_skills(&mut self, range: SkillRange) {
        for player in &mut self.players {
            player.skill = range.clamp(player.skill as i64);
        }
    }

    /// Trim every player's history to the given windows
    pub fn truncate_history(&mut self, teammate_window: usize, opponent_window: usize) {
        for player in &mut self.players {
            player.truncate_history(teammate_window, opponent_window);
        }
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn min_times_played(&self) -> Option<u32> {
        self.players.iter().map(|p| p.times_played).min()
    }

    pub fn max_times_played(&self) -> Option<u32> {
        self.players.iter().map(|p| p.times_played).max()
    }

    pub fn total_games_played(&self) -> u64 {
        self.players.iter().map(|p| p.times_played as u64).sum()
    }
}
