use crate::error::{ConfigError, MatchmakingError, RosterError};
use crate::matchmaker::{busy_players, Matchmaker};
use crate::roster::Roster;
use crate::types::*;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// One play session: roster, match list and config.
///
/// All operations run to completion on `&mut self`, so generation and
/// completion never interleave. A networked host should keep one `Session`
/// behind a single lock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub config: MatchmakingConfig,
    pub roster: Roster,
    /// Append-only apart from completion and `clear_matches`
    pub matches: Vec<Match>,
    next_match_id: MatchId,
    /// Random number generator seed
    rng_seed: u64,
    /// Generation calls so far, mixed into the seed
    draws: u64,
}

impl Session {
    pub fn new(config: MatchmakingConfig, seed: u64) -> Self {
        Self {
            config,
            roster: Roster::new(),
            matches: Vec::new(),
            next_match_id: 1,
            rng_seed: seed,
            draws: 0,
        }
    }

    /// Session seeded with a roster of (name, skill) entries
    pub fn with_players(config: MatchmakingConfig, seed: u64, players: &[(&str, i64)]) -> Result<Self, RosterError> {
        let mut session = Self::new(config, seed);
        for &(name, skill) in players {
            session.add_player(name, skill)?;
        }
        Ok(session)
    }

    pub fn add_player(&mut self, name: &str, skill: i64) -> Result<PlayerId, RosterError> {
        self.roster.add(name, skill, self.config.skill_range)
    }

    /// Unknown ids are ignored
    pub fn remove_player(&mut self, id: PlayerId) {
        if self.roster.remove(id).is_none() {
            warn!(player_id = id, "remove requested for unknown player");
        }
    }

    pub fn update_skill(&mut self, id: PlayerId, value: i64) {
        self.roster.set_skill(id, value, self.config.skill_range);
    }

    /// Skill edit from raw text; unparseable input keeps the current skill
    pub fn update_skill_input(&mut self, id: PlayerId, raw: &str) {
        if let Some(value) = parse_int_input(raw) {
            self.update_skill(id, value);
        }
    }

    pub fn update_times_played(&mut self, id: PlayerId, value: i64) {
        self.roster.set_times_played(id, value);
    }

    /// Times-played edit from raw text; unparseable input counts as zero
    pub fn update_times_played_input(&mut self, id: PlayerId, raw: &str) {
        self.update_times_played(id, parse_int_input(raw).unwrap_or(0));
    }

    /// +/- adjustment, floored at zero
    pub fn adjust_times_played(&mut self, id: PlayerId, delta: i64) {
        if let Some(current) = self.roster.get(id).map(|p| p.times_played) {
            self.update_times_played(id, (current as i64).saturating_add(delta));
        }
    }

    pub fn reset_history(&mut self) {
        self.roster.reset_history();
    }

    /// Generate the next pending match and append it to the match list.
    /// Never touches player state.
    pub fn generate_match(&mut self) -> Result<&Match, MatchmakingError> {
        let mut rng = StdRng::seed_from_u64(self.rng_seed.wrapping_add(self.draws));
        self.draws += 1;

        let matchmaker = Matchmaker::new(self.config.clone());
        let game_match = matchmaker
            .generate(&self.roster, &self.matches, self.next_match_id, Utc::now(), &mut rng)
            .map_err(|err| {
                warn!(error = %err, remedy = err.remedy(), "match generation failed");
                err
            })?;

        self.next_match_id += 1;
        self.matches.push(game_match);
        Ok(&self.matches[self.matches.len() - 1])
    }

    /// Record the winner of a pending match and update every participant's
    /// history. Re-completing or completing an unknown match changes
    /// nothing.
    pub fn complete_match(&mut self, match_id: MatchId, winner: Side) -> CompletionOutcome {
        let game_match = match self.matches.iter_mut().find(|m| m.id == match_id) {
            Some(m) => m,
            None => {
                warn!(match_id, "completion requested for unknown match");
                return CompletionOutcome::UnknownMatch;
            }
        };

        if game_match.completed {
            warn!(match_id, "match already completed, ignoring");
            return CompletionOutcome::AlreadyCompleted;
        }

        game_match.completed = true;
        game_match.winner = Some(winner);
        let game_match = game_match.clone();

        apply_result(&mut self.roster, &game_match, &self.config);

        info!(match_id, winner = ?winner, "match completed");
        CompletionOutcome::Completed
    }

    pub fn clear_matches(&mut self) {
        info!(cleared = self.matches.len(), "match list cleared");
        self.matches.clear();
    }

    /// Restore a session saved as JSON, rejecting an invalid config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let session: Session = serde_json::from_str(json)?;
        session.config.validate()?;
        Ok(session)
    }

    /// Swap in a new validated config. Skills are re-clamped to its range
    /// and histories trimmed to its windows.
    pub fn update_config(&mut self, config: MatchmakingConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.roster.clamp_skills(config.skill_range);
        self.roster
            .truncate_history(config.teammate_window, config.opponent_window);
        self.config = config;
        Ok(())
    }

    pub fn get_match(&self, match_id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    pub fn busy_players(&self) -> HashSet<PlayerId> {
        busy_players(&self.matches)
    }

    /// Player rows with live selection weights
    pub fn player_views(&self) -> Vec<PlayerView> {
        let min_times_played = self.roster.min_times_played().unwrap_or(0);
        let busy = self.busy_players();

        self.roster
            .iter()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                skill: p.skill,
                times_played: p.times_played,
                selection_weight: self.config.weight(p.times_played, min_times_played),
                recent_teammates: p.recent_teammates.clone(),
                recent_opponents: p.recent_opponents.clone(),
                busy: busy.contains(&p.id),
            })
            .collect()
    }

    /// Up to `limit` matches, newest first
    pub fn recent_matches(&self, limit: usize) -> Vec<&Match> {
        self.matches.iter().rev().take(limit).collect()
    }

    pub fn stats(&self) -> SessionStats {
        let total_games_played = self.roster.total_games_played();
        let completed_matches = self.matches.iter().filter(|m| m.completed).count();

        SessionStats {
            total_games_played,
            completed_matches,
            pending_matches: self.matches.len() - completed_matches,
            average_games_per_player: if self.roster.is_empty() {
                0.0
            } else {
                total_games_played as f64 / self.roster.len() as f64
            },
        }
    }
}

/// History bookkeeping for a finished match. Participants no longer on the
/// roster are skipped.
fn apply_result(roster: &mut Roster, game_match: &Match, config: &MatchmakingConfig) {
    for side in [Side::First, Side::Second] {
        let own = game_match.side(side);
        let opposing = game_match.side(side.opposite());

        for &player_id in &own.player_ids {
            let teammates: Vec<PlayerId> = own
                .player_ids
                .iter()
                .copied()
                .filter(|&id| id != player_id && roster.contains(id))
                .collect();
            let opponents: Vec<PlayerId> = opposing
                .player_ids
                .iter()
                .copied()
                .filter(|&id| roster.contains(id))
                .collect();

            let player = match roster.get_mut(player_id) {
                Some(p) => p,
                None => continue,
            };

            for teammate in teammates {
                player.remember_teammate(teammate, config.teammate_window);
            }
            for opponent in opponents {
                player.remember_opponent(opponent, config.opponent_window);
            }
            player.times_played = player.times_played.saturating_add(1);
        }
    }
}

/// Leading integer of a text field: `"7"`, `" 3 "`, `"4.9"` and `"5kg"`
/// all parse; anything without leading digits does not.
pub fn parse_int_input(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());

    if end == 0 {
        return None;
    }

    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * value)
}
