use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Stable player identifier, never reused within a session
pub type PlayerId = usize;

/// Monotonic match identifier
pub type MatchId = usize;

/// Inclusive bounds for a player's skill level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRange {
    pub min: u8,
    pub max: u8,
}

impl SkillRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Clamp any integer input into the range. Inverted bounds are read
    /// as `max..=min`.
    pub fn clamp(&self, value: i64) -> u8 {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        value.clamp(low as i64, high as i64) as u8
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// How times-played turns into a selection weight.
///
/// Both laws are strictly positive, finite and monotonically decreasing in
/// times-played, so less-played players are always favoured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightLaw {
    /// `0.5^(t - t_min)`: the least-played get 1.0, each extra game halves it
    ExponentialDecay,
    /// `1 / (t + 1)`
    Inverse,
}

impl WeightLaw {
    pub fn weight(&self, times_played: u32, min_times_played: u32) -> f64 {
        match self {
            WeightLaw::ExponentialDecay => {
                let extra = times_played.saturating_sub(min_times_played);
                // powi underflows to zero past ~1075 extra games
                0.5_f64
                    .powi(extra.min(i32::MAX as u32) as i32)
                    .max(f64::MIN_POSITIVE)
            }
            WeightLaw::Inverse => 1.0 / (times_played as f64 + 1.0),
        }
    }
}

/// Doubles (2v2 teams) or singles (1v1 pairs)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFormat {
    Doubles,
    Singles,
}

impl MatchFormat {
    pub fn players_per_side(&self) -> usize {
        match self {
            MatchFormat::Doubles => 2,
            MatchFormat::Singles => 1,
        }
    }

    /// Minimum candidate pool size for one match
    pub fn required_players(&self) -> usize {
        self.players_per_side() * 2
    }
}

/// A player on the roster together with their rolling history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub skill: u8,
    pub times_played: u32,
    /// Most-recent-last, bounded by `MatchmakingConfig::teammate_window`
    pub recent_teammates: Vec<PlayerId>,
    /// Most-recent-last, bounded by `MatchmakingConfig::opponent_window`
    pub recent_opponents: Vec<PlayerId>,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, skill: u8) -> Self {
        Self {
            id,
            name: name.to_string(),
            skill,
            times_played: 0,
            recent_teammates: Vec::new(),
            recent_opponents: Vec::new(),
        }
    }

    pub fn has_recent_teammate(&self, other: PlayerId) -> bool {
        self.recent_teammates.contains(&other)
    }

    pub fn has_recent_opponent(&self, other: PlayerId) -> bool {
        self.recent_opponents.contains(&other)
    }

    pub fn remember_teammate(&mut self, other: PlayerId, window: usize) {
        push_recent(&mut self.recent_teammates, other, window);
    }

    pub fn remember_opponent(&mut self, other: PlayerId, window: usize) {
        push_recent(&mut self.recent_opponents, other, window);
    }

    pub fn clear_history(&mut self) {
        self.recent_teammates.clear();
        self.recent_opponents.clear();
    }

    /// Drop the oldest entries beyond the given windows
    pub fn truncate_history(&mut self, teammate_window: usize, opponent_window: usize) {
        keep_trailing(&mut self.recent_teammates, teammate_window);
        keep_trailing(&mut self.recent_opponents, opponent_window);
    }
}

/// Dedup, append, then keep only the trailing `window` entries
fn push_recent(list: &mut Vec<PlayerId>, id: PlayerId, window: usize) {
    list.retain(|&existing| existing != id);
    list.push(id);
    keep_trailing(list, window);
}

fn keep_trailing(list: &mut Vec<PlayerId>, window: usize) {
    if list.len() > window {
        let excess = list.len() - window;
        list.drain(..excess);
    }
}

/// A candidate 2v2 team, built fresh for every generation call
#[derive(Clone, Copy, Debug)]
pub struct Team<'a> {
    pub members: [&'a Player; 2],
    /// Mean of the two members' skill
    pub skill: f64,
    /// Sum of the two members' selection weights
    pub weight: f64,
}

impl<'a> Team<'a> {
    pub fn new(first: &'a Player, second: &'a Player, weight: f64) -> Self {
        Self {
            members: [first, second],
            skill: (first.skill as f64 + second.skill as f64) / 2.0,
            weight,
        }
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.members.iter().any(|p| p.id == id)
    }

    pub fn shares_player_with(&self, other: &Team<'_>) -> bool {
        other.members.iter().any(|p| self.contains(p.id))
    }

    pub fn snapshot(&self) -> SideSnapshot {
        SideSnapshot::from_players(&self.members)
    }
}

/// Which side of a match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

/// Frozen view of one side at creation time. Later roster edits do not
/// change it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideSnapshot {
    pub player_ids: Vec<PlayerId>,
    pub names: Vec<String>,
    /// Team average for doubles, individual skill for singles
    pub skill: f64,
}

impl SideSnapshot {
    pub fn from_players(players: &[&Player]) -> Self {
        let skill = if players.is_empty() {
            0.0
        } else {
            players.iter().map(|p| p.skill as f64).sum::<f64>() / players.len() as f64
        };

        Self {
            player_ids: players.iter().map(|p| p.id).collect(),
            names: players.iter().map(|p| p.name.clone()).collect(),
            skill,
        }
    }
}

/// A generated match. Pending until a winner is recorded, then frozen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub format: MatchFormat,
    pub first: SideSnapshot,
    pub second: SideSnapshot,
    /// Absolute skill difference between the sides
    pub skill_difference: f64,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    pub winner: Option<Side>,
}

impl Match {
    pub fn new(
        id: MatchId,
        format: MatchFormat,
        first: SideSnapshot,
        second: SideSnapshot,
        created_at: DateTime<Utc>,
    ) -> Self {
        let skill_difference = (first.skill - second.skill).abs();
        Self {
            id,
            format,
            first,
            second,
            skill_difference,
            created_at,
            completed: false,
            winner: None,
        }
    }

    pub fn side(&self, side: Side) -> &SideSnapshot {
        match side {
            Side::First => &self.first,
            Side::Second => &self.second,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.completed
    }

    /// Every participant on both sides
    pub fn participants(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.first
            .player_ids
            .iter()
            .chain(self.second.player_ids.iter())
            .copied()
    }
}

/// Result of a completion request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    Completed,
    /// Already completed earlier; nothing was changed
    AlreadyCompleted,
    UnknownMatch,
}

/// Matchmaking configuration parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    pub format: MatchFormat,
    pub weight_law: WeightLaw,
    pub skill_range: SkillRange,

    /// History lengths
    pub teammate_window: usize,
    pub opponent_window: usize,

    /// Team averages must differ by strictly less than this (doubles)
    pub max_team_skill_gap: f64,
    /// Individual skills may differ by at most this (singles)
    pub max_pair_skill_gap: u8,
    /// Teammates' times-played may differ by at most this
    pub max_teammate_play_gap: u32,

    /// Cap on team1 redraws before giving up
    pub max_attempts: usize,

    /// How many matches the history projection shows
    pub recent_match_limit: usize,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            format: MatchFormat::Doubles,
            weight_law: WeightLaw::ExponentialDecay,
            skill_range: SkillRange::new(1, 8),
            teammate_window: 2,
            opponent_window: 3,
            max_team_skill_gap: 2.0,
            max_pair_skill_gap: 2,
            max_teammate_play_gap: 2,
            max_attempts: 100,
            recent_match_limit: 10,
        }
    }
}

impl MatchmakingConfig {
    /// 1v1 preset
    pub fn singles() -> Self {
        Self {
            format: MatchFormat::Singles,
            weight_law: WeightLaw::Inverse,
            skill_range: SkillRange::new(1, 10),
            opponent_window: 2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.skill_range.min > self.skill_range.max {
            return Err(ConfigError::Invalid(format!(
                "skill range {}..={} is empty",
                self.skill_range.min, self.skill_range.max
            )));
        }
        if self.teammate_window == 0 || self.opponent_window == 0 {
            return Err(ConfigError::Invalid(
                "history windows must hold at least one entry".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be positive".to_string()));
        }
        if !self.max_team_skill_gap.is_finite() || self.max_team_skill_gap <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_team_skill_gap must be positive, got {}",
                self.max_team_skill_gap
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MatchmakingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn weight(&self, times_played: u32, min_times_played: u32) -> f64 {
        self.weight_law.weight(times_played, min_times_played)
    }
}

/// Player row for the presentation layer, recomputed on every read
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub skill: u8,
    pub times_played: u32,
    /// Weight against the roster-wide minimum times-played
    pub selection_weight: f64,
    pub recent_teammates: Vec<PlayerId>,
    pub recent_opponents: Vec<PlayerId>,
    /// In a pending match right now
    pub busy: bool,
}

/// Aggregate session statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_games_played: u64,
    pub completed_matches: usize,
    pub pending_matches: usize,
    pub average_games_per_player: f64,
}
