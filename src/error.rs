//! Error types surfaced to callers.

use serde::Serialize;
use thiserror::Error;

use crate::types::PlayerId;

/// Expected, recoverable failures of match generation.
///
/// Serialized with a `kind` tag so a front end can branch on the variant
/// instead of the message text.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchmakingError {
    #[error("need at least {required} available players, only {available} free")]
    InsufficientPlayers { required: usize, available: usize },

    #[error("not enough valid team combinations ({found} found)")]
    NoValidTeams { found: usize },

    #[error("no valid team includes a least-played player")]
    NoEligibleTeamForLeastPlayed,

    #[error("no compatible teams found after {attempts} attempts")]
    NoCompatibleTeams { attempts: usize },

    #[error("no compatible opponent for player {player}")]
    NoCompatibleOpponents { player: PlayerId },
}

impl MatchmakingError {
    /// What the user can do about it
    pub fn remedy(&self) -> &'static str {
        match self {
            MatchmakingError::InsufficientPlayers { .. } => {
                "Add players or finish a pending match."
            }
            _ => "Try resetting recent teammates/opponents.",
        }
    }
}

/// Roster edits that cannot be silently corrected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("player name must not be empty")]
    EmptyName,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
