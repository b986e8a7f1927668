pub mod error;
pub mod matchmaker;
pub mod roster;
pub mod session;
pub mod types;

use error::MatchmakingError;
use session::Session;
use types::*;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM-exposed session wrapper
#[wasm_bindgen]
pub struct MatchMakerEngine {
    session: Session,
}

#[wasm_bindgen]
impl MatchMakerEngine {
    /// Create a 2v2 session with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> MatchMakerEngine {
        MatchMakerEngine {
            session: Session::new(MatchmakingConfig::default(), seed),
        }
    }

    /// Create a 1v1 session
    pub fn new_singles(seed: u64) -> MatchMakerEngine {
        MatchMakerEngine {
            session: Session::new(MatchmakingConfig::singles(), seed),
        }
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<MatchMakerEngine, JsValue> {
        let config = MatchmakingConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(MatchMakerEngine {
            session: Session::new(config, seed),
        })
    }

    /// Restore a session saved with `get_state`
    pub fn from_state(state_json: &str) -> Result<MatchMakerEngine, JsValue> {
        let session = Session::from_json(state_json)
            .map_err(|e| JsValue::from_str(&format!("State restore error: {}", e)))?;
        Ok(MatchMakerEngine { session })
    }

    /// Add a player, returning the new id
    pub fn add_player(&mut self, name: &str, skill: i32) -> Result<usize, JsValue> {
        self.session
            .add_player(name, skill as i64)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn remove_player(&mut self, id: usize) {
        self.session.remove_player(id);
    }

    /// Skill edit straight from an input field
    pub fn update_skill(&mut self, id: usize, value: &str) {
        self.session.update_skill_input(id, value);
    }

    /// Times-played edit straight from an input field
    pub fn update_times_played(&mut self, id: usize, value: &str) {
        self.session.update_times_played_input(id, value);
    }

    /// +/- buttons
    pub fn adjust_times_played(&mut self, id: usize, delta: i32) {
        self.session.adjust_times_played(id, delta as i64);
    }

    pub fn reset_history(&mut self) {
        self.session.reset_history();
    }

    /// Generate a match. Ok holds the match JSON; Err holds a JSON object
    /// with `kind`, `message` and `remedy`.
    pub fn generate_match(&mut self) -> Result<String, JsValue> {
        match self.session.generate_match() {
            Ok(game_match) => Ok(serde_json::to_string(game_match).unwrap_or_default()),
            Err(e) => Err(JsValue::from_str(&error_json(&e))),
        }
    }

    /// Record a winner ("first"/"second", "team1"/"team2" or "1"/"2").
    /// Returns the completion outcome as a JSON string.
    pub fn complete_match(&mut self, match_id: usize, winner: &str) -> Result<String, JsValue> {
        let side = parse_side(winner)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown winning side: {}", winner)))?;
        let outcome = self.session.complete_match(match_id, side);
        Ok(serde_json::to_string(&outcome).unwrap_or_default())
    }

    pub fn clear_matches(&mut self) {
        self.session.clear_matches();
    }

    /// Get players with live selection weights as JSON
    pub fn get_players(&self) -> String {
        serde_json::to_string(&self.session.player_views()).unwrap_or_default()
    }

    /// Get the most recent matches (newest first) as JSON
    pub fn get_recent_matches(&self) -> String {
        let limit = self.session.config.recent_match_limit;
        serde_json::to_string(&self.session.recent_matches(limit)).unwrap_or_default()
    }

    /// Get every match as JSON
    pub fn get_matches(&self) -> String {
        serde_json::to_string(&self.session.matches).unwrap_or_default()
    }

    /// Get statistics JSON
    pub fn get_stats(&self) -> String {
        serde_json::to_string(&self.session.stats()).unwrap_or_default()
    }

    pub fn get_config(&self) -> String {
        serde_json::to_string(&self.session.config).unwrap_or_default()
    }

    /// Update matchmaking config
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config = MatchmakingConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.session
            .update_config(config)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&MatchmakingConfig::default()).unwrap_or_default()
    }

    /// Whole session as JSON, for the page to stash and restore
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.session).unwrap_or_default()
    }
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "first" | "team1" | "1" => Some(Side::First),
        "second" | "team2" | "2" => Some(Side::Second),
        _ => None,
    }
}

fn error_json(err: &MatchmakingError) -> String {
    let mut value = serde_json::to_value(err).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(fields) = value.as_object_mut() {
        fields.insert("message".to_string(), err.to_string().into());
        fields.insert("remedy".to_string(), err.remedy().into());
    }
    value.to_string()
}
