//! Browser-side checks for the JS facade. Run with `wasm-pack test --headless --firefox`.
#![cfg(target_arch = "wasm32")]

use fair_match_maker::MatchMakerEngine;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn engine_with(names: &[&str]) -> MatchMakerEngine {
    let mut engine = MatchMakerEngine::new(7);
    for name in names {
        engine.add_player(name, 5).unwrap();
    }
    engine
}

#[wasm_bindgen_test]
fn generate_and_complete() {
    let mut engine = engine_with(&["Mark", "Charles", "Mau", "Kelvin"]);
    let game_match: serde_json::Value = serde_json::from_str(&engine.generate_match().unwrap()).unwrap();
    assert_eq!(game_match["skill_difference"], 0.0);

    let id = game_match["id"].as_u64().unwrap() as usize;
    assert_eq!(engine.complete_match(id, "team2").unwrap(), "\"completed\"");
    assert_eq!(engine.complete_match(id, "team1").unwrap(), "\"already_completed\"");
}

#[wasm_bindgen_test]
fn generation_error_is_tagged() {
    let mut engine = engine_with(&["Mark", "Charles"]);
    let err = engine.generate_match().unwrap_err();
    let value: serde_json::Value = serde_json::from_str(&err.as_string().unwrap()).unwrap();
    assert_eq!(value["kind"], "insufficient_players");
}

#[wasm_bindgen_test]
fn blank_name_rejected() {
    let mut engine = MatchMakerEngine::new(1);
    assert!(engine.add_player("   ", 5).is_err());
}

#[wasm_bindgen_test]
fn bad_winner_rejected() {
    let mut engine = engine_with(&["Mark", "Charles", "Mau", "Kelvin"]);
    engine.generate_match().unwrap();
    assert!(engine.complete_match(1, "draw").is_err());
}

#[wasm_bindgen_test]
fn singles_generate_and_complete() {
    let mut engine = MatchMakerEngine::new_singles(3);
    engine.add_player("Ana", 6).unwrap();
    engine.add_player("Ben", 7).unwrap();

    let game_match: serde_json::Value = serde_json::from_str(&engine.generate_match().unwrap()).unwrap();
    assert_eq!(game_match["format"], "singles");
    let id = game_match["id"].as_u64().unwrap() as usize;
    assert_eq!(engine.complete_match(id, "first").unwrap(), "\"completed\"");
}

#[wasm_bindgen_test]
fn restore_rejects_invalid_config() {
    let engine = engine_with(&["Mark", "Charles"]);
    let mut state: serde_json::Value = serde_json::from_str(&engine.get_state()).unwrap();
    state["config"]["skill_range"] = serde_json::json!({ "min": 5, "max": 2 });
    assert!(MatchMakerEngine::from_state(&state.to_string()).is_err());
}
