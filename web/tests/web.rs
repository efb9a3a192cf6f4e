//! Browser tests, run with `wasm-pack test --headless --firefox web`.

#![cfg(target_arch = "wasm32")]

use recolor_core::{
    BackendKind, BoundedStore, GameProgress, StorageBackend, StoreConfig, SystemClock,
};
use recolor_web::{GameHandle, GlooSleep, WebStorage};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const MAP: &str = r##"{
    "backgroundLayer": [["#ff0000", "#ff0000", "#ff0000"], ["#ff0000", "#ff0000", "#ff0000"]],
    "objectsLayer": [["", "", ""], ["", "", ""]],
    "interactiveTiles": [{
        "position": {"x": 0, "y": 0, "row": 0, "col": 0},
        "type": "trigger",
        "id": "trigger_1",
        "puzzle": {"description": "echo", "hints": [], "testCases": []},
        "recoveryArea": {"startRow": 1, "startCol": 1, "endRow": 1, "endCol": 2}
    }]
}"##;

fn store(kind: BackendKind) -> BoundedStore<WebStorage, SystemClock, GlooSleep> {
    let config = StoreConfig {
        backend: kind,
        ..StoreConfig::default()
    };
    BoundedStore::new(WebStorage::for_kind(kind), SystemClock, GlooSleep, config)
}

#[wasm_bindgen_test]
fn browser_storage_is_available() {
    assert!(store(BackendKind::Persistent).is_available());
    assert!(store(BackendKind::Session).is_available());
}

#[wasm_bindgen_test]
async fn local_storage_round_trip() {
    let store = store(BackendKind::Persistent);
    let mut progress = GameProgress::default();
    progress.solved_puzzles.insert("trigger_1".into());

    assert!(store.save("web_test_progress", &progress).await);
    assert!(store.backend().get("local_web_test_progress").unwrap().is_some());
    assert_eq!(
        store
            .load("web_test_progress", GameProgress::default())
            .await,
        progress
    );

    assert!(store.remove("web_test_progress"));
}

#[wasm_bindgen_test]
async fn namespaces_do_not_leak() {
    let session = store(BackendKind::Session);
    assert!(session.save("web_test_isolated", &GameProgress::default()).await);

    session.clear_all();

    assert_eq!(session.usage_bytes(), 0);
    assert!(store(BackendKind::Persistent).usage_bytes() < StoreConfig::default().max_storage_size_bytes);
}

#[wasm_bindgen_test]
fn handle_plays_a_map() {
    let handle = GameHandle::new("web-test".into(), MAP, None).unwrap();

    assert_eq!(handle.puzzle_at(0, 0).as_deref(), Some("trigger_1"));
    assert!(!handle.is_victory());
    assert!(handle.solve_puzzle("trigger_1").unwrap());
    assert!(handle.is_victory());

    let snapshot: serde_json::Value = serde_json::from_str(&handle.snapshot_json().unwrap()).unwrap();
    assert_eq!(snapshot["backgroundLayer"][1][1], "#ff0000");
    assert_eq!(snapshot["backgroundLayer"][1][0], "#4c4c4c");
    assert_eq!(snapshot["victory"], true);

    handle.continue_exploring().unwrap();
    handle.set_brush("#00ff00");
    assert_eq!(handle.click(0, 2).unwrap(), None);
}
