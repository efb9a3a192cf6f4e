use core::cell::RefCell;
use recolor_core::{
    BackendKind, BoundedStore, ClickOutcome, Clock, Color, GamePersistence, GameSession,
    HelperNote, HelperPoint, Layer, MapRecord, Mode, Record, SolveOutcome, Sprite, SystemClock,
};
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::{Args, GlooSleep, WebStorage};

type WebStore = BoundedStore<WebStorage, SystemClock, GlooSleep>;
type WebPersistence = GamePersistence<WebStorage, SystemClock, GlooSleep>;

pub(crate) fn web_persistence(args: &Args) -> WebPersistence {
    let store = |kind| -> WebStore {
        BoundedStore::new(
            WebStorage::for_kind(kind),
            SystemClock,
            GlooSleep,
            args.store_config(kind),
        )
    };
    GamePersistence::new(store(BackendKind::Persistent), store(BackendKind::Session))
}

/// What the renderer needs to paint a frame.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    background_layer: &'a Layer,
    objects_layer: &'a Layer,
    helper_points: &'a [HelperPoint],
    mode: Mode,
    victory: bool,
    exploring: bool,
}

fn js_error(err: impl core::fmt::Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}

/// A running game, driven by the page's rendering layer.
#[wasm_bindgen]
pub struct GameHandle {
    map_id: String,
    session: Rc<RefCell<GameSession>>,
    persistence: Rc<WebPersistence>,
}

#[wasm_bindgen]
impl GameHandle {
    /// Starts a session from authored map JSON and optional player sprite pixels JSON.
    #[wasm_bindgen(constructor)]
    pub fn new(
        map_id: String,
        map_json: &str,
        sprite_json: Option<String>,
    ) -> Result<GameHandle, JsError> {
        let map = MapRecord::from_json(map_json)?.map;
        let sprite = sprite_json
            .map(|json| serde_json::from_str::<Sprite>(&json))
            .transpose()?;
        let session = GameSession::new(map, sprite)?;
        log::info!("started map {map_id:?}");
        Ok(Self {
            map_id,
            session: Rc::new(RefCell::new(session)),
            persistence: Rc::new(web_persistence(&Args::from_location())),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn map_id(&self) -> String {
        self.map_id.clone()
    }

    /// Handles a click on a cell, returning the id of a newly placed helper point.
    pub fn click(&self, row: usize, col: usize) -> Result<Option<String>, JsError> {
        let outcome = self
            .session
            .borrow_mut()
            .click((row, col), SystemClock.now_millis())?;
        Ok(match outcome {
            ClickOutcome::HelperAdded(id) => Some(id),
            _ => None,
        })
    }

    /// `"player"`, `"draw"` or `"helper"`.
    pub fn set_mode(&self, mode: &str) -> Result<(), JsError> {
        let mode: Mode = serde_json::from_value(mode.into())?;
        Ok(self.session.borrow_mut().set_mode(mode)?)
    }

    pub fn continue_exploring(&self) -> Result<(), JsError> {
        Ok(self.session.borrow_mut().continue_exploring()?)
    }

    pub fn set_brush(&self, color: &str) {
        self.session.borrow_mut().set_brush(Color::new(color));
    }

    pub fn set_eraser(&self, eraser: bool) {
        self.session.borrow_mut().set_eraser(eraser);
    }

    pub fn annotate_helper(&self, id: &str, title: String, content: String) -> Result<(), JsError> {
        let note = HelperNote { title, content };
        Ok(self.session.borrow_mut().annotate_helper(id, note)?)
    }

    pub fn remove_helper(&self, id: &str) -> bool {
        self.session.borrow_mut().remove_helper(id).is_some()
    }

    /// Id of the puzzle tile at a cell, if clicking it should open a puzzle.
    pub fn puzzle_at(&self, row: usize, col: usize) -> Option<String> {
        let session = self.session.borrow();
        session.puzzle_at((row, col)).map(|tile| tile.id.clone())
    }

    /// Returns whether anything changed.
    pub fn solve_puzzle(&self, tile_id: &str) -> Result<bool, JsError> {
        let outcome = self.session.borrow_mut().solve_puzzle(tile_id)?;
        Ok(outcome.has_update())
    }

    /// Returns whether the puzzle is now solved.
    pub fn submit_hidden_test(&self, tile_id: &str, index: usize) -> Result<bool, JsError> {
        let outcome = self
            .session
            .borrow_mut()
            .submit_hidden_test(tile_id, index)?;
        Ok(outcome == SolveOutcome::Solved)
    }

    pub fn is_victory(&self) -> bool {
        self.session.borrow().is_victory()
    }

    pub fn snapshot_json(&self) -> Result<String, JsError> {
        let session = self.session.borrow();
        let snapshot = Snapshot {
            background_layer: session.background(),
            objects_layer: session.objects(),
            helper_points: session.helper_points(),
            mode: session.mode(),
            victory: session.is_victory(),
            exploring: session.is_exploring(),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    pub fn export_json(&self) -> Result<String, JsError> {
        Ok(serde_json::to_string_pretty(&self.session.borrow().export())?)
    }

    /// Persists the session, resolving to whether the game state was stored.
    pub fn save(&self) -> js_sys::Promise {
        let persistence = Rc::clone(&self.persistence);
        let map_id = self.map_id.clone();
        let (state, sprite) = {
            let session = self.session.borrow();
            (session.saved_state(), session.sprite().cloned())
        };
        future_to_promise(async move {
            let saved = persistence.save_game_state(&map_id, &state).await;
            persistence
                .save_progress(&map_id, &state.game_progress)
                .await;
            if let Some(sprite) = sprite {
                persistence.save_player_sprite(&sprite).await;
            }
            Ok(JsValue::from_bool(saved))
        })
    }

    /// Resumes a saved session, resolving to whether one was found.
    pub fn load(&self) -> js_sys::Promise {
        let persistence = Rc::clone(&self.persistence);
        let session = Rc::clone(&self.session);
        let map_id = self.map_id.clone();
        future_to_promise(async move {
            let Some(state) = persistence.load_game_state(&map_id).await else {
                return Ok(JsValue::FALSE);
            };
            session.borrow_mut().restore(state).map_err(js_error)?;
            Ok(JsValue::TRUE)
        })
    }

    /// Resolves to the stored player sprite pixels as JSON, or `null`.
    pub fn load_player_sprite(&self) -> js_sys::Promise {
        let persistence = Rc::clone(&self.persistence);
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let Some(sprite) = persistence.load_player_sprite().await else {
                return Ok(JsValue::NULL);
            };
            let json = serde_json::to_string(&sprite).map_err(js_error)?;
            session.borrow_mut().set_sprite(Some(sprite));
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn run_cleanup(&self) -> usize {
        self.persistence.run_cleanup()
    }

    pub fn clear_storage(&self) -> usize {
        self.persistence.clear_all()
    }
}
