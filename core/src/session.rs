use serde::{Deserialize, Serialize};

use crate::*;

/// What a click on the grid does.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Player,
    Draw,
    Helper,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    PlayerMoved,
    HelperAdded(String),
    HelperRemoved(String),
    Painted,
}

/// Authored and current layers side by side, as offered for download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedMap {
    #[serde(flatten)]
    pub current: MapData,
    pub original_background_layer: Layer,
    pub original_objects_layer: Layer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub map_data: ExportedMap,
    pub helper_points: Vec<HelperPoint>,
    pub game_progress: GameProgress,
    pub player_position: Option<PlayerPosition>,
}

/// One play-through of a map.
///
/// The authored map stays untouched and is the restoration source; the current layers start
/// out grayscaled and regain color as puzzles are solved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSession {
    map: MapData,
    background: Layer,
    objects: Layer,
    progress: GameProgress,
    helper_points: Vec<HelperPoint>,
    sprite: Option<Sprite>,
    last_player_position: Option<Coord2>,
    mode: Mode,
    brush: Color,
    eraser: bool,
    victory: bool,
    exploring: bool,
}

impl GameSession {
    pub fn new(map: MapData, sprite: Option<Sprite>) -> Result<Self> {
        map.validate()?;
        let (background, objects) = map.preview_grayscale();
        Ok(Self {
            map,
            background,
            objects,
            progress: GameProgress::default(),
            helper_points: Vec::new(),
            sprite: sprite.filter(|sprite| !sprite.is_empty()),
            last_player_position: None,
            mode: Mode::Player,
            brush: Color::new("#000000"),
            eraser: false,
            victory: false,
            exploring: false,
        })
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn size(&self) -> Coord2 {
        self.background.size()
    }

    pub fn background(&self) -> &Layer {
        &self.background
    }

    pub fn objects(&self) -> &Layer {
        &self.objects
    }

    pub fn progress(&self) -> &GameProgress {
        &self.progress
    }

    pub fn helper_points(&self) -> &[HelperPoint] {
        &self.helper_points
    }

    pub fn sprite(&self) -> Option<&Sprite> {
        self.sprite.as_ref()
    }

    pub fn last_player_position(&self) -> Option<Coord2> {
        self.last_player_position
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_victory(&self) -> bool {
        self.victory
    }

    pub fn is_exploring(&self) -> bool {
        self.exploring
    }

    pub fn is_drawing_allowed(&self) -> bool {
        self.victory && self.exploring
    }

    pub fn tile_status(&self, tile_id: &str) -> Result<TileStatus> {
        Ok(self.progress.tile_status(self.tile(tile_id)?))
    }

    /// Puzzle tile at `coords`, if clicking there should open a puzzle.
    pub fn puzzle_at(&self, coords: Coord2) -> Option<&InteractiveTile> {
        self.map
            .tile_at(coords)
            .filter(|tile| tile.puzzle.is_some())
    }

    /// Swaps the player sprite, removing the old one from the grid first.
    pub fn set_sprite(&mut self, sprite: Option<Sprite>) {
        if let (Some(old), Some(center)) = (&self.sprite, self.last_player_position.take()) {
            unstamp_sprite(&mut self.objects, old, center);
        }
        self.sprite = sprite.filter(|sprite| !sprite.is_empty());
    }

    pub fn set_brush(&mut self, color: Color) {
        self.brush = color;
        self.eraser = false;
    }

    pub fn set_eraser(&mut self, eraser: bool) {
        self.eraser = eraser;
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == Mode::Draw && !self.is_drawing_allowed() {
            return Err(GameError::DrawingLocked);
        }
        self.mode = mode;
        Ok(())
    }

    /// Keeps playing after winning, with drawing unlocked.
    pub fn continue_exploring(&mut self) -> Result<()> {
        if !self.victory {
            return Err(GameError::DrawingLocked);
        }
        self.exploring = true;
        self.mode = Mode::Draw;
        Ok(())
    }

    pub fn click(&mut self, coords: Coord2, now_millis: i64) -> Result<ClickOutcome> {
        if !self.background.contains(coords) {
            return Err(GameError::InvalidCoords);
        }
        match self.mode {
            Mode::Player => self.place_player(coords),
            Mode::Helper => Ok(self.toggle_helper(coords, now_millis)),
            Mode::Draw => self.draw(coords),
        }
    }

    fn place_player(&mut self, center: Coord2) -> Result<ClickOutcome> {
        let sprite = self.sprite.as_ref().ok_or(GameError::NoPlayerSprite)?;
        if let Some(last) = self.last_player_position {
            unstamp_sprite(&mut self.objects, sprite, last);
        }
        stamp_sprite(&mut self.objects, sprite, center);
        self.last_player_position = Some(center);
        Ok(ClickOutcome::PlayerMoved)
    }

    fn toggle_helper(&mut self, coords: Coord2, now_millis: i64) -> ClickOutcome {
        let existing = self
            .helper_points
            .iter()
            .position(|point| point.position.coords() == coords);
        if let Some(index) = existing {
            return ClickOutcome::HelperRemoved(self.helper_points.remove(index).id);
        }

        let mut id = format!("helper_{now_millis}");
        let mut suffix = 1;
        while self.helper_points.iter().any(|point| point.id == id) {
            id = format!("helper_{now_millis}_{suffix}");
            suffix += 1;
        }
        self.helper_points.push(HelperPoint {
            id: id.clone(),
            position: coords.into(),
            color: self.brush.clone(),
            note: None,
        });
        ClickOutcome::HelperAdded(id)
    }

    fn draw(&mut self, coords: Coord2) -> Result<ClickOutcome> {
        if !self.is_drawing_allowed() {
            return Err(GameError::DrawingLocked);
        }
        let cell = (!self.eraser).then(|| self.brush.clone());
        self.objects.set(coords, cell)?;
        Ok(ClickOutcome::Painted)
    }

    pub fn annotate_helper(&mut self, id: &str, note: HelperNote) -> Result<()> {
        let point = self
            .helper_points
            .iter_mut()
            .find(|point| point.id == id)
            .ok_or_else(|| GameError::UnknownHelper(id.to_owned()))?;
        point.note = Some(note);
        Ok(())
    }

    pub fn remove_helper(&mut self, id: &str) -> Option<HelperPoint> {
        let index = self.helper_points.iter().position(|point| point.id == id)?;
        Some(self.helper_points.remove(index))
    }

    fn tile(&self, tile_id: &str) -> Result<&InteractiveTile> {
        self.map
            .tile(tile_id)
            .ok_or_else(|| GameError::UnknownTile(tile_id.to_owned()))
    }

    /// Solves a puzzle once the puzzle UI accepted an answer.
    ///
    /// Puzzles with hidden tests are left alone ([`SolveOutcome::NoChange`]) and only finish
    /// through [`Self::submit_hidden_test`].
    pub fn solve_puzzle(&mut self, tile_id: &str) -> Result<SolveOutcome> {
        let tile = self.tile(tile_id)?.clone();
        let outcome = self.progress.reveal(&tile)?;
        if outcome == SolveOutcome::Solved {
            self.finish_puzzle(tile_id)?;
        } else if !self.progress.is_solved(tile_id) {
            log::debug!("{tile_id:?} still has hidden tests to answer");
        }
        Ok(outcome)
    }

    /// Records a correctly answered hidden test, finishing the puzzle with the last one.
    pub fn submit_hidden_test(&mut self, tile_id: &str, index: usize) -> Result<SolveOutcome> {
        let tile = self.tile(tile_id)?.clone();
        let outcome = self.progress.record_hidden_test(&tile, index)?;
        if outcome == SolveOutcome::Solved {
            self.finish_puzzle(tile_id)?;
        }
        Ok(outcome)
    }

    fn finish_puzzle(&mut self, tile_id: &str) -> Result<()> {
        let area = self.tile(tile_id)?.recovery_area;
        if let Some(area) = area {
            let restored = apply_recovery_area(
                &mut self.background,
                &mut self.objects,
                &self.map.background_layer,
                &self.map.objects_layer,
                &area,
            );
            log::debug!("{tile_id:?} restored {} cells", restored.len());
            self.progress.mark_recovered(restored);
        }

        if !self.victory
            && compute_win_condition(&self.map.interactive_tiles, &self.progress.solved_puzzles)
        {
            log::info!("every puzzle solved");
            self.victory = true;
        }
        Ok(())
    }

    pub fn saved_state(&self) -> SavedGameState {
        SavedGameState {
            version: RECORD_VERSION,
            recovered_colors: RecoveredColors {
                background_layer: self.background.clone(),
                objects_layer: self.objects.clone(),
            },
            helper_points: self.helper_points.clone(),
            game_progress: self.progress.clone(),
            last_player_position: self.last_player_position.map(PlayerPosition::from),
        }
    }

    /// Resumes from a saved state of the same map.
    pub fn restore(&mut self, saved: SavedGameState) -> Result<()> {
        let colors = saved.recovered_colors;
        let size = self.size();
        if colors.background_layer.size() != size || colors.objects_layer.size() != size {
            return Err(GameError::GridShapeMismatch);
        }

        self.background = colors.background_layer;
        self.objects = colors.objects_layer;
        self.helper_points = saved.helper_points;
        self.progress = saved.game_progress;
        self.last_player_position = saved
            .last_player_position
            .map(|position| position.coords())
            .filter(|&coords| self.background.contains(coords));

        let finished = self.progress.solved_puzzles.len() == self.map.interactive_tiles.len();
        self.victory = finished;
        self.exploring = finished;
        self.mode = if finished { Mode::Draw } else { Mode::Player };
        Ok(())
    }

    pub fn export(&self) -> ExportDocument {
        let mut current = self.map.clone();
        current.background_layer = self.background.clone();
        current.objects_layer = self.objects.clone();
        ExportDocument {
            map_data: ExportedMap {
                current,
                original_background_layer: self.map.background_layer.clone(),
                original_objects_layer: self.map.objects_layer.clone(),
            },
            helper_points: self.helper_points.clone(),
            game_progress: self.progress.clone(),
            player_position: self.last_player_position.map(PlayerPosition::from),
        }
    }
}
