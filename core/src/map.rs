use serde::{Deserialize, Serialize};

use crate::*;

/// Background color of a freshly created map, also what background erasing paints.
pub const PARCHMENT: &str = "#eee1c4";

/// Size of a map created by the editor, `(rows, cols)`.
pub const EDITOR_MAP_SIZE: Coord2 = (46, 108);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Objects,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    #[default]
    Trigger,
}

/// Inclusive rectangle restored to full color when the owning tile's puzzle is solved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryArea {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl RecoveryArea {
    pub const fn new(start: Coord2, end: Coord2) -> Self {
        Self {
            start_row: start.0,
            start_col: start.1,
            end_row: end.0,
            end_col: end.1,
        }
    }

    /// Rectangle spanned by two corners in any order, like a drag selection.
    pub fn spanning(a: Coord2, b: Coord2) -> Self {
        Self::new((a.0.min(b.0), a.1.min(b.1)), (a.0.max(b.0), a.1.max(b.1)))
    }

    pub const fn contains(&self, (row, col): Coord2) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    /// Cells of the rectangle that lie inside a `bounds` sized grid, row major.
    pub fn iter_within(&self, (rows, cols): Coord2) -> impl Iterator<Item = Coord2> + use<> {
        let row_end = self.end_row.saturating_add(1).min(rows);
        let col_end = self.end_col.saturating_add(1).min(cols);
        let start_col = self.start_col;
        (self.start_row..row_end)
            .flat_map(move |row| (start_col..col_end).map(move |col| (row, col)))
    }

    pub fn validate(&self, bounds: Coord2) -> Result<()> {
        let (rows, cols) = bounds;
        if self.start_row > self.end_row
            || self.start_col > self.end_col
            || self.end_row >= rows
            || self.end_col >= cols
        {
            Err(GameError::InvalidRecoveryArea)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleInfo {
    pub description: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl PuzzleInfo {
    pub fn visible_tests(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|test| !test.is_hidden)
    }

    /// Hidden tests in authored order; progress indices refer to this sequence.
    pub fn hidden_tests(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|test| test.is_hidden)
    }

    pub fn hidden_test_count(&self) -> usize {
        self.hidden_tests().count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveTile {
    pub position: TilePosition,
    #[serde(rename = "type", default)]
    pub kind: TileKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puzzle: Option<PuzzleInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_area: Option<RecoveryArea>,
}

impl InteractiveTile {
    pub fn new(id: impl Into<String>, coords: Coord2) -> Self {
        Self {
            position: TilePosition::new(coords),
            kind: TileKind::Trigger,
            id: id.into(),
            puzzle: None,
            recovery_area: None,
        }
    }

    pub const fn coords(&self) -> Coord2 {
        self.position.coords()
    }

    pub fn hidden_test_count(&self) -> usize {
        self.puzzle.as_ref().map_or(0, PuzzleInfo::hidden_test_count)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperNote {
    pub title: String,
    pub content: String,
}

/// Player-placed marker with an optional note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperPoint {
    pub id: String,
    pub position: GridPos,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<HelperNote>,
}

/// Authored map, the restoration source for every recovery area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub background_layer: Layer,
    pub objects_layer: Layer,
    #[serde(default)]
    pub interactive_tiles: Vec<InteractiveTile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_colors: Option<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_areas: Option<Vec<Vec<bool>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_points: Option<Vec<HelperPoint>>,
}

impl MapData {
    pub fn blank(size: Coord2) -> Self {
        Self {
            background_layer: Layer::filled(size, Some(Color::new(PARCHMENT))),
            objects_layer: Layer::empty(size),
            interactive_tiles: Vec::new(),
            original_colors: None,
            recovered_areas: None,
            helper_points: None,
        }
    }

    pub fn size(&self) -> Coord2 {
        self.background_layer.size()
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        match kind {
            LayerKind::Background => &self.background_layer,
            LayerKind::Objects => &self.objects_layer,
        }
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        match kind {
            LayerKind::Background => &mut self.background_layer,
            LayerKind::Objects => &mut self.objects_layer,
        }
    }

    pub fn paint(&mut self, kind: LayerKind, coords: Coord2, color: Color) -> Result<()> {
        self.layer_mut(kind).set(coords, Some(color))
    }

    /// Background cells go back to parchment, object cells become empty.
    pub fn erase(&mut self, kind: LayerKind, coords: Coord2) -> Result<()> {
        let cell = match kind {
            LayerKind::Background => Some(Color::new(PARCHMENT)),
            LayerKind::Objects => None,
        };
        self.layer_mut(kind).set(coords, cell)
    }

    pub fn tile(&self, id: &str) -> Option<&InteractiveTile> {
        self.interactive_tiles.iter().find(|tile| tile.id == id)
    }

    fn tile_mut(&mut self, id: &str) -> Result<&mut InteractiveTile> {
        self.interactive_tiles
            .iter_mut()
            .find(|tile| tile.id == id)
            .ok_or_else(|| GameError::UnknownTile(id.to_owned()))
    }

    pub fn tile_at(&self, coords: Coord2) -> Option<&InteractiveTile> {
        self.interactive_tiles
            .iter()
            .find(|tile| tile.coords() == coords)
    }

    pub fn add_interactive_tile(
        &mut self,
        id: impl Into<String>,
        coords: Coord2,
    ) -> Result<&InteractiveTile> {
        let id = id.into();
        if !self.background_layer.contains(coords) {
            return Err(GameError::InvalidCoords);
        }
        if self.tile(&id).is_some() {
            return Err(GameError::DuplicateTile(id));
        }
        log::debug!("add interactive tile {id:?} at {coords:?}");
        let index = self.interactive_tiles.len();
        self.interactive_tiles.push(InteractiveTile::new(id, coords));
        Ok(&self.interactive_tiles[index])
    }

    pub fn remove_interactive_tile(&mut self, id: &str) -> Result<InteractiveTile> {
        let index = self
            .interactive_tiles
            .iter()
            .position(|tile| tile.id == id)
            .ok_or_else(|| GameError::UnknownTile(id.to_owned()))?;
        Ok(self.interactive_tiles.remove(index))
    }

    pub fn set_recovery_area(&mut self, id: &str, area: RecoveryArea) -> Result<()> {
        area.validate(self.size())?;
        self.tile_mut(id)?.recovery_area = Some(area);
        Ok(())
    }

    pub fn set_puzzle(&mut self, id: &str, puzzle: PuzzleInfo) -> Result<()> {
        self.tile_mut(id)?.puzzle = Some(puzzle);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.size();
        if self.objects_layer.size() != size {
            return Err(GameError::GridShapeMismatch);
        }
        if let Some(original) = &self.original_colors {
            if original.size() != size {
                return Err(GameError::GridShapeMismatch);
            }
        }
        for tile in &self.interactive_tiles {
            if !self.background_layer.contains(tile.coords()) {
                return Err(GameError::InvalidCoords);
            }
            if let Some(area) = &tile.recovery_area {
                area.validate(size)?;
            }
        }
        Ok(())
    }

    /// The editor's preview of what players see before solving anything.
    pub fn preview_grayscale(&self) -> (Layer, Layer) {
        to_grayscale(
            &self.background_layer,
            &self.objects_layer,
            &self.interactive_tiles,
        )
    }
}
