use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::*;

/// Solve state of a single interactive tile.
///
/// - Unsolved -> PartiallySolved (some hidden tests answered)
/// - PartiallySolved -> Solved (every hidden test answered)
/// - Unsolved -> Solved (no hidden tests, revealed directly)
///
/// Solved is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileStatus {
    Unsolved,
    PartiallySolved,
    Solved,
}

impl TileStatus {
    pub const fn is_solved(self) -> bool {
        matches!(self, Self::Solved)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    NoChange,
    Progressed,
    Solved,
}

impl SolveOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Progressed => true,
            Self::Solved => true,
        }
    }
}

/// Per-map puzzle progress, persisted as `game_progress_<mapId>` and inside the game state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProgress {
    #[serde(default)]
    pub solved_puzzles: BTreeSet<String>,
    /// `"row,col"` keys of restored cells, informational only.
    #[serde(default)]
    pub recovered_areas: BTreeSet<String>,
    /// Hidden test indices answered correctly, per tile id.
    #[serde(default)]
    pub solved_hidden_tests: BTreeMap<String, BTreeSet<usize>>,
}

impl GameProgress {
    pub fn is_solved(&self, tile_id: &str) -> bool {
        self.solved_puzzles.contains(tile_id)
    }

    pub fn tile_status(&self, tile: &InteractiveTile) -> TileStatus {
        if self.is_solved(&tile.id) {
            TileStatus::Solved
        } else if self
            .solved_hidden_tests
            .get(&tile.id)
            .is_some_and(|solved| !solved.is_empty())
        {
            TileStatus::PartiallySolved
        } else {
            TileStatus::Unsolved
        }
    }

    pub fn solved_hidden_count(&self, tile_id: &str) -> usize {
        self.solved_hidden_tests.get(tile_id).map_or(0, BTreeSet::len)
    }

    /// Records a correctly answered hidden test; `index` counts hidden tests only.
    pub fn record_hidden_test(
        &mut self,
        tile: &InteractiveTile,
        index: usize,
    ) -> Result<SolveOutcome> {
        let puzzle = tile
            .puzzle
            .as_ref()
            .ok_or_else(|| GameError::NoPuzzle(tile.id.clone()))?;
        let count = puzzle.hidden_test_count();
        if index >= count {
            return Err(GameError::HiddenTestOutOfRange { index, count });
        }
        if self.is_solved(&tile.id) {
            return Ok(SolveOutcome::NoChange);
        }

        let solved = self.solved_hidden_tests.entry(tile.id.clone()).or_default();
        if !solved.insert(index) {
            return Ok(SolveOutcome::NoChange);
        }

        if (0..count).all(|i| solved.contains(&i)) {
            log::debug!("all {count} hidden tests of {:?} solved", tile.id);
            self.solved_puzzles.insert(tile.id.clone());
            Ok(SolveOutcome::Solved)
        } else {
            Ok(SolveOutcome::Progressed)
        }
    }

    /// Solves a puzzle that has no hidden tests; puzzles with hidden tests only move through
    /// [`Self::record_hidden_test`].
    pub fn reveal(&mut self, tile: &InteractiveTile) -> Result<SolveOutcome> {
        if tile.puzzle.is_none() {
            return Err(GameError::NoPuzzle(tile.id.clone()));
        }
        if self.is_solved(&tile.id) || tile.hidden_test_count() > 0 {
            return Ok(SolveOutcome::NoChange);
        }
        self.solved_puzzles.insert(tile.id.clone());
        Ok(SolveOutcome::Solved)
    }

    pub fn mark_recovered(&mut self, cells: impl IntoIterator<Item = Coord2>) {
        self.recovered_areas.extend(cells.into_iter().map(cell_key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: &str, hidden: usize) -> InteractiveTile {
        let mut tile = InteractiveTile::new(id, (0, 0));
        tile.puzzle = Some(PuzzleInfo {
            description: "echo".into(),
            hints: Vec::new(),
            test_cases: (0..hidden + 1)
                .map(|i| TestCase {
                    input: i.to_string(),
                    expected_output: i.to_string(),
                    is_hidden: i > 0,
                })
                .collect(),
        });
        tile
    }

    #[test]
    fn hidden_tests_move_through_partial_to_solved() {
        let tile = tile("t", 2);
        let mut progress = GameProgress::default();
        assert_eq!(progress.tile_status(&tile), TileStatus::Unsolved);

        assert_eq!(
            progress.record_hidden_test(&tile, 1).unwrap(),
            SolveOutcome::Progressed
        );
        assert_eq!(progress.tile_status(&tile), TileStatus::PartiallySolved);
        assert_eq!(
            progress.record_hidden_test(&tile, 1).unwrap(),
            SolveOutcome::NoChange
        );

        assert_eq!(
            progress.record_hidden_test(&tile, 0).unwrap(),
            SolveOutcome::Solved
        );
        assert_eq!(progress.tile_status(&tile), TileStatus::Solved);
        assert_eq!(progress.solved_hidden_count("t"), 2);
    }

    #[test]
    fn hidden_test_index_is_bounded() {
        let tile = tile("t", 2);
        let mut progress = GameProgress::default();
        assert_eq!(
            progress.record_hidden_test(&tile, 2),
            Err(GameError::HiddenTestOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn reveal_only_solves_puzzles_without_hidden_tests() {
        let mut progress = GameProgress::default();

        let gated = tile("gated", 1);
        assert_eq!(progress.reveal(&gated).unwrap(), SolveOutcome::NoChange);
        assert_eq!(progress.tile_status(&gated), TileStatus::Unsolved);

        let open = tile("open", 0);
        assert_eq!(progress.reveal(&open).unwrap(), SolveOutcome::Solved);
        assert_eq!(progress.reveal(&open).unwrap(), SolveOutcome::NoChange);
        assert!(progress.is_solved("open"));

        let plain = InteractiveTile::new("plain", (0, 0));
        assert_eq!(
            progress.reveal(&plain),
            Err(GameError::NoPuzzle("plain".into()))
        );
    }

    #[test]
    fn solved_is_terminal() {
        let tile = tile("t", 1);
        let mut progress = GameProgress::default();
        progress.record_hidden_test(&tile, 0).unwrap();
        progress.solved_hidden_tests.clear();

        assert_eq!(progress.tile_status(&tile), TileStatus::Solved);
        assert_eq!(
            progress.record_hidden_test(&tile, 0).unwrap(),
            SolveOutcome::NoChange
        );
    }

    #[test]
    fn json_shape_uses_arrays_and_index_lists() {
        let mut progress = GameProgress::default();
        progress.solved_puzzles.insert("a".into());
        progress.mark_recovered([(1, 2), (0, 3)]);
        progress
            .solved_hidden_tests
            .insert("b".into(), BTreeSet::from([2, 0]));

        let json = serde_json::to_value(&progress).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "solvedPuzzles": ["a"],
                "recoveredAreas": ["0,3", "1,2"],
                "solvedHiddenTests": {"b": [0, 2]},
            })
        );
    }
}
