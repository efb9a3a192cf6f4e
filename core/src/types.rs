use serde::{Deserialize, Serialize};

/// Cell size in editor pixels, only used to fill the legacy `x`/`y` fields of tile positions.
pub const CELL_SIZE: usize = 10;

/// Two-dimensional grid coordinates `(row, col)`.
pub type Coord2 = (usize, usize);

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Coord2 {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0, self.1]
    }
}

/// Applies the offset `(row, col)` to a possibly negative `anchor`, returning a value only when
/// it lands inside `bounds`.
pub fn offset_within(anchor: (isize, isize), offset: Coord2, bounds: Coord2) -> Option<Coord2> {
    let (rows, cols) = bounds;

    let row = offset.0.checked_add_signed(anchor.0)?;
    if row >= rows {
        return None;
    }

    let col = offset.1.checked_add_signed(anchor.1)?;
    if col >= cols {
        return None;
    }

    Some((row, col))
}

/// Top-left anchor of a `size` footprint centered on `center`.
pub fn centered_anchor(center: Coord2, size: Coord2) -> (isize, isize) {
    let (center_row, center_col) = center;
    let (height, width) = size;
    (
        center_row as isize - (height / 2) as isize,
        center_col as isize - (width / 2) as isize,
    )
}

/// Position of an interactive tile as written by the map editor.
///
/// Only `row`/`col` carry meaning; `x`/`y` are the editor's pixel offsets and are kept so
/// authored maps round-trip unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePosition {
    #[serde(default)]
    pub x: usize,
    #[serde(default)]
    pub y: usize,
    pub row: usize,
    pub col: usize,
}

impl TilePosition {
    pub const fn new((row, col): Coord2) -> Self {
        Self {
            x: col * CELL_SIZE,
            y: row * CELL_SIZE,
            row,
            col,
        }
    }

    pub const fn coords(&self) -> Coord2 {
        (self.row, self.col)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPos {
    pub row: usize,
    pub col: usize,
}

impl From<Coord2> for GridPos {
    fn from((row, col): Coord2) -> Self {
        Self { row, col }
    }
}

impl GridPos {
    pub const fn coords(&self) -> Coord2 {
        (self.row, self.col)
    }
}

/// Center of the last player sprite placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPosition {
    pub row_index: usize,
    pub col_index: usize,
}

impl From<Coord2> for PlayerPosition {
    fn from((row_index, col_index): Coord2) -> Self {
        Self {
            row_index,
            col_index,
        }
    }
}

impl PlayerPosition {
    pub const fn coords(&self) -> Coord2 {
        (self.row_index, self.col_index)
    }
}

/// Key used by the `recoveredAreas` progress set.
pub fn cell_key((row, col): Coord2) -> String {
    format!("{row},{col}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_within_drops_negative_and_overflowing_targets() {
        assert_eq!(offset_within((-1, 0), (0, 0), (3, 3)), None);
        assert_eq!(offset_within((-1, 0), (1, 2), (3, 3)), Some((0, 2)));
        assert_eq!(offset_within((2, 2), (1, 0), (3, 3)), None);
        assert_eq!(offset_within((2, 2), (0, 0), (3, 3)), Some((2, 2)));
    }

    #[test]
    fn centered_anchor_uses_floor_of_half_size() {
        assert_eq!(centered_anchor((5, 5), (3, 3)), (4, 4));
        assert_eq!(centered_anchor((0, 0), (4, 2)), (-2, -1));
        assert_eq!(centered_anchor((1, 1), (1, 1)), (1, 1));
    }

    #[test]
    fn tile_position_fills_editor_pixel_offsets() {
        let pos = TilePosition::new((3, 7));
        assert_eq!((pos.x, pos.y), (70, 30));
        assert_eq!(pos.coords(), (3, 7));
    }

    #[test]
    fn cell_key_is_row_comma_col() {
        assert_eq!(cell_key((12, 4)), "12,4");
    }
}
