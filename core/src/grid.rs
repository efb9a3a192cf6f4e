use core::ops::{Index, IndexMut};
use ndarray::Array2;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::*;

fn array_from_rows(rows: Vec<Vec<Cell>>) -> Result<Array2<Cell>> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != width) {
        return Err(GameError::RaggedGrid);
    }
    let flat: Vec<Cell> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((height, width), flat).map_err(|_| GameError::RaggedGrid)
}

fn raw_rows<'de, D>(deserializer: D) -> core::result::Result<Vec<Vec<Cell>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Vec::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(cell_from_raw).collect())
        .collect())
}

fn size_of(cells: &Array2<Cell>) -> Coord2 {
    cells.dim()
}

/// One full-map color layer (background or objects).
///
/// Serialized as an array of rows of strings, empty cells are written as `""`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    cells: Array2<Cell>,
}

impl Layer {
    pub fn filled(size: Coord2, fill: Cell) -> Self {
        Self {
            cells: Array2::from_elem(size.to_nd_index(), fill),
        }
    }

    pub fn empty(size: Coord2) -> Self {
        Self::filled(size, None)
    }

    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self> {
        Ok(Self {
            cells: array_from_rows(rows)?,
        })
    }

    /// `(rows, cols)`
    pub fn size(&self) -> Coord2 {
        size_of(&self.cells)
    }

    pub fn contains(&self, (row, col): Coord2) -> bool {
        let (rows, cols) = self.size();
        row < rows && col < cols
    }

    pub fn get(&self, coords: Coord2) -> Option<&Cell> {
        self.cells.get(coords.to_nd_index())
    }

    pub fn set(&mut self, coords: Coord2, cell: Cell) -> Result<()> {
        let slot = self
            .cells
            .get_mut(coords.to_nd_index())
            .ok_or(GameError::InvalidCoords)?;
        *slot = cell;
        Ok(())
    }

    pub fn iter_indexed(&self) -> impl Iterator<Item = (Coord2, &Cell)> {
        self.cells.indexed_iter()
    }

    pub fn map_indexed(&self, mut f: impl FnMut(Coord2, &Cell) -> Cell) -> Self {
        let cells = Array2::from_shape_fn(self.cells.dim(), |coords| {
            f(coords, &self.cells[coords.to_nd_index()])
        });
        Self { cells }
    }

    pub fn to_rows(&self) -> Vec<Vec<Cell>> {
        self.cells.rows().into_iter().map(|row| row.to_vec()).collect()
    }
}

impl Index<Coord2> for Layer {
    type Output = Cell;

    fn index(&self, coords: Coord2) -> &Self::Output {
        &self.cells[coords.to_nd_index()]
    }
}

impl IndexMut<Coord2> for Layer {
    fn index_mut(&mut self, coords: Coord2) -> &mut Self::Output {
        &mut self.cells[coords.to_nd_index()]
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let rows: Vec<Vec<&str>> = self
            .cells
            .rows()
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.as_ref().map_or("", Color::as_str))
                    .collect()
            })
            .collect();
        rows.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Self::from_rows(raw_rows(deserializer)?).map_err(D::Error::custom)
    }
}

/// Player sprite pixels, stamped onto the objects layer centered on a clicked cell.
///
/// Serialized as an array of rows, transparent pixels are written as `null`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sprite {
    pixels: Array2<Cell>,
}

impl Sprite {
    /// Size of a freshly created sprite in the player editor.
    pub const DEFAULT_SIZE: Coord2 = (10, 10);

    pub fn blank(size: Coord2) -> Self {
        Self {
            pixels: Array2::from_elem(size.to_nd_index(), None),
        }
    }

    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self> {
        Ok(Self {
            pixels: array_from_rows(rows)?,
        })
    }

    /// `(height, width)`
    pub fn size(&self) -> Coord2 {
        size_of(&self.pixels)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn set(&mut self, coords: Coord2, pixel: Cell) -> Result<()> {
        let slot = self
            .pixels
            .get_mut(coords.to_nd_index())
            .ok_or(GameError::InvalidCoords)?;
        *slot = pixel;
        Ok(())
    }

    pub fn iter_indexed(&self) -> impl Iterator<Item = (Coord2, &Cell)> {
        self.pixels.indexed_iter()
    }
}

impl Default for Sprite {
    fn default() -> Self {
        Self::blank(Self::DEFAULT_SIZE)
    }
}

impl Index<Coord2> for Sprite {
    type Output = Cell;

    fn index(&self, coords: Coord2) -> &Self::Output {
        &self.pixels[coords.to_nd_index()]
    }
}

impl Serialize for Sprite {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Option<&str>>> = self
            .pixels
            .rows()
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.as_ref().map(Color::as_str))
                    .collect()
            })
            .collect();
        rows.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sprite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Self::from_rows(raw_rows(deserializer)?).map_err(D::Error::custom)
    }
}
