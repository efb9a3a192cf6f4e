//! Grid state transformations shared by the game session and the map editor.
//!
//! Everything here is deterministic and free of I/O; layers are edited in place.

use hashbrown::HashSet;
use std::collections::BTreeSet;

use crate::*;

/// Converts every non-tile cell of both layers to its gray equivalent.
///
/// Cells under an interactive tile keep their authored color so triggers stay recognizable,
/// empty cells stay empty. This is lossy and meant to be applied once when a map is loaded.
pub fn to_grayscale(
    background: &Layer,
    objects: &Layer,
    tiles: &[InteractiveTile],
) -> (Layer, Layer) {
    let tile_cells: HashSet<Coord2> = tiles.iter().map(InteractiveTile::coords).collect();
    let convert = |layer: &Layer| {
        layer.map_indexed(|coords, cell| {
            if tile_cells.contains(&coords) {
                cell.clone()
            } else {
                cell.as_ref().map(Color::to_grayscale)
            }
        })
    };
    (convert(background), convert(objects))
}

fn restore_cell(current: &mut Layer, original: &Layer, coords: Coord2) -> bool {
    match (current.get(coords).is_some(), original.get(coords)) {
        (true, Some(cell)) => {
            current[coords] = cell.clone();
            true
        }
        _ => false,
    }
}

/// Copies the authored colors inside `area` back into the current layers.
///
/// The area is clamped to the grid. Whatever the current layers hold there is overwritten,
/// player sprite pixels included. Returns the restored cells in row major order.
pub fn apply_recovery_area(
    current_background: &mut Layer,
    current_objects: &mut Layer,
    original_background: &Layer,
    original_objects: &Layer,
    area: &RecoveryArea,
) -> Vec<Coord2> {
    area.iter_within(current_background.size())
        .filter(|&coords| {
            let background = restore_cell(current_background, original_background, coords);
            let objects = restore_cell(current_objects, original_objects, coords);
            background || objects
        })
        .collect()
}

/// Whether every tile carrying a puzzle has been solved. Tiles without a puzzle never block.
pub fn compute_win_condition(
    tiles: &[InteractiveTile],
    solved_puzzle_ids: &BTreeSet<String>,
) -> bool {
    tiles
        .iter()
        .filter(|tile| tile.puzzle.is_some())
        .all(|tile| solved_puzzle_ids.contains(&tile.id))
}

/// Stamps the opaque sprite pixels onto `objects`, centered on `center`.
///
/// Transparent pixels leave the objects layer untouched; pixels falling outside the grid are
/// dropped.
pub fn stamp_sprite(objects: &mut Layer, sprite: &Sprite, center: Coord2) {
    let anchor = centered_anchor(center, sprite.size());
    let bounds = objects.size();
    for (offset, pixel) in sprite.iter_indexed() {
        let Some(color) = pixel else {
            continue;
        };
        if let Some(coords) = offset_within(anchor, offset, bounds) {
            objects[coords] = Some(color.clone());
        }
    }
}

/// Clears the whole rectangular footprint the sprite occupied when centered on `last_center`.
///
/// This is a blind clear, not an undo: cells are emptied whatever they currently hold.
pub fn unstamp_sprite(objects: &mut Layer, sprite: &Sprite, last_center: Coord2) {
    let size = sprite.size();
    let anchor = centered_anchor(last_center, size);
    let bounds = objects.size();
    let (height, width) = size;
    for offset in (0..height).flat_map(|row| (0..width).map(move |col| (row, col))) {
        if let Some(coords) = offset_within(anchor, offset, bounds) {
            objects[coords] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(hex: &str) -> Cell {
        Some(Color::new(hex))
    }

    fn colorful(size: Coord2) -> Layer {
        Layer::filled(size, None).map_indexed(|(row, col), _| {
            Some(Color::from_rgb(
                (row * 40) as u8,
                (col * 50) as u8,
                ((row + col) * 17) as u8,
            ))
        })
    }

    fn tile_with_puzzle(id: &str, coords: Coord2) -> InteractiveTile {
        let mut tile = InteractiveTile::new(id, coords);
        tile.puzzle = Some(PuzzleInfo::default());
        tile
    }

    #[test]
    fn grayscale_sets_equal_channels_to_luminance() {
        let background = colorful((4, 4));
        let objects = colorful((4, 4));

        let (gray_bg, gray_obj) = to_grayscale(&background, &objects, &[]);

        for (coords, cell) in background.iter_indexed() {
            let original = cell.as_ref().unwrap();
            let luminance = original.luminance().unwrap();
            for layer in [&gray_bg, &gray_obj] {
                let gray = layer[coords].as_ref().unwrap();
                assert_eq!(gray.rgb(), Some((luminance, luminance, luminance)));
            }
        }
    }

    #[test]
    fn grayscale_keeps_tile_cells_and_empty_cells() {
        let background = colorful((3, 3));
        let mut objects = colorful((3, 3));
        objects[(2, 2)] = None;
        let tiles = [InteractiveTile::new("t", (1, 2))];

        let (gray_bg, gray_obj) = to_grayscale(&background, &objects, &tiles);

        assert_eq!(gray_bg[(1, 2)], background[(1, 2)]);
        assert_eq!(gray_obj[(1, 2)], objects[(1, 2)]);
        assert_eq!(gray_obj[(2, 2)], None);
        assert_ne!(gray_bg[(1, 1)], background[(1, 1)]);
    }

    #[test]
    fn grayscale_is_stable_on_gray_input() {
        let background = colorful((3, 3));
        let (once, _) = to_grayscale(&background, &background, &[]);
        let (twice, _) = to_grayscale(&once, &once, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn recovery_restores_exactly_the_area() {
        let original_bg = colorful((5, 5));
        let original_obj = Layer::filled((5, 5), c("#010101"));
        let (mut bg, mut obj) = to_grayscale(&original_bg, &original_obj, &[]);
        obj[(2, 3)] = c("#ff00ff");
        let (before_bg, before_obj) = (bg.clone(), obj.clone());

        let restored = apply_recovery_area(
            &mut bg,
            &mut obj,
            &original_bg,
            &original_obj,
            &RecoveryArea::new((2, 2), (3, 3)),
        );

        assert_eq!(restored, vec![(2, 2), (2, 3), (3, 2), (3, 3)]);
        for row in 0..5 {
            for col in 0..5 {
                let inside = (2..=3).contains(&row) && (2..=3).contains(&col);
                let (expect_bg, expect_obj) = if inside {
                    (&original_bg, &original_obj)
                } else {
                    (&before_bg, &before_obj)
                };
                assert_eq!(bg[(row, col)], expect_bg[(row, col)]);
                assert_eq!(obj[(row, col)], expect_obj[(row, col)]);
            }
        }
    }

    #[test]
    fn recovery_is_clamped_to_the_grid() {
        let original = colorful((3, 3));
        let mut bg = Layer::empty((3, 3));
        let mut obj = Layer::empty((3, 3));

        let restored = apply_recovery_area(
            &mut bg,
            &mut obj,
            &original,
            &original,
            &RecoveryArea::new((1, 1), (10, 10)),
        );

        assert_eq!(restored.len(), 4);
        assert_eq!(bg[(2, 2)], original[(2, 2)]);
        assert_eq!(bg[(0, 0)], None);
    }

    #[test]
    fn win_condition_ignores_tiles_without_puzzles() {
        let mut solved = BTreeSet::new();
        let plain = [InteractiveTile::new("plain", (0, 0))];
        assert!(compute_win_condition(&plain, &solved));
        assert!(compute_win_condition(&[], &solved));

        let tiles = [
            tile_with_puzzle("a", (0, 0)),
            InteractiveTile::new("plain", (0, 1)),
            tile_with_puzzle("b", (0, 2)),
        ];
        assert!(!compute_win_condition(&tiles, &solved));
        solved.insert("a".to_owned());
        assert!(!compute_win_condition(&tiles, &solved));
        solved.insert("b".to_owned());
        assert!(compute_win_condition(&tiles, &solved));
    }

    #[test]
    fn stamp_skips_transparent_and_out_of_bounds_pixels() {
        let sprite = Sprite::from_rows(vec![
            vec![c("#aa0000"), None, c("#aa0000")],
            vec![None, c("#00aa00"), None],
            vec![c("#0000aa"), None, c("#0000aa")],
        ])
        .unwrap();
        let mut objects = Layer::filled((3, 3), c("#999999"));

        stamp_sprite(&mut objects, &sprite, (0, 0));

        // anchor is (-1, -1), only the lower right 2x2 of the sprite lands
        assert_eq!(objects[(0, 0)], c("#00aa00"));
        assert_eq!(objects[(0, 1)], c("#999999"));
        assert_eq!(objects[(1, 0)], c("#999999"));
        assert_eq!(objects[(1, 1)], c("#0000aa"));
        assert_eq!(objects[(2, 2)], c("#999999"));
    }

    #[test]
    fn unstamp_after_stamp_restores_empty_footprint() {
        let mut sprite = Sprite::blank((2, 3));
        sprite.set((0, 0), c("#123123")).unwrap();
        sprite.set((1, 2), c("#321321")).unwrap();
        let mut objects = Layer::empty((6, 6));
        objects[(5, 5)] = c("#abcabc");
        let before = objects.clone();

        stamp_sprite(&mut objects, &sprite, (3, 3));
        assert_ne!(objects, before);
        unstamp_sprite(&mut objects, &sprite, (3, 3));

        assert_eq!(objects, before);
    }

    #[test]
    fn unstamp_is_a_blind_rectangular_clear() {
        let sprite = Sprite::blank((3, 3));
        let mut objects = Layer::filled((4, 4), c("#777777"));

        unstamp_sprite(&mut objects, &sprite, (0, 0));

        assert_eq!(objects[(0, 0)], None);
        assert_eq!(objects[(1, 1)], None);
        assert_eq!(objects[(2, 2)], c("#777777"));
        assert_eq!(objects[(0, 2)], c("#777777"));
    }
}
