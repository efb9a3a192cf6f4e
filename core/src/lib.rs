//! Game state core of a pixel-art recoloring game.
//!
//! Maps start out in grayscale and regain their authored colors area by area as the player
//! solves the puzzles attached to interactive tiles. Progress is kept in a bounded,
//! namespaced key-value store so it survives reloads.

pub use color::*;
pub use engine::*;
pub use error::*;
pub use grid::*;
pub use map::*;
pub use persistence::*;
pub use progress::*;
pub use records::*;
pub use session::*;
pub use storage::*;
pub use types::*;

mod color;
mod engine;
mod error;
mod grid;
mod map;
mod persistence;
mod progress;
mod records;
mod session;
mod storage;
mod types;
