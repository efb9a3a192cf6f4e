use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Background and objects layers have different sizes")]
    GridShapeMismatch,
    #[error("Grid rows have different lengths")]
    RaggedGrid,
    #[error("Recovery area is inverted or out of bounds")]
    InvalidRecoveryArea,
    #[error("No interactive tile with id {0:?}")]
    UnknownTile(String),
    #[error("Interactive tile {0:?} already exists")]
    DuplicateTile(String),
    #[error("No helper point with id {0:?}")]
    UnknownHelper(String),
    #[error("Interactive tile {0:?} has no puzzle")]
    NoPuzzle(String),
    #[error("Hidden test index {index} is out of range, the puzzle has {count}")]
    HiddenTestOutOfRange { index: usize, count: usize },
    #[error("Drawing is unlocked after solving every puzzle")]
    DrawingLocked,
    #[error("No player sprite has been drawn")]
    NoPlayerSprite,
}

pub type Result<T> = core::result::Result<T, GameError>;

/// Failure reported by a [`crate::StorageBackend`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,
    #[error("Storage is not available")]
    Unavailable,
    #[error("Storage error: {0}")]
    Other(String),
}

/// Why a persisted record was rejected.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record version {found} is newer than the supported {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Record does not describe a valid grid: {0}")]
    Shape(#[from] GameError),
}
