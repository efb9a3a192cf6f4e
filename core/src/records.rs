//! Versioned schemas of everything the game persists.
//!
//! Records written before versioning carry no `version` and read as version 0; they are
//! accepted and bumped to [`RECORD_VERSION`]. Records from a newer build are rejected.

use chrono::{DateTime, SecondsFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::*;

pub const RECORD_VERSION: u32 = 1;

pub trait Record: Serialize + DeserializeOwned {
    /// Storage key, or key prefix followed by the map id for per-map records.
    const KEY: &'static str;
    const PER_MAP: bool = false;

    fn version(&self) -> u32;
    fn set_version(&mut self, version: u32);

    /// Extra shape checks beyond what deserializing already guarantees.
    fn validate(&self) -> core::result::Result<(), RecordError> {
        Ok(())
    }

    fn storage_key(map_id: &str) -> String {
        if Self::PER_MAP {
            format!("{}{map_id}", Self::KEY)
        } else {
            Self::KEY.to_owned()
        }
    }

    /// Accepts a freshly decoded record, migrating legacy ones to the current version.
    fn upgrade(mut self) -> core::result::Result<Self, RecordError> {
        let found = self.version();
        if found > RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found,
                supported: RECORD_VERSION,
            });
        }
        self.validate()?;
        if found < RECORD_VERSION {
            log::debug!("migrating {} record from version {found}", Self::KEY);
            self.set_version(RECORD_VERSION);
        }
        Ok(self)
    }

    fn from_json(json: &str) -> core::result::Result<Self, RecordError> {
        serde_json::from_str::<Self>(json)?.upgrade()
    }
}

macro_rules! versioned {
    () => {
        fn version(&self) -> u32 {
            self.version
        }

        fn set_version(&mut self, version: u32) {
            self.version = version;
        }
    };
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredColors {
    pub background_layer: Layer,
    pub objects_layer: Layer,
}

/// `game_state_<mapId>`: everything needed to resume a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGameState {
    #[serde(default)]
    pub version: u32,
    pub recovered_colors: RecoveredColors,
    #[serde(default)]
    pub helper_points: Vec<HelperPoint>,
    #[serde(default)]
    pub game_progress: GameProgress,
    #[serde(default)]
    pub last_player_position: Option<PlayerPosition>,
}

impl Record for SavedGameState {
    const KEY: &'static str = "game_state_";
    const PER_MAP: bool = true;

    versioned!();

    fn validate(&self) -> core::result::Result<(), RecordError> {
        let colors = &self.recovered_colors;
        if colors.background_layer.size() != colors.objects_layer.size() {
            return Err(GameError::GridShapeMismatch.into());
        }
        Ok(())
    }
}

/// `game_progress_<mapId>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(flatten)]
    pub progress: GameProgress,
}

impl ProgressRecord {
    pub fn new(progress: GameProgress) -> Self {
        Self {
            version: RECORD_VERSION,
            progress,
        }
    }
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self::new(GameProgress::default())
    }
}

impl Record for ProgressRecord {
    const KEY: &'static str = "game_progress_";
    const PER_MAP: bool = true;

    versioned!();
}

/// `player-sprite`, shared by every map.
///
/// Its `timestamp` is an ISO-8601 string rather than the store's numeric one, so it survives
/// loading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSprite {
    #[serde(default)]
    pub version: u32,
    pub pixels: Sprite,
    #[serde(default)]
    pub timestamp: String,
}

impl PlayerSprite {
    pub fn new(pixels: Sprite, now_millis: i64) -> Self {
        let timestamp = DateTime::from_timestamp_millis(now_millis)
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        Self {
            version: RECORD_VERSION,
            pixels,
            timestamp,
        }
    }
}

impl Record for PlayerSprite {
    const KEY: &'static str = "player-sprite";

    versioned!();
}

/// `map_<mapId>`: an authored map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(flatten)]
    pub map: MapData,
}

impl MapRecord {
    pub fn new(map: MapData) -> Self {
        Self {
            version: RECORD_VERSION,
            map,
        }
    }
}

impl Record for MapRecord {
    const KEY: &'static str = "map_";
    const PER_MAP: bool = true;

    versioned!();

    fn validate(&self) -> core::result::Result<(), RecordError> {
        Ok(self.map.validate()?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMapEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// `custom_maps`: maps uploaded by the player, each stored under its own `map_<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMapIndex {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub maps: Vec<CustomMapEntry>,
}

impl Default for CustomMapIndex {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            maps: Vec::new(),
        }
    }
}

impl CustomMapIndex {
    /// Registers a new map and returns its `custom-<millis>` id.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        now_millis: i64,
    ) -> String {
        let mut id = format!("custom-{now_millis}");
        let mut suffix = 1;
        while self.get(&id).is_some() {
            id = format!("custom-{now_millis}-{suffix}");
            suffix += 1;
        }
        self.maps.push(CustomMapEntry {
            id: id.clone(),
            name: name.into(),
            description: description.into(),
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<&CustomMapEntry> {
        self.maps.iter().find(|entry| entry.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<CustomMapEntry> {
        let index = self.maps.iter().position(|entry| entry.id == id)?;
        Some(self.maps.remove(index))
    }
}

impl Record for CustomMapIndex {
    const KEY: &'static str = "custom_maps";

    versioned!();
}
