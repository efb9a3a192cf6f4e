use core::cmp::Reverse;
use core::time::Duration;

use crate::*;

/// Minimum time between two runs of [`GamePersistence::run_cleanup_if_due`].
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const CLEANUP_MARKER_KEY: &str = "last_storage_cleanup";

/// Typed access to every persisted record over two stores.
///
/// Writes go to the primary (persistent) store and fall back to the secondary (session) store
/// when that fails. Reads prefer the more recently written copy, the primary one on ties; a
/// record that is missing everywhere or fails validation reads as absent and callers use their
/// in-memory defaults.
pub struct GamePersistence<B, C = SystemClock, S = NoDelay> {
    primary: BoundedStore<B, C, S>,
    fallback: BoundedStore<B, C, S>,
}

impl<B: StorageBackend, C: Clock, S: Sleep> GamePersistence<B, C, S> {
    pub fn new(primary: BoundedStore<B, C, S>, fallback: BoundedStore<B, C, S>) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &BoundedStore<B, C, S> {
        &self.primary
    }

    pub fn fallback(&self) -> &BoundedStore<B, C, S> {
        &self.fallback
    }

    fn stores(&self) -> [&BoundedStore<B, C, S>; 2] {
        [&self.primary, &self.fallback]
    }

    pub async fn save_record<R: Record>(&self, map_id: &str, record: &R) -> bool {
        let key = R::storage_key(map_id);
        if self.primary.save(&key, record).await {
            return true;
        }
        log::warn!("primary store refused {key:?}, using the fallback store");
        self.fallback.save(&key, record).await
    }

    pub async fn load_record<R: Record>(&self, map_id: &str) -> Option<R> {
        let key = R::storage_key(map_id);
        let mut stores = self.stores();
        stores.sort_by_key(|store| Reverse(store.stored_at(&key)));
        for store in stores {
            let Some(record) = store.load::<Option<R>>(&key, None).await else {
                continue;
            };
            match record.upgrade() {
                Ok(record) => return Some(record),
                Err(err) => log::warn!("ignoring {key:?} from {:?}: {err}", store.prefix()),
            }
        }
        None
    }

    pub async fn save_game_state(&self, map_id: &str, state: &SavedGameState) -> bool {
        self.save_record(map_id, state).await
    }

    pub async fn load_game_state(&self, map_id: &str) -> Option<SavedGameState> {
        self.load_record(map_id).await
    }

    pub async fn save_progress(&self, map_id: &str, progress: &GameProgress) -> bool {
        self.save_record(map_id, &ProgressRecord::new(progress.clone()))
            .await
    }

    pub async fn load_progress(&self, map_id: &str) -> GameProgress {
        self.load_record::<ProgressRecord>(map_id)
            .await
            .map(|record| record.progress)
            .unwrap_or_default()
    }

    pub async fn save_player_sprite(&self, sprite: &Sprite) -> bool {
        let record = PlayerSprite::new(sprite.clone(), self.primary.clock().now_millis());
        self.save_record("", &record).await
    }

    pub async fn load_player_sprite(&self) -> Option<Sprite> {
        self.load_record::<PlayerSprite>("")
            .await
            .map(|record| record.pixels)
    }

    pub async fn save_map(&self, map_id: &str, map: &MapData) -> bool {
        self.save_record(map_id, &MapRecord::new(map.clone())).await
    }

    pub async fn load_map(&self, map_id: &str) -> Option<MapData> {
        self.load_record::<MapRecord>(map_id)
            .await
            .map(|record| record.map)
    }

    pub async fn custom_maps(&self) -> CustomMapIndex {
        self.load_record("").await.unwrap_or_default()
    }

    /// Stores an uploaded map and registers it, returning its id.
    pub async fn add_custom_map(
        &self,
        name: &str,
        description: &str,
        map: &MapData,
    ) -> Option<String> {
        let mut index = self.custom_maps().await;
        let id = index.add(name, description, self.primary.clock().now_millis());
        if !self.save_map(&id, map).await {
            return None;
        }
        if !self.save_record("", &index).await {
            self.remove_map(&id).await;
            return None;
        }
        log::info!("added custom map {id:?}");
        Some(id)
    }

    /// Forgets a map together with its saved state and progress.
    pub async fn remove_map(&self, map_id: &str) {
        let keys = [
            MapRecord::storage_key(map_id),
            SavedGameState::storage_key(map_id),
            ProgressRecord::storage_key(map_id),
        ];
        for store in self.stores() {
            for key in &keys {
                store.remove(key);
            }
        }

        let mut index = self.custom_maps().await;
        if index.remove(map_id).is_some() {
            self.save_record("", &index).await;
        }
    }

    pub fn run_cleanup(&self) -> usize {
        self.stores().iter().map(|store| store.run_cleanup()).sum()
    }

    /// Runs [`Self::run_cleanup`] unless it already ran within [`CLEANUP_INTERVAL`], as
    /// remembered by a marker in the fallback store. Returns the number of evicted entries.
    pub async fn run_cleanup_if_due(&self) -> Option<usize> {
        let now = self.primary.clock().now_millis();
        let interval = i64::try_from(CLEANUP_INTERVAL.as_millis()).unwrap_or(i64::MAX);
        if let Some(last) = self.fallback.stored_at(CLEANUP_MARKER_KEY) {
            if now.saturating_sub(last) <= interval {
                log::debug!("storage cleanup already ran at {last}");
                return None;
            }
        }

        let removed = self.run_cleanup();
        log::info!("storage cleanup evicted {removed} entries");
        if !self
            .fallback
            .save(CLEANUP_MARKER_KEY, &serde_json::Map::new())
            .await
        {
            log::warn!("failed to remember the storage cleanup");
        }
        Some(removed)
    }

    pub fn clear_all(&self) -> usize {
        self.stores().iter().map(|store| store.clear_all()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    const NOW: i64 = 1_700_000_000_000;

    fn persistence(
        primary: &MemoryBackend,
        fallback: &MemoryBackend,
    ) -> GamePersistence<MemoryBackend, ManualClock, NoDelay> {
        let clock = ManualClock::at(NOW);
        let store = |backend: &MemoryBackend, config| {
            BoundedStore::new(backend.clone(), clock.clone(), NoDelay::default(), config)
        };
        GamePersistence::new(
            store(primary, StoreConfig::default()),
            store(fallback, StoreConfig::session()),
        )
    }

    fn progress() -> GameProgress {
        let mut progress = GameProgress::default();
        progress.solved_puzzles.insert("trigger_1".into());
        progress.mark_recovered([(0, 0)]);
        progress
    }

    #[test]
    fn progress_round_trips_through_primary() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        let persistence = persistence(&local, &session);

        assert_eq!(
            persistence.save_progress("m", &progress()).now_or_never(),
            Some(true)
        );

        assert!(local.contains("local_game_progress_m"));
        assert!(session.keys().is_empty());
        assert_eq!(
            persistence.load_progress("m").now_or_never(),
            Some(progress())
        );
    }

    #[test]
    fn writes_fall_back_to_the_session_store() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        local.set_disabled(true);
        let persistence = persistence(&local, &session);

        assert_eq!(
            persistence.save_progress("m", &progress()).now_or_never(),
            Some(true)
        );

        assert!(session.contains("session_game_progress_m"));
        assert_eq!(
            persistence.load_progress("m").now_or_never(),
            Some(progress())
        );
    }

    #[test]
    fn newer_fallback_copy_wins_over_an_older_primary_one() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        let persistence = persistence(&local, &session);
        let mut older = GameProgress::default();
        older.solved_puzzles.insert("a".into());
        let mut newer = older.clone();
        newer.solved_puzzles.insert("b".into());

        assert_eq!(
            persistence.save_progress("m", &older).now_or_never(),
            Some(true)
        );
        local.set_disabled(true);
        persistence.primary().clock().advance(Duration::from_secs(5));
        assert_eq!(
            persistence.save_progress("m", &newer).now_or_never(),
            Some(true)
        );
        local.set_disabled(false);

        assert!(local.contains("local_game_progress_m"));
        assert!(session.contains("session_game_progress_m"));
        assert_eq!(persistence.load_progress("m").now_or_never(), Some(newer));

        // once the primary store takes writes again it holds the newest copy
        let mut newest = GameProgress::default();
        newest.solved_puzzles.insert("c".into());
        persistence.primary().clock().advance(Duration::from_secs(5));
        persistence
            .save_progress("m", &newest)
            .now_or_never()
            .unwrap();
        assert_eq!(persistence.load_progress("m").now_or_never(), Some(newest));
    }

    #[test]
    fn both_stores_failing_yields_defaults() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        local.set_disabled(true);
        session.set_disabled(true);
        let persistence = persistence(&local, &session);

        assert_eq!(
            persistence.save_progress("m", &progress()).now_or_never(),
            Some(false)
        );
        assert_eq!(
            persistence.load_progress("m").now_or_never(),
            Some(GameProgress::default())
        );
        assert_eq!(persistence.load_player_sprite().now_or_never(), Some(None));
    }

    #[test]
    fn newer_record_reads_as_absent_but_is_kept() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        local.insert_raw(
            "local_game_progress_m",
            r#"{"version":9,"solvedPuzzles":["x"],"timestamp":1}"#,
        );
        let persistence = persistence(&local, &session);

        assert_eq!(
            persistence.load_progress("m").now_or_never(),
            Some(GameProgress::default())
        );
        assert!(local.contains("local_game_progress_m"));
    }

    #[test]
    fn player_sprite_keeps_its_iso_timestamp() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        let persistence = persistence(&local, &session);
        let mut sprite = Sprite::default();
        sprite.set((4, 5), Some(Color::new("#ABCDEF"))).unwrap();

        assert_eq!(
            persistence.save_player_sprite(&sprite).now_or_never(),
            Some(true)
        );

        let raw = local.raw("local_player-sprite").unwrap();
        assert!(raw.contains(r#""timestamp":"2023-11-14T22:13:20.000Z""#));
        assert_eq!(
            persistence.load_player_sprite().now_or_never(),
            Some(Some(sprite))
        );
    }

    #[test]
    fn custom_maps_are_indexed_and_removed_with_their_state() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        let persistence = persistence(&local, &session);
        let map = MapData::blank((3, 4));

        let id = persistence
            .add_custom_map("Meadow", "first upload", &map)
            .now_or_never()
            .flatten()
            .unwrap();
        assert_eq!(id, format!("custom-{NOW}"));
        assert_eq!(
            persistence.load_map(&id).now_or_never(),
            Some(Some(map.clone()))
        );
        persistence
            .save_progress(&id, &progress())
            .now_or_never()
            .unwrap();

        let index = persistence.custom_maps().now_or_never().unwrap();
        assert_eq!(index.maps.len(), 1);
        assert_eq!(index.maps[0].name, "Meadow");

        persistence.remove_map(&id).now_or_never().unwrap();

        assert_eq!(persistence.load_map(&id).now_or_never(), Some(None));
        assert!(!local.contains(&format!("local_game_progress_{id}")));
        let index = persistence.custom_maps().now_or_never().unwrap();
        assert!(index.maps.is_empty());
    }

    #[test]
    fn cleanup_runs_at_most_once_a_day() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        let persistence = persistence(&local, &session);
        let clock = persistence.primary().clock().clone();
        local.insert_raw("local_bad", "{not json");

        assert_eq!(persistence.run_cleanup_if_due().now_or_never(), Some(Some(1)));
        assert!(!local.contains("local_bad"));
        assert!(session.contains("session_last_storage_cleanup"));

        local.insert_raw("local_bad", "{not json");
        clock.advance(CLEANUP_INTERVAL);
        assert_eq!(persistence.run_cleanup_if_due().now_or_never(), Some(None));
        assert!(local.contains("local_bad"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(persistence.run_cleanup_if_due().now_or_never(), Some(Some(1)));
        assert!(!local.contains("local_bad"));
    }

    #[test]
    fn clear_all_empties_both_namespaces() {
        let (local, session) = (MemoryBackend::new(), MemoryBackend::new());
        let persistence = persistence(&local, &session);
        persistence
            .save_progress("a", &progress())
            .now_or_never()
            .unwrap();
        session.insert_raw("session_game_progress_b", "{}");
        local.insert_raw("other", "{}");

        assert_eq!(persistence.clear_all(), 2);
        assert_eq!(local.keys(), vec!["other".to_owned()]);
        assert!(session.keys().is_empty());
    }
}
