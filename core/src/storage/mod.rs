//! Namespaced, size-bounded key-value store over a browser-like backend.
//!
//! Every value is stored as a JSON object carrying a `timestamp`. Writes are refused when a
//! single value cannot fit at all, make room by evicting stale and then large entries, and
//! retry with exponential backoff. Nothing here ever returns an error to the caller: failures
//! are logged and turn into `false` or the caller's fallback.

use core::time::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::*;

mod clock;
mod memory;

pub use clock::*;
pub use memory::*;

/// Entries older than this are evicted before any fresher one.
pub const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// First backoff delay, doubled on every further retry.
pub const BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Upper bound of a single backoff delay.
pub const BACKOFF_CAP: Duration = Duration::from_millis(1000);

const TIMESTAMP_FIELD: &str = "timestamp";

/// Minimal capability set of a browser `Storage` object.
pub trait StorageBackend {
    fn get(&self, key: &str) -> core::result::Result<Option<String>, BackendError>;
    fn set(&self, key: &str, value: &str) -> core::result::Result<(), BackendError>;
    fn remove(&self, key: &str) -> core::result::Result<(), BackendError>;
    fn key(&self, index: usize) -> Option<String>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Persistent,
    Session,
}

impl BackendKind {
    /// Key prefix separating the namespaces of both kinds.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Persistent => "local_",
            Self::Session => "session_",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Attempts per read or write; `0` turns every save into a refusal.
    pub max_retries: u32,
    pub max_storage_size_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Persistent,
            max_retries: 3,
            max_storage_size_bytes: 5 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    pub fn session() -> Self {
        Self {
            backend: BackendKind::Session,
            ..Self::default()
        }
    }

    /// Usage at which eviction stops, 80% of the ceiling.
    pub const fn eviction_target(&self) -> usize {
        self.max_storage_size_bytes / 5 * 4 + self.max_storage_size_bytes % 5 * 4 / 5
    }
}

/// Size of `text` as counted by browsers, two bytes per UTF-16 unit.
pub fn utf16_bytes(text: &str) -> usize {
    text.encode_utf16().count() * 2
}

fn entry_bytes(key: &str, value: &str) -> usize {
    utf16_bytes(key) + utf16_bytes(value)
}

/// Delay before retry number `retry` (starting at 1).
pub fn backoff_delay(retry: u32) -> Duration {
    let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
    BACKOFF_BASE.saturating_mul(factor).min(BACKOFF_CAP)
}

/// Millisecond timestamp of a stored entry, either epoch millis or RFC 3339.
fn stored_timestamp(value: &Value) -> Option<i64> {
    match value.get(TIMESTAMP_FIELD)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|ms| ms as i64)),
        Value::String(iso) => chrono::DateTime::parse_from_rfc3339(iso)
            .ok()
            .map(|parsed| parsed.timestamp_millis()),
        _ => None,
    }
}

/// Entries without a readable timestamp count as written `now`.
fn entry_timestamp(value: &Value, now: i64) -> i64 {
    stored_timestamp(value).unwrap_or(now)
}

fn decode<T: DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    let mut value: Value = serde_json::from_str(raw)?;
    if let Value::Object(fields) = &mut value {
        if fields.get(TIMESTAMP_FIELD).is_some_and(Value::is_number) {
            fields.remove(TIMESTAMP_FIELD);
        }
    }
    T::deserialize(value)
}

#[derive(Debug)]
struct EvictionCandidate {
    key: String,
    size: usize,
    stale: bool,
}

/// Bounded store over one namespace of a [`StorageBackend`].
///
/// The store is meant to be constructed once per context and passed down. Two stores with the
/// same [`BackendKind`] over the same backend share their namespace; the later write wins.
#[derive(Clone, Debug)]
pub struct BoundedStore<B, C = SystemClock, S = NoDelay> {
    backend: B,
    clock: C,
    sleeper: S,
    config: StoreConfig,
}

impl<B: StorageBackend> BoundedStore<B> {
    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        Self::new(backend, SystemClock, NoDelay::default(), config)
    }
}

impl<B: StorageBackend, C: Clock, S: Sleep> BoundedStore<B, C, S> {
    pub fn new(backend: B, clock: C, sleeper: S, config: StoreConfig) -> Self {
        Self {
            backend,
            clock,
            sleeper,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn prefix(&self) -> &'static str {
        self.config.backend.prefix()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix())
    }

    fn namespaced_keys(&self) -> Vec<String> {
        let prefix = self.prefix();
        (0..self.backend.len())
            .filter_map(|index| self.backend.key(index))
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    /// Probes the backend with a throwaway write.
    pub fn is_available(&self) -> bool {
        let probe = format!("{}storage_test_{}", self.prefix(), self.clock.now_millis());
        match self
            .backend
            .set(&probe, "test")
            .and_then(|()| self.backend.remove(&probe))
        {
            Ok(()) => true,
            Err(err) => {
                log::debug!("storage {:?} unavailable: {err}", self.config.backend);
                false
            }
        }
    }

    /// Bytes taken by this namespace, keys included.
    pub fn usage_bytes(&self) -> usize {
        self.namespaced_keys()
            .iter()
            .filter_map(|key| {
                let value = self.backend.get(key).ok()??;
                Some(entry_bytes(key, &value))
            })
            .sum()
    }

    fn serialize_with_timestamp<T: Serialize + ?Sized>(&self, value: &T) -> Option<String> {
        let mut fields: Map<String, Value> = match serde_json::to_value(value) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                log::warn!("refusing to store a non-object value: {other}");
                return None;
            }
            Err(err) => {
                log::warn!("failed to serialize value: {err}");
                return None;
            }
        };
        if !fields.contains_key(TIMESTAMP_FIELD) {
            fields.insert(TIMESTAMP_FIELD.into(), self.clock.now_millis().into());
        }
        serde_json::to_string(&fields)
            .inspect_err(|err| log::warn!("failed to serialize value: {err}"))
            .ok()
    }

    /// Stores `value` under `key`, returns whether it was written.
    ///
    /// `value` must serialize to a JSON object; a `timestamp` field is added unless present.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        if !self.is_available() {
            return false;
        }
        let Some(serialized) = self.serialize_with_timestamp(value) else {
            return false;
        };

        let data_size = utf16_bytes(&serialized);
        let max = self.config.max_storage_size_bytes;
        if data_size > max {
            log::warn!("value for {key:?} takes {data_size} bytes, over the {max} byte ceiling");
            return false;
        }
        if self.usage_bytes() + data_size > max {
            self.evict();
        }

        let full_key = self.full_key(key);
        let attempts = self.config.max_retries;
        for attempt in 0..attempts {
            if attempt > 0 {
                self.sleeper.sleep(backoff_delay(attempt)).await;
            }
            match self.backend.set(&full_key, &serialized) {
                Ok(()) => return true,
                Err(BackendError::QuotaExceeded) => {
                    log::warn!("quota exceeded saving {key:?}, attempt {}", attempt + 1);
                    self.evict();
                }
                Err(err) => {
                    log::warn!("failed saving {key:?}, attempt {}: {err}", attempt + 1);
                }
            }
        }
        log::error!("giving up saving {key:?} after {attempts} attempts");
        false
    }

    /// Reads `key`, returning `fallback` when it is absent or unreadable.
    ///
    /// Entries that keep failing to decode are considered corrupted and deleted.
    pub async fn load<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        if !self.is_available() {
            return fallback;
        }

        let full_key = self.full_key(key);
        let attempts = self.config.max_retries;
        let mut corrupted = false;
        for attempt in 0..attempts {
            if attempt > 0 {
                self.sleeper.sleep(backoff_delay(attempt)).await;
            }
            match self.backend.get(&full_key) {
                Ok(None) => return fallback,
                Ok(Some(raw)) => match decode(&raw) {
                    Ok(value) => return value,
                    Err(err) => {
                        log::debug!("failed decoding {key:?}, attempt {}: {err}", attempt + 1);
                        corrupted = true;
                    }
                },
                Err(err) => {
                    log::warn!("failed loading {key:?}, attempt {}: {err}", attempt + 1);
                    corrupted = false;
                }
            }
        }

        if corrupted {
            log::warn!("deleting corrupted entry {key:?}");
            if let Err(err) = self.backend.remove(&full_key) {
                log::warn!("failed deleting {key:?}: {err}");
            }
        }
        fallback
    }

    /// When the entry under `key` was written, if it carries a readable timestamp.
    pub fn stored_at(&self, key: &str) -> Option<i64> {
        let raw = self.backend.get(&self.full_key(key)).ok()??;
        let value = serde_json::from_str(&raw).ok()?;
        stored_timestamp(&value)
    }

    /// Deletes a single entry.
    pub fn remove(&self, key: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        self.backend.remove(&self.full_key(key)).is_ok()
    }

    /// Runs eviction on demand, returns how many entries were removed.
    pub fn run_cleanup(&self) -> usize {
        if !self.is_available() {
            return 0;
        }
        self.evict()
    }

    /// Removes every entry of this namespace and nothing else.
    pub fn clear_all(&self) -> usize {
        if !self.is_available() {
            return 0;
        }
        let removed = self
            .namespaced_keys()
            .into_iter()
            .filter(|key| self.backend.remove(key).is_ok())
            .count();
        log::info!("cleared {removed} entries under {:?}", self.prefix());
        removed
    }

    /// Drops corrupted entries, then stale ones and then the largest until usage falls to the
    /// eviction target.
    fn evict(&self) -> usize {
        let now = self.clock.now_millis();
        let retention = i64::try_from(RETENTION.as_millis()).unwrap_or(i64::MAX);

        let mut removed = 0;
        let mut usage = 0;
        let mut candidates = Vec::new();
        for key in self.namespaced_keys() {
            let Ok(Some(raw)) = self.backend.get(&key) else {
                continue;
            };
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    let size = entry_bytes(&key, &raw);
                    usage += size;
                    let age = now.saturating_sub(entry_timestamp(&value, now));
                    candidates.push(EvictionCandidate {
                        key,
                        size,
                        stale: age > retention,
                    });
                }
                Err(err) => {
                    log::debug!("removing unparseable entry {key:?}: {err}");
                    if self.backend.remove(&key).is_ok() {
                        removed += 1;
                    }
                }
            }
        }

        candidates.sort_by(|a, b| b.stale.cmp(&a.stale).then(b.size.cmp(&a.size)));

        let target = self.config.eviction_target();
        for candidate in candidates {
            if usage <= target {
                break;
            }
            if self.backend.remove(&candidate.key).is_ok() {
                usage -= candidate.size;
                removed += 1;
            }
        }

        log::debug!("eviction removed {removed} entries, {usage} bytes left");
        removed
    }
}
