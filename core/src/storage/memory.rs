use core::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::*;

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
    disabled: bool,
}

impl MemoryInner {
    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(key, value)| entry_bytes(key, value))
            .sum()
    }

    fn check_enabled(&self) -> core::result::Result<(), BackendError> {
        if self.disabled {
            Err(BackendError::Unavailable)
        } else {
            Ok(())
        }
    }
}

/// In-process key-value backend with browser storage semantics.
///
/// Clones share the same entries, which lets several stores (or a test) look at one backend.
/// An optional quota makes writes fail with [`BackendError::QuotaExceeded`] like a full
/// browser store, and a disabled backend fails every call like blocked storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        let backend = Self::default();
        backend.inner.borrow_mut().quota_bytes = Some(quota_bytes);
        backend
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.inner.borrow_mut().disabled = disabled;
    }

    /// Writes an entry directly, bypassing quota and the disabled flag.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .borrow_mut()
            .entries
            .insert(key.into(), value.into());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> core::result::Result<Option<String>, BackendError> {
        let inner = self.inner.borrow();
        inner.check_enabled()?;
        Ok(inner.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> core::result::Result<(), BackendError> {
        let mut inner = self.inner.borrow_mut();
        inner.check_enabled()?;
        if let Some(quota) = inner.quota_bytes {
            if inner.used_bytes_without(key) + entry_bytes(key, value) > quota {
                return Err(BackendError::QuotaExceeded);
            }
        }
        inner.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> core::result::Result<(), BackendError> {
        let mut inner = self.inner.borrow_mut();
        inner.check_enabled()?;
        inner.entries.remove(key);
        Ok(())
    }

    fn key(&self, index: usize) -> Option<String> {
        let inner = self.inner.borrow();
        if inner.disabled {
            return None;
        }
        inner.entries.keys().nth(index).cloned()
    }

    fn len(&self) -> usize {
        let inner = self.inner.borrow();
        if inner.disabled { 0 } else { inner.entries.len() }
    }
}
