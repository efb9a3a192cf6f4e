use core::future::Future;
use core::time::Duration;
use gloo::timers::future::TimeoutFuture;
use recolor_core::{BackendError, BackendKind, Sleep, StorageBackend};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{DomException, Storage};

/// Legacy `DOMException.code` of a quota error, still the only signal on some browsers.
const QUOTA_EXCEEDED_CODE: u16 = 22;

/// `window.localStorage` or `window.sessionStorage`.
///
/// Blocked or missing storage (no window, privacy settings) makes every call fail with
/// [`BackendError::Unavailable`].
#[derive(Clone, Debug)]
pub struct WebStorage {
    storage: Option<Storage>,
}

impl WebStorage {
    pub fn local() -> Self {
        Self {
            storage: web_sys::window().and_then(|window| window.local_storage().ok().flatten()),
        }
    }

    pub fn session() -> Self {
        Self {
            storage: web_sys::window().and_then(|window| window.session_storage().ok().flatten()),
        }
    }

    pub fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Persistent => Self::local(),
            BackendKind::Session => Self::session(),
        }
    }

    fn storage(&self) -> Result<&Storage, BackendError> {
        self.storage.as_ref().ok_or(BackendError::Unavailable)
    }
}

fn backend_error(err: JsValue) -> BackendError {
    match err.dyn_ref::<DomException>() {
        Some(exception)
            if exception.name() == "QuotaExceededError"
                || exception.name() == "NS_ERROR_DOM_QUOTA_REACHED"
                || exception.code() == QUOTA_EXCEEDED_CODE =>
        {
            BackendError::QuotaExceeded
        }
        Some(exception) if exception.name() == "SecurityError" => BackendError::Unavailable,
        Some(exception) => BackendError::Other(exception.message()),
        None => BackendError::Other(format!("{err:?}")),
    }
}

impl StorageBackend for WebStorage {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.storage()?.get_item(key).map_err(backend_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.storage()?.set_item(key, value).map_err(backend_error)
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.storage()?.remove_item(key).map_err(backend_error)
    }

    fn key(&self, index: usize) -> Option<String> {
        let index = u32::try_from(index).ok()?;
        self.storage.as_ref()?.key(index).ok().flatten()
    }

    fn len(&self) -> usize {
        self.storage
            .as_ref()
            .and_then(|storage| storage.length().ok())
            .map_or(0, |length| length as usize)
    }
}

/// Backoff sleeper on top of `setTimeout`.
#[derive(Copy, Clone, Debug, Default)]
pub struct GlooSleep;

impl Sleep for GlooSleep {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        TimeoutFuture::new(u32::try_from(duration.as_millis()).unwrap_or(u32::MAX))
    }
}
