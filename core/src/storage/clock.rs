use core::cell::{Cell, RefCell};
use core::future::{Future, ready};
use core::time::Duration;
use std::rc::Rc;

/// Wall-clock time source, milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Real time, backed by `web-time` so it also works on wasm32.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        web_time::SystemTime::now()
            .duration_since(web_time::UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}

/// Clock that only moves when told to, clones share the same instant.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn at(now_millis: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_millis)),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.set(now_millis);
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }
}

/// Suspends the caller between retries.
pub trait Sleep {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Completes immediately, remembering every requested delay.
#[derive(Clone, Debug, Default)]
pub struct NoDelay {
    requested: Rc<RefCell<Vec<Duration>>>,
}

impl NoDelay {
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.borrow().clone()
    }
}

impl Sleep for NoDelay {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        self.requested.borrow_mut().push(duration);
        ready(())
    }
}
