//! Stop signal for a running page: checked before each fetch and held across each draw.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// Cancellation shared by a scheduler and every pipeline it spawned.
///
/// The flag and the guarded action share one lock, so once [`cancel`]
/// returns no guarded action can start or still be running.
///
/// [`cancel`]: CancelToken::cancel
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: Mutex<bool>,
    wake: watch::Sender<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (wake, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                wake,
            }),
        }
    }

    pub fn cancel(&self) {
        // a poisoned lock means a renderer panicked mid-draw; still cancel
        let mut flag = match self.inner.cancelled.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *flag = true;
        drop(flag);
        self.inner.wake.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        match self.inner.cancelled.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Run `f` only if not cancelled. Returns whether it ran.
    pub fn run_unless_cancelled<F: FnOnce()>(&self, f: F) -> bool {
        let Ok(flag) = self.inner.cancelled.lock() else {
            return false;
        };
        if *flag {
            return false;
        }
        f();
        true
    }

    /// Resolves once [`cancel`](CancelToken::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.wake.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
