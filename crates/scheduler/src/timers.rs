//! Delayed actions keyed by token.
//!
//! Scheduling under a token that already has a pending action cancels the
//! pending one first, so a burst of triggers collapses into the last one.
//! Actions that have already started are never interrupted.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::trace;

/// Name of a schedulable slot.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TimerToken(&'static str);

impl TimerToken {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: Mutex<HashMap<TimerToken, PendingTimer>>,
    seq: AtomicU64,
}

impl TimerQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs `action` after `delay` unless cancelled or replaced first.
    /// Must be called from within a tokio runtime.
    pub fn schedule_after<F>(self: &Arc<Self>, token: TimerToken, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let action: BoxFuture<'static, ()> = action.boxed();
        let generation = self.seq.fetch_add(1, Ordering::Relaxed);
        let queue: Weak<Self> = Arc::downgrade(self);
        let task_token = token.clone();

        // Hold the map lock across spawn so the task cannot retire its
        // entry before it has been inserted.
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.remove(&token) {
            previous.handle.abort();
            trace!(target: "jobfilter.timers", %token, "replaced pending action");
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(queue) = queue.upgrade() else {
                return;
            };
            {
                let mut pending = queue.pending.lock();
                if pending
                    .get(&task_token)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    pending.remove(&task_token);
                }
            }
            drop(queue);
            action.await;
        })
        .abort_handle();
        pending.insert(token, PendingTimer { generation, handle });
    }

    /// Cancels the pending action for `token`; returns whether one existed.
    pub fn cancel(&self, token: &TimerToken) -> bool {
        match self.pending.lock().remove(token) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, token: &TimerToken) -> bool {
        self.pending.lock().contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn cancel_all(&self) {
        for (_, entry) in self.pending.lock().drain() {
            entry.handle.abort();
        }
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        for (_, entry) in self.pending.get_mut().drain() {
            entry.handle.abort();
        }
    }
}
