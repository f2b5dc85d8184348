//! Sequential request queue
//!
//! Runs queued descriptors one at a time in the order they were enqueued,
//! so a batch of lookups never hits a rate-sensitive upstream all at once.
//!
//! Draining is explicit: `enqueue` only appends, and nothing runs until
//! `drain` is called. A running pump picks up descriptors enqueued while it
//! works and goes idle once the queue is empty.

use futures::FutureExt;
use futures::future::BoxFuture;
use log::{debug, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::error::Result;

/// A unit of queued work. It settles with `Ok` or `Err`; the queue does not
/// care which.
pub type Descriptor = BoxFuture<'static, Result<()>>;

#[derive(Default)]
struct Inner {
    pending: VecDeque<Descriptor>,
    running: bool,
    settled: u64,
}

/// FIFO runner with at most one descriptor in flight.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct SequentialQueue {
    inner: Arc<Mutex<Inner>>,
}

impl SequentialQueue {
    /// Create an empty, idle queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor. Does not start draining.
    pub fn enqueue<F>(&self, descriptor: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.lock().pending.push_back(descriptor.boxed());
    }

    /// Start the pump if the queue is idle and has work.
    ///
    /// Returns the pump's join handle, or `None` if there was nothing to do
    /// or a pump is already running (it will pick up new descriptors).
    pub fn drain(&self) -> Option<JoinHandle<()>> {
        {
            let mut inner = self.lock();
            if inner.running || inner.pending.is_empty() {
                return None;
            }
            inner.running = true;
        }
        debug!("Draining request queue");
        Some(tokio::spawn(pump(self.inner.clone())))
    }

    /// Descriptors waiting to run (excludes the one in flight)
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// True if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// True while a descriptor is in flight
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Descriptors that have settled since the queue was created
    pub fn settled(&self) -> u64 {
        self.lock().settled
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for SequentialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SequentialQueue")
            .field("pending", &inner.pending.len())
            .field("running", &inner.running)
            .field("settled", &inner.settled)
            .finish()
    }
}

/// Marks the queue idle if the pump ends early (aborted or cancelled)
struct IdleOnExit {
    inner: Arc<Mutex<Inner>>,
    armed: bool,
}

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        if self.armed {
            lock_inner(&self.inner).running = false;
            debug!("Request queue pump stopped early");
        }
    }
}

async fn pump(inner: Arc<Mutex<Inner>>) {
    let mut idle = IdleOnExit {
        inner: inner.clone(),
        armed: true,
    };
    loop {
        let next = {
            let mut guard = lock_inner(&inner);
            match guard.pending.pop_front() {
                Some(descriptor) => descriptor,
                None => {
                    // Cleared under the lock so a new drain() cannot race the exit
                    guard.running = false;
                    idle.armed = false;
                    debug!("Request queue idle");
                    return;
                }
            }
        };

        match AssertUnwindSafe(next).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Queued request failed: {}", e),
            Err(_) => warn!("Queued request panicked, continuing with the next one"),
        }
        lock_inner(&inner).settled += 1;
    }
}
