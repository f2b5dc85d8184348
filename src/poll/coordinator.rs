//! Polling Coordinator - pausable, haltable change checker
//!
//! One spawned task per coordinator. Each iteration:
//! - waits for the next tick (or an early wake from a hint, or halt)
//! - skips the tick if paused
//! - fetches, and notifies `on_change` only when the value differs from the
//!   last observation
//!
//! The next wait starts only after the fetch settles, so two fetches never
//! overlap. The first fetch failure halts the coordinator for good.

use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, watch};

use super::fetch::Fetch;
use super::state::{PollState, PollStats};
use super::throttle::{DEFAULT_HINT_WINDOW, HintThrottle};
use crate::clock::{Clock, TokioClock};
use crate::error::{Result, WatchError};

/// Callback invoked with each newly observed value
pub type ChangeCallback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Why the task woke up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Tick,
    Hint,
    Halted,
}

struct Shared<T> {
    state: watch::Sender<PollState>,
    hint: Notify,
    throttle: Mutex<HintThrottle>,
    last_observed: Mutex<Option<T>>,
    stats: Mutex<PollStats>,
    last_error: Mutex<Option<String>>,
    clock: Mutex<Arc<dyn Clock>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T> Shared<T>
where
    T: PartialEq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn current(&self) -> PollState {
        *self.state.borrow()
    }

    fn stats_mut(&self) -> MutexGuard<'_, PollStats> {
        lock(&self.stats)
    }

    fn clock(&self) -> Arc<dyn Clock> {
        lock(&self.clock).clone()
    }

    /// Move to `Halted`. Returns true if this call made the transition.
    fn halt(&self) -> bool {
        self.state.send_if_modified(|s| {
            if s.is_terminal() {
                false
            } else {
                *s = PollState::Halted;
                true
            }
        })
    }

    async fn wait(&self, delay: Duration, state_rx: &mut watch::Receiver<PollState>) -> Wake {
        let clock = self.clock();
        tokio::select! {
            biased;
            _ = state_rx.wait_for(|s| s.is_terminal()) => Wake::Halted,
            _ = self.hint.notified() => Wake::Hint,
            _ = clock.sleep(delay) => Wake::Tick,
        }
    }

    fn observe(&self, value: T, on_change: &ChangeCallback<T>) {
        let changed = {
            let mut last = lock(&self.last_observed);
            if last.as_ref() == Some(&value) {
                false
            } else {
                *last = Some(value.clone());
                true
            }
        };
        if changed {
            self.stats_mut().changes += 1;
            debug!("Observed change: {:?}", value);
            on_change(value);
        }
    }
}

/// Marks the coordinator halted when the task ends, however it ends
struct HaltOnExit<T>(Arc<Shared<T>>)
where
    T: PartialEq + Clone + std::fmt::Debug + Send + Sync + 'static;

impl<T> Drop for HaltOnExit<T>
where
    T: PartialEq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.0.halt();
    }
}

/// Periodic change checker over an injected fetch
pub struct PollingCoordinator<F: Fetch> {
    interval: Duration,
    initial_delay: Duration,
    fetch: F,
    on_change: ChangeCallback<F::Output>,
    shared: Arc<Shared<F::Output>>,
}

impl<F> PollingCoordinator<F>
where
    F: Fetch + 'static,
{
    /// Create an idle coordinator.
    ///
    /// `interval` must be non-zero.
    pub fn new(
        interval: Duration,
        fetch: F,
        on_change: impl Fn(F::Output) + Send + Sync + 'static,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(WatchError::InvalidInterval("poll interval must be positive".to_string()));
        }
        let (state, _) = watch::channel(PollState::Idle);
        Ok(Self {
            interval,
            initial_delay: Duration::ZERO,
            fetch,
            on_change: Arc::new(on_change),
            shared: Arc::new(Shared {
                state,
                hint: Notify::new(),
                throttle: Mutex::new(HintThrottle::new(DEFAULT_HINT_WINDOW)),
                last_observed: Mutex::new(None),
                stats: Mutex::new(PollStats::default()),
                last_error: Mutex::new(None),
                clock: Mutex::new(Arc::new(TokioClock)),
            }),
        })
    }

    /// Use `clock` for ticks and hint throttling
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        *lock(&self.shared.clock) = clock;
        self
    }

    /// Wait this much longer before the first tick
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Seed the last observed value, typically what the caller just loaded
    pub fn with_baseline(self, value: F::Output) -> Self {
        *lock(&self.shared.last_observed) = Some(value);
        self
    }

    /// Collapse hints arriving within `window` of each other
    pub fn with_hint_throttle(self, window: Duration) -> Self {
        *lock(&self.shared.throttle) = HintThrottle::new(window);
        self
    }

    /// Poll interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A handle onto this coordinator, usable before `start`
    pub fn handle(&self) -> PollHandle<F::Output> {
        PollHandle {
            shared: self.shared.clone(),
        }
    }

    /// Begin polling. The first check fires after `initial_delay + interval`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(self) -> Result<PollHandle<F::Output>> {
        let started = self.shared.state.send_if_modified(|s| {
            if s.is_started() {
                false
            } else {
                *s = PollState::Running;
                true
            }
        });
        if !started {
            return Err(WatchError::InvalidState(format!(
                "cannot start a coordinator that is {}",
                self.shared.current()
            )));
        }

        info!(
            "Starting poller: interval={:?}, initial_delay={:?}",
            self.interval, self.initial_delay
        );
        let handle = self.handle();
        tokio::spawn(self.run());
        Ok(handle)
    }

    async fn run(self) {
        let Self {
            interval,
            initial_delay,
            fetch,
            on_change,
            shared,
        } = self;
        let _guard = HaltOnExit(shared.clone());
        let mut state_rx = shared.state.subscribe();
        let mut next_tick = shared.clock().now() + initial_delay + interval;

        loop {
            let delay = next_tick.saturating_duration_since(shared.clock().now());
            let wake = shared.wait(delay, &mut state_rx).await;
            match wake {
                Wake::Halted => break,
                Wake::Tick => shared.stats_mut().ticks += 1,
                Wake::Hint => shared.stats_mut().hints += 1,
            }

            let state = shared.current();
            if state.is_terminal() {
                break;
            }
            if !state.should_fetch() {
                shared.stats_mut().skipped += 1;
                debug!("Poller paused, skipping {:?}", wake);
                // A skipped hint leaves the pending tick where it was
                if wake == Wake::Tick {
                    next_tick = shared.clock().now() + interval;
                }
                continue;
            }

            shared.stats_mut().fetches += 1;
            let result = fetch.fetch().await;
            next_tick = shared.clock().now() + interval;

            if shared.current().is_terminal() {
                debug!("Poller halted while fetching, discarding result");
                break;
            }

            match result {
                Ok(value) => shared.observe(value, &on_change),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch watched value, halting poller");
                    *lock(&shared.last_error) = Some(e.to_string());
                    shared.halt();
                    break;
                }
            }
        }
        debug!("Poller task exiting");
    }
}

/// Cloneable control handle for a running coordinator
pub struct PollHandle<T>
where
    T: PartialEq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    shared: Arc<Shared<T>>,
}

impl<T> Clone for PollHandle<T>
where
    T: PartialEq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> PollHandle<T>
where
    T: PartialEq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Current lifecycle state
    pub fn state(&self) -> PollState {
        self.shared.current()
    }

    /// True once halted
    pub fn is_halted(&self) -> bool {
        self.state().is_terminal()
    }

    /// Skip fetches until `resume`. Ticks keep their schedule.
    pub fn pause(&self) {
        let changed = self.shared.state.send_if_modified(|s| {
            if *s == PollState::Running {
                *s = PollState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("Poller paused");
        }
    }

    /// Resume fetching from the next scheduled tick
    pub fn resume(&self) {
        let changed = self.shared.state.send_if_modified(|s| {
            if *s == PollState::Paused {
                *s = PollState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("Poller resumed");
        }
    }

    /// Stop for good and release the timer. An in-flight fetch is left to
    /// finish but its result is ignored.
    pub fn halt(&self) {
        if self.shared.halt() {
            info!("Poller halted");
        }
    }

    /// Signal that the watched value may have changed.
    ///
    /// Returns true if the hint was accepted and will wake the poller early.
    pub fn hint(&self) -> bool {
        if self.state() != PollState::Running {
            return false;
        }
        let now = self.shared.clock().now();
        if !lock(&self.shared.throttle).try_accept(now) {
            debug!("Hint throttled");
            return false;
        }
        self.shared.hint.notify_one();
        true
    }

    /// The most recently observed value
    pub fn last_observed(&self) -> Option<T> {
        lock(&self.shared.last_observed).clone()
    }

    /// The failure that halted the coordinator, if one did
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Activity counters
    pub fn stats(&self) -> PollStats {
        *self.shared.stats_mut()
    }

    /// Wait until the coordinator halts
    pub async fn halted(&self) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|s| s.is_terminal()).await;
    }
}
