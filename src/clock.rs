//! Clock - injectable time source for timers
//!
//! The coordinator never calls `tokio::time` directly. It asks a `Clock`
//! for the current instant and for sleeps, so tests can drive time by hand
//! with `ManualClock` instead of waiting on the wall clock.

use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Number of scheduler yields after each timer fires, so woken tasks can run
/// up to their next suspension point before time moves again.
const SETTLE_YIELDS: usize = 16;

/// Source of time and timers
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend until `duration` has elapsed on this clock
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer wheel
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct Sleeper {
    deadline: Duration,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct ManualInner {
    elapsed: Duration,
    sleepers: Vec<Sleeper>,
}

/// Clock that only moves when `advance` is called.
///
/// Meant for current-thread test runtimes.
pub struct ManualClock {
    origin: Instant,
    inner: Mutex<ManualInner>,
}

impl ManualClock {
    /// Create a manual clock starting at the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            inner: Mutex::new(ManualInner::default()),
        }
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of sleeps currently waiting on this clock
    pub fn pending_sleepers(&self) -> usize {
        let mut inner = self.lock();
        inner.sleepers.retain(|s| !s.wake.is_closed());
        inner.sleepers.len()
    }

    /// Move time forward by `duration`, firing every sleep whose deadline
    /// falls inside the window in deadline order.
    ///
    /// Sleeps registered by woken tasks during the advance are honoured too,
    /// so advancing by ten intervals fires ten consecutive ticks.
    pub async fn advance(&self, duration: Duration) {
        let target = self.lock().elapsed + duration;
        loop {
            let due = {
                let mut inner = self.lock();
                inner.sleepers.retain(|s| !s.wake.is_closed());
                let next = inner
                    .sleepers
                    .iter()
                    .map(|s| s.deadline)
                    .filter(|d| *d <= target)
                    .min();
                match next {
                    Some(deadline) => {
                        inner.elapsed = inner.elapsed.max(deadline);
                        let (fire, keep): (Vec<_>, Vec<_>) =
                            inner.sleepers.drain(..).partition(|s| s.deadline <= deadline);
                        inner.sleepers = keep;
                        fire
                    }
                    None => {
                        inner.elapsed = target;
                        Vec::new()
                    }
                }
            };
            if due.is_empty() {
                break;
            }
            for sleeper in due {
                let _ = sleeper.wake.send(());
            }
            settle().await;
        }
        settle().await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock").field("elapsed", &self.elapsed()).finish()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let rx = {
            let mut inner = self.lock();
            let (tx, rx) = oneshot::channel();
            let deadline = inner.elapsed + duration;
            inner.sleepers.push(Sleeper { deadline, wake: tx });
            rx
        };
        let _ = rx.await;
    }
}

/// Let every runnable task reach its next suspension point
pub async fn settle() {
    for _ in 0..SETTLE_YIELDS {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.pending_sleepers(), 0);
    }

    #[tokio::test]
    async fn test_manual_clock_now_tracks_advance() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(3)).await;
        assert_eq!(clock.now() - before, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_sleep_wakes_only_after_deadline() {
        let clock = Arc::new(ManualClock::new());
        let woke = Arc::new(AtomicUsize::new(0));

        let c = clock.clone();
        let w = woke.clone();
        tokio::spawn(async move {
            c.sleep(Duration::from_secs(5)).await;
            w.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
        assert_eq!(clock.pending_sleepers(), 1);

        clock.advance(Duration::from_secs(4)).await;
        assert_eq!(woke.load(Ordering::SeqCst), 0);

        clock.advance(Duration::from_secs(1)).await;
        assert_eq!(woke.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending_sleepers(), 0);
    }

    #[tokio::test]
    async fn test_advance_fires_chained_sleeps() {
        let clock = Arc::new(ManualClock::new());
        let ticks = Arc::new(AtomicUsize::new(0));

        let c = clock.clone();
        let t = ticks.clone();
        tokio::spawn(async move {
            loop {
                c.sleep(Duration::from_secs(1)).await;
                t.fetch_add(1, Ordering::SeqCst);
            }
        });
        settle().await;

        clock.advance(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 10);
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_zero_sleep_returns_immediately() {
        let clock = ManualClock::new();
        clock.sleep(Duration::ZERO).await;
        assert_eq!(clock.pending_sleepers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps_on_paused_time() {
        let clock = TokioClock;
        let start = clock.now();
        clock.sleep(Duration::from_millis(250)).await;
        assert!(clock.now() - start >= Duration::from_millis(250));
    }
}
