//! Hint throttling
//!
//! Push channels tend to fire in bursts (one save can emit several change
//! notifications). Only the first hint inside a window is let through.

use std::time::Duration;
use tokio::time::Instant;

/// Default window inside which repeated hints collapse to one
pub const DEFAULT_HINT_WINDOW: Duration = Duration::from_millis(500);

/// Leading-edge throttle for a single channel
#[derive(Debug, Clone)]
pub struct HintThrottle {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl HintThrottle {
    /// Create a throttle with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// The throttle window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if a hint arriving at `now` should be acted on
    pub fn try_accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

impl Default for HintThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_HINT_WINDOW)
    }
}
