//! Poll lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a polling coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// Created but not started
    #[default]
    Idle,
    /// Ticking and fetching
    Running,
    /// Ticking but skipping fetches (resumable)
    Paused,
    /// Stopped for good, timer released
    Halted,
}

impl PollState {
    /// Returns true if no further fetch can ever happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Halted)
    }

    /// Returns true if a tick in this state should fetch
    pub fn should_fetch(&self) -> bool {
        matches!(self, PollState::Running)
    }

    /// Returns true once `start` has moved the coordinator out of `Idle`
    pub fn is_started(&self) -> bool {
        !matches!(self, PollState::Idle)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollState::Idle => "idle",
            PollState::Running => "running",
            PollState::Paused => "paused",
            PollState::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// Counters describing what a coordinator has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Timer ticks that fired, fetched or not
    pub ticks: u64,
    /// Fetches started
    pub fetches: u64,
    /// Ticks skipped because the coordinator was paused
    pub skipped: u64,
    /// Times `on_change` was invoked
    pub changes: u64,
    /// Hints that woke the timer early
    pub hints: u64,
}
