//! Polling - periodic change detection with pause/resume/halt
//!
//! A `PollingCoordinator` repeatedly asks an injected `Fetch` for the watched
//! value and calls back only when that value changes.

pub mod coordinator;
pub mod fetch;
pub mod state;
pub mod throttle;

pub use coordinator::{ChangeCallback, PollHandle, PollingCoordinator};
pub use fetch::{Fetch, FnFetch, fetch_fn};
pub use state::{PollState, PollStats};
pub use throttle::{DEFAULT_HINT_WINDOW, HintThrottle};
