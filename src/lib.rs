//! eventwatch - change pollers and sequential request queues
//!
//! Two small coordination primitives for watching server-side state:
//! a `PollingCoordinator` that checks a value on an interval with
//! pause/resume/halt and change de-duplication, and a `SequentialQueue` that
//! runs request descriptors strictly one after another.

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod poll;
pub mod queue;

pub use error::{Result, WatchError};
pub use poll::{Fetch, PollHandle, PollState, PollingCoordinator, fetch_fn};
pub use queue::SequentialQueue;
