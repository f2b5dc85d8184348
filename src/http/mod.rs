//! HTTP adapters
//!
//! reqwest-backed implementations of the fetch and descriptor boundaries:
//! watching a JSON field, and looking up transcoding status.

pub mod client;
pub mod status;

pub use client::{HttpClient, JsonFieldFetch, extract_field, to_pointer};
pub use status::{StatusLookup, StatusReport, TranscodeStatus, report_fn};
