//! Transcoding status lookups
//!
//! The status endpoint answers `{"status": "<label>"}` for an event id. A
//! batch of lookups goes through a `SequentialQueue` because the upstream
//! transcoding service is rate limited.

use colored::Color;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::client::HttpClient;
use crate::error::{Result, WatchError};
use crate::queue::SequentialQueue;

/// Transcoding status as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranscodeStatus {
    Finished,
    Processing,
    New,
    Error,
    /// Any other non-empty label, passed through verbatim
    Other(String),
    /// No status in the response
    Unknown,
}

impl TranscodeStatus {
    /// Map a raw label
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            None | Some("") => TranscodeStatus::Unknown,
            Some("Finished") => TranscodeStatus::Finished,
            Some("Processing") => TranscodeStatus::Processing,
            Some("New") => TranscodeStatus::New,
            Some("Error") => TranscodeStatus::Error,
            Some(other) => TranscodeStatus::Other(other.to_string()),
        }
    }

    /// Map a `{"status": ...}` response body
    pub fn from_response(body: &Value) -> Self {
        Self::from_label(body.get("status").and_then(Value::as_str))
    }

    /// Display colour for the label
    pub fn color(&self) -> Color {
        match self {
            TranscodeStatus::Finished => Color::Green,
            TranscodeStatus::Processing => Color::Cyan,
            TranscodeStatus::New => Color::White,
            TranscodeStatus::Error => Color::Red,
            TranscodeStatus::Other(_) => Color::Magenta,
            TranscodeStatus::Unknown => Color::Yellow,
        }
    }

    /// Returns true once transcoding can no longer change on its own
    pub fn is_settled(&self) -> bool {
        matches!(self, TranscodeStatus::Finished | TranscodeStatus::Error)
    }
}

impl fmt::Display for TranscodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeStatus::Finished => f.write_str("Finished"),
            TranscodeStatus::Processing => f.write_str("Processing"),
            TranscodeStatus::New => f.write_str("New"),
            TranscodeStatus::Error => f.write_str("Error"),
            TranscodeStatus::Other(label) => f.write_str(label),
            TranscodeStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Reports one lookup outcome, e.g. by printing a label
pub type StatusReport = Arc<dyn Fn(&str, std::result::Result<&TranscodeStatus, &WatchError>) + Send + Sync>;

/// Wrap a closure as a `StatusReport`
pub fn report_fn<F>(f: F) -> StatusReport
where
    F: Fn(&str, std::result::Result<&TranscodeStatus, &WatchError>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Looks up transcoding status by event id
#[derive(Debug, Clone)]
pub struct StatusLookup {
    client: HttpClient,
    url: String,
    refresh: bool,
}

impl StatusLookup {
    /// Look up status at `url?id=<id>`
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            refresh: false,
        }
    }

    /// Ask the server to bypass its cached answer
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Fetch the status for one id
    pub async fn lookup(&self, id: &str) -> Result<TranscodeStatus> {
        let mut query = vec![("id", id)];
        if self.refresh {
            query.push(("refresh", "true"));
        }
        let body = self.client.get_json(&self.url, &query).await?;
        let status = TranscodeStatus::from_response(&body);
        debug!("Status for {}: {}", id, status);
        Ok(status)
    }

    /// Queue one lookup per id. The caller drains the queue.
    pub fn enqueue_all<I, S>(self: &Arc<Self>, queue: &SequentialQueue, ids: I, report: StatusReport)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            let lookup = self.clone();
            let report = report.clone();
            queue.enqueue(async move {
                match lookup.lookup(&id).await {
                    Ok(status) => {
                        report(&id, Ok(&status));
                        Ok(())
                    }
                    Err(e) => {
                        report(&id, Err(&e));
                        Err(e)
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_labels() {
        assert_eq!(TranscodeStatus::from_label(Some("Finished")), TranscodeStatus::Finished);
        assert_eq!(TranscodeStatus::from_label(Some("Processing")), TranscodeStatus::Processing);
        assert_eq!(TranscodeStatus::from_label(Some("New")), TranscodeStatus::New);
        assert_eq!(TranscodeStatus::from_label(Some("Error")), TranscodeStatus::Error);
    }

    #[test]
    fn test_missing_or_empty_is_unknown() {
        assert_eq!(TranscodeStatus::from_label(None), TranscodeStatus::Unknown);
        assert_eq!(TranscodeStatus::from_label(Some("  ")), TranscodeStatus::Unknown);
        assert_eq!(TranscodeStatus::from_response(&json!({})), TranscodeStatus::Unknown);
        assert_eq!(TranscodeStatus::from_response(&json!({"status": null})), TranscodeStatus::Unknown);
    }

    #[test]
    fn test_other_label_passes_through() {
        let status = TranscodeStatus::from_response(&json!({"status": "Queued"}));
        assert_eq!(status, TranscodeStatus::Other("Queued".to_string()));
        assert_eq!(status.to_string(), "Queued");
    }

    #[test]
    fn test_colors() {
        assert_eq!(TranscodeStatus::Finished.color(), Color::Green);
        assert_eq!(TranscodeStatus::Error.color(), Color::Red);
        assert_eq!(TranscodeStatus::Unknown.color(), Color::Yellow);
    }

    #[test]
    fn test_settled() {
        assert!(TranscodeStatus::Finished.is_settled());
        assert!(TranscodeStatus::Error.is_settled());
        assert!(!TranscodeStatus::Processing.is_settled());
        assert!(!TranscodeStatus::Unknown.is_settled());
    }

    #[test]
    fn test_enqueue_all_does_not_drain() {
        let client = HttpClient::new(&crate::config::HttpConfig::default()).unwrap();
        let lookup = Arc::new(StatusLookup::new(client, "http://localhost/manage/vidly/status/"));
        let queue = SequentialQueue::new();
        lookup.enqueue_all(&queue, ["1", "2", "3"], report_fn(|_, _| {}));
        assert_eq!(queue.len(), 3);
        assert!(!queue.is_running());
    }
}
