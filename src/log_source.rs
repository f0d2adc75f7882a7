use crate::config::{Config, SourceMode};
use crate::error::ViewerError;
use crate::log_entry::{normalize_payload, LogEntry, LogLevel};
use crate::notify::{Notification, Notifier};
use chrono::Utc;
use log::{debug, error, info};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration};

const USER_AGENT: &str = concat!("console-viewer/", env!("CARGO_PKG_VERSION"));

/// What observers see. Each published snapshot is a complete value.
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    pub entries: Arc<Vec<LogEntry>>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

enum Fetcher {
    Live {
        client: reqwest::Client,
        endpoint: String,
    },
    Fallback {
        delay: Duration,
    },
}

impl Fetcher {
    async fn fetch(&self) -> Result<Vec<LogEntry>, ViewerError> {
        match self {
            Fetcher::Live { client, endpoint } => fetch_live(client, endpoint).await,
            Fetcher::Fallback { delay } => {
                sleep(*delay).await;
                Ok(sample_entries())
            }
        }
    }
}

async fn fetch_live(
    client: &reqwest::Client,
    endpoint: &str,
) -> Result<Vec<LogEntry>, ViewerError> {
    let response = client.get(endpoint).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ViewerError::from_status(status));
    }

    let body = response.bytes().await?;
    let payload: Value = serde_json::from_slice(&body)?;

    Ok(normalize_payload(&payload, Utc::now()))
}

/// Bookkeeping for overlapping refresh attempts.
#[derive(Debug, Default)]
struct RefreshState {
    next_seq: u64,
    applied_seq: u64,
    in_flight: usize,
}

impl RefreshState {
    fn begin(&mut self) -> u64 {
        self.next_seq += 1;
        self.in_flight += 1;
        self.next_seq
    }

    /// Returns whether the attempt may publish its result.
    fn complete(&mut self, seq: u64) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if seq > self.applied_seq {
            self.applied_seq = seq;
            true
        } else {
            false
        }
    }
}

/// Owns the current log list and replaces it wholesale on every refresh.
pub struct LogSource {
    fetcher: Fetcher,
    notifier: Arc<dyn Notifier>,
    state: Mutex<RefreshState>,
    snapshot: watch::Sender<LogSnapshot>,
}

impl LogSource {
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self, ViewerError> {
        let fetcher = match config.mode {
            SourceMode::Live => Fetcher::Live {
                client: reqwest::Client::builder()
                    .timeout(config.request_timeout())
                    .user_agent(USER_AGENT)
                    .build()?,
                endpoint: config.endpoint.clone(),
            },
            SourceMode::Fallback => Fetcher::Fallback {
                delay: config.fallback_delay(),
            },
        };

        let (snapshot, _) = watch::channel(LogSnapshot::default());

        Ok(Self {
            fetcher,
            notifier,
            state: Mutex::new(RefreshState::default()),
            snapshot,
        })
    }

    pub fn snapshot(&self) -> LogSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LogSnapshot> {
        self.snapshot.subscribe()
    }

    /// Runs one fetch cycle. Failures end up in `last_error` and the
    /// notifier, never in the caller.
    pub async fn refresh(&self) {
        let seq = {
            let mut state = self.state.lock().await;
            let seq = state.begin();
            self.snapshot.send_modify(|snap| snap.is_loading = true);
            seq
        };

        debug!("Refresh #{} started", seq);
        let result = self.fetcher.fetch().await;

        let (fresh, failed) = {
            let mut state = self.state.lock().await;
            let fresh = state.complete(seq);
            let still_loading = state.in_flight > 0;
            let mut failed = false;

            self.snapshot.send_modify(|snap| {
                if fresh {
                    match result {
                        Ok(entries) => {
                            info!("Refresh #{} loaded {} log entries", seq, entries.len());
                            snap.entries = Arc::new(entries);
                            snap.last_error = None;
                        }
                        Err(e) => {
                            error!("Refresh #{} failed: {}", seq, e);
                            snap.last_error = Some(e.to_string());
                            failed = true;
                        }
                    }
                }
                snap.is_loading = still_loading;
            });

            (fresh, failed)
        };

        if !fresh {
            debug!("Refresh #{} finished after a newer attempt, result dropped", seq);
        }

        if failed {
            self.notifier.notify(Notification::destructive(
                "Connection Error",
                "Unable to fetch console logs. Please try again later.",
            ));
        }
    }
}

/// The fixed entries served in fallback mode.
pub fn sample_entries() -> Vec<LogEntry> {
    fn details(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    vec![
        LogEntry {
            id: "sample-1".to_string(),
            timestamp: "2024-01-15T09:00:00.000Z".to_string(),
            level: LogLevel::Info,
            message: "Application started".to_string(),
            details: details(json!({ "version": "1.0.0", "environment": "demo" })),
        },
        LogEntry {
            id: "sample-2".to_string(),
            timestamp: "2024-01-15T09:00:01.250Z".to_string(),
            level: LogLevel::Debug,
            message: "Loaded configuration from defaults".to_string(),
            details: Map::new(),
        },
        LogEntry {
            id: "sample-3".to_string(),
            timestamp: "2024-01-15T09:00:05.400Z".to_string(),
            level: LogLevel::Warning,
            message: "Response time above threshold".to_string(),
            details: details(json!({
                "endpoint": "/api/users",
                "durationMs": 1450,
                "thresholdMs": 1000
            })),
        },
        LogEntry {
            id: "sample-4".to_string(),
            timestamp: "2024-01-15T09:00:09.800Z".to_string(),
            level: LogLevel::Error,
            message: "Database connection lost".to_string(),
            details: details(json!({ "host": "db.internal", "retries": 3 })),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::Variant;
    use httpmock::prelude::*;

    fn live_config(endpoint: String) -> Config {
        Config {
            endpoint,
            ..Config::default()
        }
    }

    fn source_with(config: &Config) -> (Arc<LogSource>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let source = LogSource::new(config, notifier.clone()).unwrap();
        (Arc::new(source), notifier)
    }

    #[tokio::test]
    async fn success_replaces_entries() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200).json_body(serde_json::json!([
                { "id": "a", "level": "warning", "message": "low disk" },
                { "message": "no id" }
            ]));
        });

        let (source, notifier) = source_with(&live_config(server.url("/api/logs")));
        source.refresh().await;

        mock.assert();
        let snap = source.snapshot();
        assert_eq!(snap.entries.len(), 2);
        assert_eq!(snap.entries[0].id, "a");
        assert_eq!(snap.entries[0].level, LogLevel::Warning);
        assert!(snap.entries[1].id.starts_with("log-1-"));
        assert!(!snap.is_loading);
        assert!(snap.last_error.is_none());
        assert!(notifier.received().is_empty());
    }

    #[tokio::test]
    async fn non_array_body_is_empty_without_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200).json_body(serde_json::json!({ "logs": "nope" }));
        });

        let (source, notifier) = source_with(&live_config(server.url("/api/logs")));
        source.refresh().await;

        let snap = source.snapshot();
        assert!(snap.entries.is_empty());
        assert!(snap.last_error.is_none());
        assert!(notifier.received().is_empty());
    }

    #[tokio::test]
    async fn error_status_keeps_previous_entries() {
        let server = MockServer::start_async().await;
        let mut ok = server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200)
                .json_body(serde_json::json!([{ "id": "keep", "message": "first" }]));
        });

        let (source, notifier) = source_with(&live_config(server.url("/api/logs")));
        source.refresh().await;
        assert_eq!(source.snapshot().entries.len(), 1);

        ok.delete();
        server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(503);
        });
        source.refresh().await;

        let snap = source.snapshot();
        assert_eq!(snap.entries.len(), 1);
        assert_eq!(snap.entries[0].id, "keep");
        let message = snap.last_error.unwrap();
        assert!(message.contains("503"), "unexpected error: {}", message);
        assert!(!snap.is_loading);

        let received = notifier.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].title, "Connection Error");
        assert_eq!(received[0].variant, Variant::Destructive);
    }

    #[tokio::test]
    async fn invalid_json_is_a_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200).body("<html>oops</html>");
        });

        let (source, notifier) = source_with(&live_config(server.url("/api/logs")));
        source.refresh().await;

        let snap = source.snapshot();
        assert!(snap.last_error.is_some());
        assert!(!snap.is_loading);
        assert_eq!(notifier.received().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_sets_error() {
        let endpoint = "http://127.0.0.1:1/api/logs".to_string();
        let (source, notifier) = source_with(&live_config(endpoint));
        source.refresh().await;

        let snap = source.snapshot();
        assert!(snap.last_error.is_some());
        assert!(snap.entries.is_empty());
        assert!(!snap.is_loading);
        assert_eq!(notifier.received().len(), 1);
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let server = MockServer::start_async().await;
        let mut failing = server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(500);
        });

        let (source, _notifier) = source_with(&live_config(server.url("/api/logs")));
        source.refresh().await;
        assert!(source.snapshot().last_error.is_some());

        failing.delete();
        server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200).json_body(serde_json::json!([]));
        });
        source.refresh().await;

        assert!(source.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn stale_attempt_does_not_overwrite_newer_result() {
        let server = MockServer::start_async().await;
        let mut slow = server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200)
                .delay(Duration::from_millis(400))
                .json_body(serde_json::json!([{ "id": "old" }]));
        });

        let (source, _notifier) = source_with(&live_config(server.url("/api/logs")));

        let first = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.refresh().await })
        };
        sleep(Duration::from_millis(100)).await;
        assert!(source.snapshot().is_loading);

        slow.delete();
        server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200).json_body(serde_json::json!([{ "id": "new" }]));
        });

        source.refresh().await;
        assert_eq!(source.snapshot().entries[0].id, "new");

        first.await.unwrap();
        let snap = source.snapshot();
        assert_eq!(snap.entries.len(), 1);
        assert_eq!(snap.entries[0].id, "new");
        assert!(snap.last_error.is_none());
        assert!(!snap.is_loading);
    }

    #[tokio::test]
    async fn stale_failure_is_dropped_silently() {
        let server = MockServer::start_async().await;
        let mut slow = server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(503).delay(Duration::from_millis(400));
        });

        let (source, notifier) = source_with(&live_config(server.url("/api/logs")));

        let first = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.refresh().await })
        };
        sleep(Duration::from_millis(100)).await;

        slow.delete();
        server.mock(|when, then| {
            when.method(GET).path("/api/logs");
            then.status(200).json_body(serde_json::json!([{ "id": "new" }]));
        });

        source.refresh().await;
        first.await.unwrap();

        let snap = source.snapshot();
        assert_eq!(snap.entries.len(), 1);
        assert_eq!(snap.entries[0].id, "new");
        assert!(snap.last_error.is_none());
        assert!(!snap.is_loading);
        assert!(notifier.received().is_empty());
    }

    #[tokio::test]
    async fn fallback_serves_samples_silently() {
        let config = Config {
            mode: SourceMode::Fallback,
            fallback_delay_ms: 200,
            ..Config::default()
        };
        let (source, notifier) = source_with(&config);

        let mut rx = source.subscribe();
        let refresh = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.refresh().await })
        };
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_loading);

        refresh.await.unwrap();
        let snap = source.snapshot();
        assert_eq!(*snap.entries, sample_entries());
        assert_eq!(snap.entries.len(), 4);
        assert!(!snap.is_loading);
        assert!(notifier.received().is_empty());
    }

    #[test]
    fn refresh_state_orders_by_sequence() {
        let mut state = RefreshState::default();
        let a = state.begin();
        let b = state.begin();

        assert!(state.complete(b));
        assert_eq!(state.in_flight, 1);
        assert!(!state.complete(a));
        assert_eq!(state.in_flight, 0);

        let c = state.begin();
        assert!(state.complete(c));
    }
}
