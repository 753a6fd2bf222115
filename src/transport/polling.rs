//! Polling of long-running tasks
//!
//! [`poll_until`] drives a submit-then-poll task to a terminal status and
//! returns the final status body. [`poll_events`] exposes the same loop as an
//! [`EventSource`] that yields every status body, for providers whose
//! progress is itself the stream.

use crate::config::ClientConfig;
use crate::error::{OmniError, Result};
use crate::streaming::{EventSource, WireEvent};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Classification of one status response.
#[derive(Debug)]
pub enum PollStatus {
    Pending,
    Ready,
    Failed(OmniError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl PollConfig {
    pub const fn new(interval: Duration, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            timeout,
            max_attempts,
        }
    }

    /// Apply the client-level overrides, keeping provider defaults otherwise.
    pub fn with_overrides(self, config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval.unwrap_or(self.interval),
            timeout: config.poll_timeout.unwrap_or(self.timeout),
            max_attempts: config.max_poll_attempts.unwrap_or(self.max_attempts),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(600), 120)
    }
}

fn timed_out(label: &str, config: &PollConfig, attempts: u32) -> OmniError {
    OmniError::Timeout(format!(
        "{label} task did not complete after {attempts} polls ({}s limit)",
        config.timeout.as_secs()
    ))
}

/// Poll until `classify` reports a terminal status.
///
/// The first poll happens immediately; later polls wait `interval`. Exceeding
/// `timeout` or `max_attempts` is a terminal [`OmniError::Timeout`].
pub async fn poll_until<F, Fut, C>(config: PollConfig, label: &str, mut poll: F, classify: C) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value>>,
    C: Fn(&Value) -> PollStatus,
{
    let deadline = Instant::now() + config.timeout;
    for attempt in 1..=config.max_attempts {
        let response = poll().await?;
        match classify(&response) {
            PollStatus::Ready => {
                tracing::debug!(label, attempt, "task completed");
                return Ok(response);
            }
            PollStatus::Failed(err) => {
                tracing::debug!(label, attempt, error = %err, "task failed");
                return Err(err);
            }
            PollStatus::Pending => {
                tracing::trace!(label, attempt, "task pending");
            }
        }
        if attempt == config.max_attempts || Instant::now() + config.interval > deadline {
            return Err(timed_out(label, &config, attempt));
        }
        tokio::time::sleep(config.interval).await;
    }
    Err(timed_out(label, &config, config.max_attempts))
}

/// Poll as a stream of status bodies, ending after the terminal one.
///
/// A failed status ends the stream with its error. Dropping or releasing the
/// source stops polling.
pub fn poll_events<F, Fut, C>(config: PollConfig, label: &'static str, mut poll: F, classify: C) -> EventSource
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value>> + Send,
    C: Fn(&Value) -> PollStatus + Send + 'static,
{
    let events = async_stream::stream! {
        let deadline = Instant::now() + config.timeout;
        for attempt in 1..=config.max_attempts {
            let response = match poll().await {
                Ok(v) => v,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            match classify(&response) {
                PollStatus::Ready => {
                    yield Ok(WireEvent::Json(response));
                    return;
                }
                PollStatus::Failed(err) => {
                    yield Err(err);
                    return;
                }
                PollStatus::Pending => yield Ok(WireEvent::Json(response)),
            }
            if attempt == config.max_attempts || Instant::now() + config.interval > deadline {
                yield Err(timed_out(label, &config, attempt));
                return;
            }
            tokio::time::sleep(config.interval).await;
        }
    };
    EventSource::new(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_secs(5), max_attempts)
    }

    fn by_status(v: &Value) -> PollStatus {
        match v["status"].as_str() {
            Some("done") => PollStatus::Ready,
            Some("failed") => PollStatus::Failed(OmniError::TaskFailed("boom".into())),
            _ => PollStatus::Pending,
        }
    }

    fn counter_poll(done_after: u32) -> (Arc<AtomicU32>, impl FnMut() -> futures::future::Ready<Result<Value>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let poll = move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if n >= done_after { "done" } else { "running" };
            futures::future::ready(Ok(json!({"status": status, "n": n})))
        };
        (calls, poll)
    }

    #[tokio::test]
    async fn returns_terminal_body() {
        let (calls, poll) = counter_poll(3);
        let body = poll_until(fast(10), "test", poll, by_status).await.unwrap();
        assert_eq!(body["n"], 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let (calls, poll) = counter_poll(100);
        let err = poll_until(fast(4), "veo", poll, by_status).await.unwrap_err();
        assert!(matches!(err, OmniError::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failure_is_returned_as_is() {
        let poll = || futures::future::ready(Ok(json!({"status": "failed"})));
        let err = poll_until(fast(4), "bfl", poll, by_status).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn events_end_after_ready() {
        let (_, poll) = counter_poll(2);
        let events: Vec<_> = poll_events(fast(10), "mureka", poll, by_status).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap().as_json().unwrap()["status"], "done");
    }

    #[test]
    fn client_overrides_win() {
        let config = ClientConfig::builder()
            .max_poll_attempts(3)
            .poll_interval(Duration::from_millis(50))
            .build();
        let merged = PollConfig::new(Duration::from_secs(2), Duration::from_secs(300), 150).with_overrides(&config);
        assert_eq!(merged, PollConfig::new(Duration::from_millis(50), Duration::from_secs(300), 3));
    }
}
