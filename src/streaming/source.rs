//! Raw event sources
//!
//! An [`EventSource`] is the transport side of a stream: a boxed stream of
//! decoded [`WireEvent`]s plus the resources behind it. Releasing it drops the
//! underlying connection, cancels its token and runs the release hook once.

use crate::error::Result;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

/// One decoded wire event.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// SSE `data:` payload, NDJSON line, WebSocket text frame or poll result.
    Json(Value),
    /// Raw bytes with no envelope (audio streams).
    Binary(Bytes),
}

impl WireEvent {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            WireEvent::Json(v) => Some(v),
            WireEvent::Binary(_) => None,
        }
    }
}

pub type WireStream = Pin<Box<dyn Stream<Item = Result<WireEvent>> + Send>>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

pub struct EventSource {
    events: Option<WireStream>,
    release_hooks: Vec<ReleaseHook>,
    token: CancellationToken,
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("released", &self.is_released())
            .finish()
    }
}

impl EventSource {
    pub fn new<S>(events: S) -> Self
    where
        S: Stream<Item = Result<WireEvent>> + Send + 'static,
    {
        Self {
            events: Some(Box::pin(events)),
            release_hooks: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    /// A source over in-memory events.
    pub fn from_events(events: Vec<Result<WireEvent>>) -> Self {
        Self::new(futures::stream::iter(events))
    }

    /// Run `hook` when the source is released.
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release_hooks.push(Box::new(hook));
        self
    }

    /// Token cancelled on release; background producers should watch it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_released(&self) -> bool {
        self.events.is_none()
    }

    /// Drop the transport and run release hooks. Idempotent.
    pub fn release(&mut self) {
        if self.events.take().is_none() {
            return;
        }
        self.token.cancel();
        for hook in self.release_hooks.drain(..) {
            hook();
        }
        tracing::trace!("event source released");
    }
}

impl Stream for EventSource {
    type Item = Result<WireEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.events.as_mut() {
            Some(events) => events.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn release_runs_hooks_once_and_ends_stream() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut source = EventSource::from_events(vec![
            Ok(WireEvent::Json(json!({"a": 1}))),
            Ok(WireEvent::Json(json!({"a": 2}))),
        ])
        .on_release(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let token = source.cancellation_token();

        assert!(source.next().await.is_some());
        source.release();
        source.release();
        assert!(source.next().await.is_none());
        assert!(token.is_cancelled());
        drop(source);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
