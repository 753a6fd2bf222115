//! Streaming Module
//!
//! Normalizes every provider wire format into one incremental [`Chunk`]
//! protocol. Transports decode bytes into [`WireEvent`]s (SSE, NDJSON, raw
//! binary, WebSocket frames, poll results), a protocol [`ChunkParser`] turns
//! events into chunks, and [`ChunkStream`] drives the lifecycle and assembles
//! the final [`Output`].
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --first chunk--> Streaming --source exhausted--> Done
//!   \                       \
//!    \---error / close------ +--------------------------> Closed
//! ```
//!
//! The transport is released exactly once: on exhaustion, on the first error,
//! on [`ChunkStream::close`] or when the stream is dropped.

pub mod assemble;
pub mod ndjson;
mod source;
pub mod sse;

pub use source::{EventSource, WireEvent, WireStream};

use crate::error::{OmniError, Result};
use crate::protocols::ChunkParser;
use crate::types::{Capability, Chunk, Content, Output, Provider};
use futures::Stream;
use serde_json::{Map, Value};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

/// Transform applied to the assembled content, e.g. structured output parsing.
pub type OutputTransform = Box<dyn FnOnce(Content) -> Result<Content> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Done,
    Closed,
}

/// A single-consumer stream of typed chunks.
pub struct ChunkStream {
    source: EventSource,
    parser: Arc<dyn ChunkParser>,
    capability: Capability,
    transform: Option<OutputTransform>,
    metadata: Map<String, Value>,
    chunks: Vec<Chunk>,
    state: StreamState,
    output: Option<Output>,
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("capability", &self.capability)
            .field("state", &self.state)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl ChunkStream {
    pub fn new(source: EventSource, parser: Arc<dyn ChunkParser>, capability: Capability) -> Self {
        Self {
            source,
            parser,
            capability,
            transform: None,
            metadata: Map::new(),
            chunks: Vec::new(),
            state: StreamState::Idle,
            output: None,
        }
    }

    /// Tag the final output with the model and provider it came from.
    pub fn for_model(mut self, model_id: &str, provider: Provider) -> Self {
        self.metadata.insert("model".into(), Value::String(model_id.to_string()));
        self.metadata
            .insert("provider".into(), Value::String(provider.as_str().to_string()));
        self
    }

    pub fn with_output_transform(
        mut self,
        transform: impl FnOnce(Content) -> Result<Content> + Send + 'static,
    ) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Chunks yielded so far.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The assembled output, available once the stream is exhausted.
    pub fn output(&self) -> Result<&Output> {
        match (&self.state, &self.output) {
            (StreamState::Done, Some(output)) => Ok(output),
            _ => Err(OmniError::StreamNotExhausted),
        }
    }

    /// Stop consuming and release the transport. Idempotent; a finished
    /// stream keeps its output.
    pub fn close(&mut self) {
        if self.state != StreamState::Done && self.state != StreamState::Closed {
            tracing::debug!(capability = %self.capability, chunks = self.chunks.len(), "stream closed early");
            self.state = StreamState::Closed;
        }
        self.source.release();
    }

    /// Drain the remaining chunks and return the assembled output.
    pub async fn collect_output(mut self) -> Result<Output> {
        use futures::StreamExt;
        while let Some(chunk) = self.next().await {
            chunk?;
        }
        self.output.take().ok_or(OmniError::StreamNotExhausted)
    }

    fn fail(&mut self, err: OmniError) -> OmniError {
        tracing::debug!(capability = %self.capability, error = %err, "stream failed");
        self.state = StreamState::Closed;
        self.source.release();
        err
    }

    fn finish(&mut self) -> Result<()> {
        let content = assemble::assemble(self.capability, &self.chunks)?;
        let content = match self.transform.take() {
            Some(transform) => transform(content)?,
            None => content,
        };
        let parser = self.parser.clone();
        let raw_events = assemble::raw_events(&self.chunks, |v| parser.keep_in_metadata(v));
        let mut metadata = self.metadata.clone();
        metadata.insert("raw_events".into(), Value::Array(raw_events));
        self.output = Some(Output {
            content,
            usage: assemble::last_usage(&self.chunks),
            finish_reason: assemble::last_finish_reason(&self.chunks),
            metadata,
        });
        self.state = StreamState::Done;
        self.source.release();
        tracing::debug!(capability = %self.capability, chunks = self.chunks.len(), "stream completed");
        Ok(())
    }
}

impl Stream for ChunkStream {
    type Item = Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if matches!(this.state, StreamState::Done | StreamState::Closed) {
                return Poll::Ready(None);
            }
            match ready!(Pin::new(&mut this.source).poll_next(cx)) {
                Some(Ok(event)) => {
                    let empty = this.capability.empty_chunk_content();
                    match this.parser.parse_event(event, empty) {
                        Ok(Some(chunk)) => {
                            this.state = StreamState::Streaming;
                            this.chunks.push(chunk.clone());
                            return Poll::Ready(Some(Ok(chunk)));
                        }
                        Ok(None) => continue,
                        Err(e) => return Poll::Ready(Some(Err(this.fail(e)))),
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(this.fail(e)))),
                None if this.chunks.is_empty() => {
                    return Poll::Ready(Some(Err(this.fail(OmniError::StreamEmpty))));
                }
                None => {
                    return match this.finish() {
                        Ok(()) => Poll::Ready(None),
                        Err(e) => Poll::Ready(Some(Err(this.fail(e)))),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkContent, FinishReason, Usage};
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// `{"delta": "..."}` events carry text; `{"usage": n}` carries output tokens.
    struct DeltaParser;

    impl ChunkParser for DeltaParser {
        fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
            Ok(event["delta"].as_str().map(|t| ChunkContent::Text(t.to_string())))
        }

        fn parse_usage(&self, event: &Value) -> Option<Usage> {
            event["usage"].as_u64().map(|n| Usage {
                output_tokens: Some(n),
                ..Default::default()
            })
        }

        fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
            FinishReason::from_value(event.get("stop"))
        }

        fn parse_error(&self, event: &Value) -> Option<OmniError> {
            event
                .get("error")
                .map(|e| OmniError::Stream(e.to_string()))
        }
    }

    fn stream_of(events: Vec<Value>) -> (ChunkStream, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let r = released.clone();
        let source = EventSource::from_events(events.into_iter().map(|v| Ok(WireEvent::Json(v))).collect())
            .on_release(move || {
                r.fetch_add(1, Ordering::SeqCst);
            });
        let stream = ChunkStream::new(source, Arc::new(DeltaParser), Capability::TextGeneration)
            .for_model("m", Provider::OpenAI);
        (stream, released)
    }

    #[tokio::test]
    async fn n_deltas_yield_n_chunks_and_concatenated_output() {
        let (mut stream, released) = stream_of(vec![
            json!({"delta": "Hel"}),
            json!({"ignored": true}),
            json!({"delta": "lo"}),
            json!({"usage": 7, "stop": "end_turn"}),
        ]);
        assert!(matches!(stream.output(), Err(OmniError::StreamNotExhausted)));

        let chunks: Vec<Chunk> = (&mut stream).map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(stream.state(), StreamState::Done);

        let output = stream.output().unwrap();
        assert_eq!(output.text(), Some("Hello"));
        assert_eq!(output.usage.output_tokens, Some(7));
        assert_eq!(output.finish_reason.as_ref().unwrap().reason.as_deref(), Some("end_turn"));
        assert_eq!(output.metadata["model"], "m");
        assert_eq!(output.metadata["raw_events"].as_array().unwrap().len(), 3);
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let again = stream.output().unwrap() as *const Output;
        assert_eq!(again, output as *const Output);
    }

    #[tokio::test]
    async fn zero_chunks_is_stream_empty() {
        let (mut stream, released) = stream_of(vec![json!({"ignored": 1})]);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(OmniError::StreamEmpty)));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.state(), StreamState::Closed);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_event_closes_stream_without_output() {
        let (mut stream, released) = stream_of(vec![
            json!({"delta": "a"}),
            json!({"error": "boom"}),
            json!({"delta": "b"}),
        ]);
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(stream.output().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn early_close_releases_once() {
        let (mut stream, released) = stream_of(vec![json!({"delta": "a"}), json!({"delta": "b"})]);
        assert!(stream.next().await.is_some());
        stream.close();
        stream.close();
        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn collect_output_applies_transform() {
        let (stream, _) = stream_of(vec![json!({"delta": "x"})]);
        let output = stream
            .with_output_transform(|c| Ok(Content::Text(format!("[{}]", c.as_text().unwrap_or_default()))))
            .collect_output()
            .await
            .unwrap();
        assert_eq!(output.text(), Some("[x]"));
    }
}
