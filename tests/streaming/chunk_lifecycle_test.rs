//! ChunkStream lifecycle: empty streams, cached output and transport release

use futures_util::StreamExt;
use omnigen::protocols::open_responses::ResponsesStream;
use omnigen::streaming::{ChunkStream, EventSource, StreamState, WireEvent};
use omnigen::{Capability, Content, OmniError};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn delta(text: &str) -> omnigen::Result<WireEvent> {
    Ok(WireEvent::Json(json!({"type": "response.output_text.delta", "delta": text})))
}

fn counted_source(events: Vec<omnigen::Result<WireEvent>>) -> (EventSource, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    let counter = releases.clone();
    let source = EventSource::from_events(events).on_release(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (source, releases)
}

fn text_stream(source: EventSource) -> ChunkStream {
    ChunkStream::new(source, Arc::new(ResponsesStream), Capability::TextGeneration)
}

#[tokio::test]
async fn n_deltas_make_n_chunks_and_one_cached_output() {
    let (source, releases) = counted_source(vec![delta("a"), delta("b"), delta("c")]);
    let mut stream = text_stream(source).with_output_transform(|content| match content {
        Content::Text(t) => Ok(Content::Text(t.to_uppercase())),
        other => Ok(other),
    });

    assert!(matches!(stream.output(), Err(OmniError::StreamNotExhausted)));
    assert_eq!(stream.state(), StreamState::Idle);

    let mut n = 0;
    while let Some(chunk) = stream.next().await {
        chunk.unwrap();
        n += 1;
        assert_eq!(stream.state(), StreamState::Streaming);
    }
    assert_eq!(n, 3);
    assert_eq!(stream.state(), StreamState::Done);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let first = stream.output().unwrap() as *const omnigen::Output;
    let second = stream.output().unwrap() as *const omnigen::Output;
    assert_eq!(first, second);
    assert_eq!(stream.output().unwrap().text(), Some("ABC"));
}

#[tokio::test]
async fn zero_chunks_is_stream_empty() {
    let (source, releases) = counted_source(vec![Ok(WireEvent::Json(
        json!({"type": "response.created", "response": {"status": "in_progress"}}),
    ))]);
    let mut stream = text_stream(source);

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, OmniError::StreamEmpty));
    assert_eq!(stream.state(), StreamState::Closed);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn early_close_releases_exactly_once() {
    let (source, releases) = counted_source(vec![delta("a"), delta("b"), delta("c")]);
    let mut stream = text_stream(source);

    assert_eq!(stream.next().await.unwrap().unwrap().content.as_text(), Some("a"));
    stream.close();
    stream.close();
    assert_eq!(stream.state(), StreamState::Closed);
    assert!(stream.next().await.is_none());
    assert_eq!(ChunkStream::chunks(&stream).len(), 1);

    drop(stream);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropping_mid_stream_releases_the_transport() {
    let (source, releases) = counted_source(vec![delta("a"), delta("b")]);
    let mut stream = text_stream(source);
    stream.next().await.unwrap().unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    drop(stream);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn collect_output_drains_the_stream() {
    let (source, _) = counted_source(vec![delta("to"), delta("des")]);
    let output = text_stream(source).collect_output().await.unwrap();
    assert_eq!(output.text(), Some("todes"));
}
