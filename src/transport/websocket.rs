//! WebSocket sessions
//!
//! A session connects with the provider's auth headers, sends a setup frame,
//! waits for the ready frame and then sends the scripted messages. Incoming
//! frames are forwarded from a background task into an [`EventSource`]. The
//! task stops after the end frame, on a closed connection or when the source
//! is released; if it panics instead, the source receives an error.

use crate::error::{OmniError, Result};
use crate::protocols::event_type;
use crate::streaming::{EventSource, WireEvent};
use futures::channel::mpsc;
use futures_util::{SinkExt, StreamExt};
use reqwest::header::HeaderMap;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

/// Frames exchanged over one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub setup: Value,
    pub messages: Vec<Value>,
    /// `type` of the frame the server sends once setup is accepted.
    pub ready_type: &'static str,
    /// `type` of the last frame the server sends.
    pub end_type: &'static str,
}

fn decode(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| OmniError::parse(format!("Invalid WebSocket frame: {e}")))
}

/// Open a session and stream the server's frames.
pub async fn open_session(url: &str, headers: HeaderMap, plan: SessionPlan) -> Result<EventSource> {
    let mut request = url.into_client_request()?;
    request.headers_mut().extend(headers);
    tracing::debug!(url, "opening websocket session");

    let (socket, _) = connect_async(request).await?;
    let (mut sink, mut frames) = socket.split();

    sink.send(Message::text(plan.setup.to_string())).await?;
    let ready = loop {
        match frames.next().await {
            Some(Ok(Message::Text(text))) => break decode(text.as_str())?,
            Some(Ok(Message::Close(_))) | None => {
                return Err(OmniError::WebSocket("Connection closed before ready".into()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };
    if event_type(&ready) == "error" {
        let message = ready.get("message").and_then(Value::as_str).unwrap_or("Unknown error");
        return Err(OmniError::WebSocket(message.to_string()));
    }
    if event_type(&ready) != plan.ready_type {
        return Err(OmniError::WebSocket(format!("Expected ready message, got: {ready}")));
    }

    for message in &plan.messages {
        sink.send(Message::text(message.to_string())).await?;
    }

    let (tx, rx) = mpsc::unbounded::<Result<WireEvent>>();
    let source = EventSource::new(rx);
    let token = source.cancellation_token();
    let end_type = plan.end_type;

    spawn_reader(tx.clone(), async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("websocket session released early");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                frame = frames.next() => {
                    let event = match frame {
                        Some(Ok(Message::Text(text))) => decode(text.as_str()).map(WireEvent::Json),
                        Some(Ok(Message::Binary(data))) => Ok(WireEvent::Binary(data)),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => Err(e.into()),
                    };
                    let last = match &event {
                        Ok(WireEvent::Json(v)) => event_type(v) == end_type,
                        Ok(WireEvent::Binary(_)) => false,
                        Err(_) => true,
                    };
                    if tx.unbounded_send(event).is_err() || last {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        }
    });

    Ok(source)
}

/// Run `reader` on its own task and report an abnormal exit on `tx`.
fn spawn_reader<F>(tx: mpsc::UnboundedSender<Result<WireEvent>>, reader: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(reader);
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "websocket reader task failed");
            let _ = tx.unbounded_send(Err(OmniError::WebSocket(format!(
                "Reader task ended unexpectedly: {e}"
            ))));
        }
    });
}
