//! Gradium speech over a local WebSocket server

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::{SinkExt, StreamExt};
use omnigen::prelude::*;
use omnigen::{FinishReason, MimeType};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[path = "../support/stream_fixture.rs"]
mod support;

const PCM_A: &[u8] = b"RIFF\x24\x00\x00\x00WAVE";
const PCM_B: &[u8] = b"fmt \x10\x00\x00\x00";

/// Serve one session. Answers setup with `ready` (or `error` when
/// `reject` is set), then two audio frames and `end_of_stream`. Sends the
/// client's frames back through the returned channel.
async fn serve_once(reject: bool) -> (String, oneshot::Receiver<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut seen = Vec::new();

        let setup = next_json(&mut ws).await;
        seen.push(setup);
        if reject {
            let frame = json!({"type": "error", "message": "unknown voice"});
            ws.send(Message::text(frame.to_string())).await.unwrap();
            let _ = seen_tx.send(seen);
            return;
        }
        ws.send(Message::text(json!({"type": "ready"}).to_string())).await.unwrap();

        seen.push(next_json(&mut ws).await);
        seen.push(next_json(&mut ws).await);
        for audio in [PCM_A, PCM_B] {
            let frame = json!({"type": "audio", "audio": STANDARD.encode(audio)});
            ws.send(Message::text(frame.to_string())).await.unwrap();
        }
        ws.send(Message::text(json!({"type": "end_of_stream"}).to_string()))
            .await
            .unwrap();
        let _ = seen_tx.send(seen);
        // Drain until the client closes.
        while let Some(Ok(_)) = ws.next().await {}
    });

    (format!("ws://{addr}"), seen_rx)
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = ws.next().await.unwrap().unwrap();
        if let Ok(text) = message.to_text()
            && !text.is_empty()
        {
            return serde_json::from_str(text).unwrap();
        }
    }
}

fn client(url: &str) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::Gradium, "gd-key"))
        .config(ClientConfig::builder().base_url(Provider::Gradium, url).build())
        .build()
        .unwrap()
        .create_client(Capability::SpeechGeneration, "default", None)
        .unwrap()
}

fn joined_audio() -> Vec<u8> {
    [PCM_A, PCM_B].concat()
}

#[tokio::test]
async fn session_frames_follow_the_script() {
    let (url, seen) = serve_once(false).await;
    let output = client(&url)
        .generate(
            &Input::speech("Bonjour"),
            &Parameters::new().with(Param::Voice, "Kent"),
        )
        .await
        .unwrap();

    let frames = seen.await.unwrap();
    assert_eq!(frames[0]["type"], "setup");
    assert_eq!(frames[0]["voice_id"], "LFZvm12tW_z0xfGo");
    assert_eq!(frames[0]["output_format"], "wav");
    assert_eq!(frames[1], json!({"type": "text", "text": "Bonjour"}));
    assert_eq!(frames[2]["type"], "end_of_stream");

    let Content::Audio(audio) = &output.content else {
        panic!("expected audio, got {:?}", output.content);
    };
    assert_eq!(audio.data.as_deref(), Some(joined_audio().as_slice()));
    assert_eq!(audio.mime_type, Some(MimeType::Wav));
}

#[tokio::test]
async fn streamed_frames_become_audio_chunks() {
    let (url, _seen) = serve_once(false).await;
    let mut stream = client(&url)
        .stream(&Input::speech("Bonjour"), &Parameters::new())
        .await
        .unwrap();
    let chunks = support::collect_chunks(&mut stream).await;
    assert_eq!(chunks.len(), 3);

    let output = stream.output().unwrap();
    let Content::Audio(audio) = &output.content else {
        panic!("expected audio");
    };
    assert_eq!(audio.data.as_deref(), Some(joined_audio().as_slice()));
    assert_eq!(audio.mime_type, Some(MimeType::Wav));
    assert_eq!(output.finish_reason, Some(FinishReason::new("stop")));
}

#[tokio::test]
async fn rejected_setup_is_a_websocket_error() {
    let (url, _seen) = serve_once(true).await;
    let err = client(&url)
        .generate(&Input::speech("Bonjour"), &Parameters::new())
        .await
        .unwrap_err();
    match err {
        OmniError::WebSocket(message) => assert_eq!(message, "unknown voice"),
        other => panic!("expected WebSocket error, got {other:?}"),
    }
}
