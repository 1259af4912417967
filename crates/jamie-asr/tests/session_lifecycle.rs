// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end scenario tests for the ASR Session against an in-process mock
//! vendor server, the way `crates/engine/tests/` exercises a full pipeline
//! rather than a single function.

use futures::{SinkExt, StreamExt};
use jamie_asr::{spawn, RecognitionState, SessionConfig};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

async fn mock_server() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (format!("ws://{addr}"), listener)
}

#[tokio::test]
async fn session_opens_and_reaches_open_after_handshake() {
    let (endpoint, listener) = mock_server().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        let Some(Ok(Message::Text(text))) = ws.next().await else { panic!("expected StartRecognition") };
        assert!(text.contains("StartRecognition"));
        ws
    });

    let config = SessionConfig { endpoint, language: "en".into(), max_delay: 0.8, punctuation_enabled: true };
    let cancellation = CancellationToken::new();
    let (handle, _hyp_rx) = spawn(config, cancellation.clone());

    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
    while handle.state() != RecognitionState::Open && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    assert_eq!(handle.state(), RecognitionState::Open);

    cancellation.cancel();
    server.await.expect("server task");
}

#[tokio::test]
async fn session_forwards_hypotheses_in_order() {
    let (endpoint, listener) = mock_server().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        let Some(Ok(Message::Text(_))) = ws.next().await else { panic!("expected StartRecognition") };

        let partial = r#"{"message":"AddPartialTranscript","results":[
            {"start_time":0.0,"end_time":0.4,"type":"word","is_eos":false,"attaches_to":"none",
             "alternatives":[{"content":"hell","confidence":0.4}]}
        ]}"#;
        ws.send(Message::Text(partial.into())).await.expect("send partial");

        let final_frame = r#"{"message":"AddTranscript","results":[
            {"start_time":0.0,"end_time":0.4,"type":"word","is_eos":false,"attaches_to":"none",
             "alternatives":[{"content":"hello","confidence":0.9}]},
            {"start_time":0.4,"end_time":0.9,"type":"word","is_eos":true,"attaches_to":"none",
             "alternatives":[{"content":"world","confidence":0.95}]}
        ]}"#;
        ws.send(Message::Text(final_frame.into())).await.expect("send final");

        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        ws
    });

    let config = SessionConfig { endpoint, language: "en".into(), max_delay: 0.8, punctuation_enabled: true };
    let cancellation = CancellationToken::new();
    let (handle, mut hyp_rx) = spawn(config, cancellation.clone());

    let first = hyp_rx.recv().await.expect("first hypothesis");
    assert!(!first.is_final);
    assert_eq!(first.results[0].alternatives[0].content, "hell");

    let second = hyp_rx.recv().await.expect("second hypothesis");
    assert!(second.is_final);
    assert_eq!(second.results.len(), 2);
    assert_eq!(second.results[0].alternatives[0].content, "hello");
    assert_eq!(second.results[1].alternatives[0].content, "world");

    cancellation.cancel();
    let _ = handle.state();
    server.await.expect("server task");
}

#[tokio::test]
async fn closing_the_handle_drains_to_closed() {
    let (endpoint, listener) = mock_server().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        let Some(Ok(Message::Text(_))) = ws.next().await else { panic!("expected StartRecognition") };
        // Drain the EndOfStream control frame the session sends on close.
        let Some(Ok(Message::Text(text))) = ws.next().await else { panic!("expected EndOfStream") };
        assert!(text.contains("EndOfStream"));
    });

    let config = SessionConfig { endpoint, language: "en".into(), max_delay: 0.8, punctuation_enabled: true };
    let cancellation = CancellationToken::new();
    let (handle, _hyp_rx) = spawn(config, cancellation);

    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
    while handle.state() != RecognitionState::Open && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }

    handle.close().await;

    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
    while handle.state() != RecognitionState::Closed && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    assert_eq!(handle.state(), RecognitionState::Closed);

    server.await.expect("server task");
}
