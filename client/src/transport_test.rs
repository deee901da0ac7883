use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::{accept_async, accept_hdr_async};

use super::*;
use crate::client::ChatClient;
use crate::view::{ChatMessage, ChatView};
use events::Event;

// =============================================================================
// HELPERS
// =============================================================================

#[derive(Debug)]
enum ViewEvent {
    Connected(String),
    Disconnected,
    Message(String),
}

struct RecordingView {
    tx: mpsc::UnboundedSender<ViewEvent>,
}

impl ChatView for RecordingView {
    fn on_connect(&self, connection_id: &str) {
        let _ = self.tx.send(ViewEvent::Connected(connection_id.to_owned()));
    }

    fn on_disconnect(&self) {
        let _ = self.tx.send(ViewEvent::Disconnected);
    }

    fn on_message(&self, message: &ChatMessage) {
        let _ = self.tx.send(ViewEvent::Message(message.text.clone()));
    }
}

async fn recv_view(rx: &mut mpsc::UnboundedReceiver<ViewEvent>) -> ViewEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a view dispatch")
        .expect("view channel closed unexpectedly")
}

// =============================================================================
// DIALER
// =============================================================================

#[tokio::test]
async fn dial_carries_bearer_credential_and_frames_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let (auth_tx, auth_rx) = oneshot::channel::<Option<String>>();

    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut auth = None;
        let mut ws = accept_hdr_async(stream, |request: &Request, response: Response| {
            auth = request
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(ToOwned::to_owned);
            Ok(response)
        })
        .await
        .expect("server handshake");
        let _ = auth_tx.send(auth);

        // Echo the first text frame back, then hold the connection open.
        while let Some(message) = ws.next().await {
            match message.expect("server recv") {
                Message::Text(text) => {
                    ws.send(Message::Text(text)).await.expect("server echo");
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let config = ClientConfig::new(format!("http://{addr}"), "sekrit");
    let mut transport = WsDialer.dial(&config).await.expect("dial");

    let auth = timeout(Duration::from_millis(500), auth_rx)
        .await
        .expect("timed out waiting for the handshake")
        .expect("auth channel closed");
    assert_eq!(auth.as_deref(), Some("Bearer sekrit"));

    transport.send("ping-frame".to_owned()).await.expect("send");
    let echoed = timeout(Duration::from_millis(500), transport.recv())
        .await
        .expect("timed out waiting for the echo")
        .expect("stream should still be open")
        .expect("echo should be a frame");
    assert_eq!(echoed, "ping-frame");

    transport.close().await.expect("close");
    let _ = peer.await;
}

#[tokio::test]
async fn dial_reports_transport_error_when_peer_is_down() {
    // Bind and drop so the port is known-closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let config = ClientConfig::new(format!("http://{addr}"), "test");

    let err = WsDialer.dial(&config).await.expect_err("dial must fail");
    assert!(matches!(err, ClientError::TransportConnect(_)));
}

#[tokio::test]
async fn dial_rejects_unknown_scheme() {
    let config = ClientConfig::new("ftp://127.0.0.1:9", "test");

    let err = WsDialer
        .dial(&config)
        .await
        .expect_err("scheme must be rejected");
    assert!(matches!(err, ClientError::InvalidEndpoint(_)));
}

#[tokio::test]
async fn recv_returns_none_after_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("server handshake");
        ws.close(None).await.expect("server close");
    });

    let config = ClientConfig::new(format!("ws://{addr}"), "test");
    let mut transport = WsDialer.dial(&config).await.expect("dial");

    let next = timeout(Duration::from_secs(1), transport.recv())
        .await
        .expect("timed out waiting for the close");
    assert!(next.is_none());
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn chat_session_over_a_real_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("server handshake");
        ws.send(Message::text(events::encode_event(&Event::connect("sock-1"))))
            .await
            .expect("send connect event");

        while let Some(message) = ws.next().await {
            let Ok(message) = message else { break };
            match message {
                Message::Text(text) => {
                    let _ = frame_tx.send(text.to_string());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = ChatClient::new(Arc::new(RecordingView { tx }));
    client.initialize(ClientConfig::new(format!("http://{addr}"), "test"));

    let connected = recv_view(&mut rx).await;
    assert!(matches!(connected, ViewEvent::Connected(ref id) if id == "sock-1"));
    assert!(client.is_connected());
    assert_eq!(client.connection_id().as_deref(), Some("sock-1"));

    client.send("over the wire").expect("send while connected");
    let echo = recv_view(&mut rx).await;
    assert!(matches!(echo, ViewEvent::Message(ref text) if text == "over the wire"));

    let raw = timeout(Duration::from_secs(1), frame_rx.recv())
        .await
        .expect("timed out waiting for the peer frame")
        .expect("peer channel closed");
    let event = events::decode_event(&raw).expect("outbound frame decodes");
    assert_eq!(event.name, events::MESSAGE);
    let payload = events::MessagePayload::from_event(&event).expect("message payload");
    assert_eq!(payload.live_chat_id, events::DEFAULT_LIVE_CHAT_ID);
    assert_eq!(payload.message, "over the wire");

    client.disconnect().await;
    let disconnected = recv_view(&mut rx).await;
    assert!(matches!(disconnected, ViewEvent::Disconnected));
}
