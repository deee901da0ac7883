//! Transport seam: text-frame connections and how to dial them.
//!
//! The connection lifecycle is written against [`Transport`] and [`Dialer`]
//! so it can run without sockets in tests. [`WsDialer`] is the production
//! implementation over `tokio-tungstenite`; it carries the bearer credential
//! on the upgrade request.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected bidirectional text-frame channel.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), ClientError>;

    /// Receive the next text frame. `None` means the peer closed cleanly.
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the channel.
    async fn close(&mut self) -> Result<(), ClientError>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Transport")
    }
}

/// Produces a fresh connected [`Transport`] per connection attempt.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Dial the configured endpoint and complete the handshake.
    async fn dial(&self, config: &ClientConfig) -> Result<Box<dyn Transport>, ClientError>;
}

/// Production dialer: websocket upgrade with an `Authorization: Bearer`
/// header built from the configured credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, config: &ClientConfig) -> Result<Box<dyn Transport>, ClientError> {
        let url = config.ws_url()?;
        let mut request = url
            .into_client_request()
            .map_err(|error| ClientError::InvalidEndpoint(error.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|error| ClientError::InvalidCredential(error.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _) = connect_async(request)
            .await
            .map_err(|error| ClientError::TransportConnect(error.to_string()))?;
        debug!(endpoint = %config.endpoint, "websocket established");

        Ok(Box::new(WsTransport { stream }))
    }
}

/// [`Transport`] over a `tokio-tungstenite` websocket stream.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| ClientError::TransportSend(error.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            let message = self.stream.next().await?;
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Ping/pong are answered by tungstenite itself; binary
                // frames are not part of this wire.
                Ok(_) => {}
                Err(error) => {
                    return Some(Err(ClientError::TransportReceive(error.to_string())));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.stream
            .close(None)
            .await
            .map_err(|error| ClientError::TransportClose(error.to_string()))
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
