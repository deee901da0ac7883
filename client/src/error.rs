//! Client error taxonomy.

/// Errors surfaced by client operations and the transport seam.
///
/// Connection establishment deliberately reports nothing through return
/// values: a failed attempt is observed as the absence of a `connect`
/// dispatch, so only the transport layer and synchronous preconditions
/// produce errors here.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The operation requires a live connection.
    #[error("not connected")]
    NotConnected,

    /// The configured endpoint does not map to a websocket URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The configured credential cannot be carried as a handshake header.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Dialing or upgrading the connection failed.
    #[error("connect failed: {0}")]
    TransportConnect(String),

    /// Sending a frame on an established connection failed.
    #[error("send failed: {0}")]
    TransportSend(String),

    /// Receiving a frame on an established connection failed.
    #[error("receive failed: {0}")]
    TransportReceive(String),

    /// Closing the connection failed.
    #[error("close failed: {0}")]
    TransportClose(String),
}
