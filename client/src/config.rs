//! Connection configuration.

use std::time::Duration;

use crate::error::ClientError;

/// Delay between reconnection attempts when reconnection is enabled.
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_secs(3);

/// Reconnection attempt budget. Resets after every successful dial.
pub const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 10;

/// Endpoint, credential, and lifecycle knobs for a
/// [`ChatClient`](crate::ChatClient).
///
/// Only `endpoint` and `token` carry required values; reconnection is
/// disabled by default and opted into through the builder methods.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server endpoint as an `http(s)` or `ws(s)` URL.
    pub endpoint: String,
    /// Static credential sent as `Authorization: Bearer <token>` on the
    /// websocket upgrade. Never refreshed or rotated.
    pub token: String,
    /// Re-dial automatically after a failed dial or a remote-initiated drop.
    pub reconnection: bool,
    /// Delay between reconnection attempts.
    pub reconnection_delay: Duration,
    /// Re-dials allowed after the initial attempt of a connection.
    pub reconnection_attempts: u32,
}

impl ClientConfig {
    /// Create a configuration for the given endpoint and credential.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            reconnection: false,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
        }
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub fn with_reconnection(mut self, enabled: bool) -> Self {
        self.reconnection = enabled;
        self
    }

    /// Override the delay between reconnection attempts.
    #[must_use]
    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.reconnection_delay = delay;
        self
    }

    /// Override the reconnection attempt budget.
    #[must_use]
    pub fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.reconnection_attempts = attempts;
        self
    }

    /// Websocket URL for the upgrade request.
    ///
    /// `http(s)` endpoints map to the matching `ws(s)` scheme; `ws(s)`
    /// endpoints pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] for any other scheme.
    pub fn ws_url(&self) -> Result<String, ClientError> {
        if let Some(rest) = self.endpoint.strip_prefix("http://") {
            return Ok(format!("ws://{rest}"));
        }
        if let Some(rest) = self.endpoint.strip_prefix("https://") {
            return Ok(format!("wss://{rest}"));
        }
        if self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://") {
            return Ok(self.endpoint.clone());
        }

        Err(ClientError::InvalidEndpoint(self.endpoint.clone()))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
