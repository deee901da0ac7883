//! Shared named-event model and JSON codec for the realtime chat wire.
//!
//! This crate owns the wire representation used by the client and any peer
//! implementation (test peers included). A frame is one JSON text message
//! carrying an event name plus positional arguments, so the envelope stays
//! fixed while payloads stay flexible (`serde_json::Value`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event announcing a freshly established session; the first argument is the
/// peer-assigned connection identifier.
pub const CONNECT: &str = "connect";

/// Event announcing that the peer is dropping the session.
pub const DISCONNECT: &str = "disconnect";

/// Chat traffic, in both directions.
pub const MESSAGE: &str = "message";

/// Room subscription request; the first argument is the room identifier.
pub const JOIN: &str = "join";

/// Room unsubscription request; carries no arguments.
pub const LEAVE: &str = "leave";

/// Room identifier stamped on every outbound chat message. The wire only has
/// one chat room today; peers reject nothing, they just route by this value.
pub const DEFAULT_LIVE_CHAT_ID: i64 = 1;

/// Error returned by [`decode_event`] and [`MessagePayload::from_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw text could not be parsed as a JSON event frame.
    #[error("failed to decode event frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// The frame parsed but its `event` name is empty.
    #[error("event frame has an empty name")]
    EmptyName,
}

/// A single named event on the chat wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `"message"`.
    #[serde(rename = "event")]
    pub name: String,
    /// Positional arguments; may be empty and defaults to empty on the wire.
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Body of an outbound chat `message` event.
///
/// Inbound `message` events do not use this shape: peers broadcast the bare
/// text as the first positional argument instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Room the message is addressed to.
    pub live_chat_id: i64,
    /// Chat text as typed by the user.
    pub message: String,
}

impl Event {
    /// Create an event with the given name and no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append one positional argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Session announcement carrying the peer-assigned identifier.
    #[must_use]
    pub fn connect(connection_id: &str) -> Self {
        Self::new(CONNECT).with_arg(connection_id)
    }

    /// Session teardown announcement.
    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(DISCONNECT)
    }

    /// Outbound chat message addressed to the given room.
    #[must_use]
    pub fn message(live_chat_id: i64, text: &str) -> Self {
        let payload = MessagePayload {
            live_chat_id,
            message: text.to_owned(),
        };
        // `to_value` on a struct of primitives cannot fail.
        Self::new(MESSAGE).with_arg(serde_json::to_value(&payload).unwrap_or_default())
    }

    /// Room subscription request.
    #[must_use]
    pub fn join(room: &str) -> Self {
        Self::new(JOIN).with_arg(room)
    }

    /// Room unsubscription request.
    #[must_use]
    pub fn leave() -> Self {
        Self::new(LEAVE)
    }

    /// Positional argument at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Positional argument at `index` as a string slice, if present and a string.
    #[must_use]
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }
}

impl MessagePayload {
    /// Parse the payload from the first argument of an outbound-shaped
    /// `message` event.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the first argument is missing or
    /// not a valid payload object.
    pub fn from_event(event: &Event) -> Result<Self, CodecError> {
        let arg = event.args.first().cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(arg)?)
    }
}

/// Encode an event into its JSON text form.
#[must_use]
pub fn encode_event(event: &Event) -> String {
    // A name plus Vec<Value> has no non-string map keys, so serialization
    // cannot fail.
    serde_json::to_string(event).unwrap_or_default()
}

/// Decode JSON text into an event.
///
/// Unknown extra fields on the frame are tolerated and dropped; a missing
/// `args` field decodes as an empty argument list.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON or a missing `event`
/// field, and [`CodecError::EmptyName`] when the name is present but empty.
pub fn decode_event(text: &str) -> Result<Event, CodecError> {
    let event: Event = serde_json::from_str(text)?;
    if event.name.is_empty() {
        return Err(CodecError::EmptyName);
    }
    Ok(event)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
