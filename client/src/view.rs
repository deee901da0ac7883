//! View capability set.
//!
//! The client never owns rendering state. A [`ChatView`] implementation is
//! injected at construction and receives every lifecycle and chat dispatch;
//! the cli ships a console view, tests ship recording ones.

/// Which side of the connection a chat line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    /// Typed locally; echoed at send time without waiting for the peer.
    Local,
    /// Carried by an inbound `message` event.
    Remote,
}

/// One rendered chat line.
///
/// Messages are not retained anywhere in the client; views decide what to
/// keep. `seq` records creation order across local and remote lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Originating side.
    pub sender: Sender,
    /// Chat text as typed or as received.
    pub text: String,
    /// Client-assigned creation order, strictly increasing.
    pub seq: u64,
}

/// Capabilities the client needs from its rendering collaborator.
///
/// Dispatches are serialized: the connection task never runs two callbacks
/// concurrently, and local echoes run on the caller of `send`.
pub trait ChatView: Send + Sync + 'static {
    /// A session was established. `connection_id` is the peer-assigned
    /// identifier for this connection.
    fn on_connect(&self, connection_id: &str);

    /// The session ended, voluntarily or remotely. Dispatched at most once
    /// per established connection.
    fn on_disconnect(&self);

    /// A chat line to append, local echo or remote.
    fn on_message(&self, message: &ChatMessage);
}
