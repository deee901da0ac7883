//! # client
//!
//! Chat client over the named-event websocket wire defined in `events`.
//!
//! [`ChatClient`] owns one logical connection to a remote event-based peer:
//! it translates operations into outbound named events and dispatches
//! inbound events to an injected [`ChatView`]. The [`Transport`]/[`Dialer`]
//! seam keeps the lifecycle testable without sockets.

pub mod client;
pub mod config;
pub mod error;
pub mod transport;
pub mod view;

pub use client::ChatClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use transport::{Dialer, Transport, WsDialer, WsTransport};
pub use view::{ChatMessage, ChatView, Sender};
