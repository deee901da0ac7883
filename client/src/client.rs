//! Connection lifecycle: the [`ChatClient`] handle and its connection task.
//!
//! DESIGN
//! ======
//! `ChatClient` is a thin handle. `initialize`/`connect` spawn a connection
//! task that owns the transport and serializes every inbound dispatch; handle
//! operations reach the task over an unbounded command channel plus a oneshot
//! shutdown signal. Connected-state lives in shared atomics so `send` can
//! check its precondition synchronously on the caller.
//!
//! LIFECYCLE
//! =========
//! 1. `initialize(config)`: task dials; the peer's `connect` event marks the
//!    session established and dispatches `on_connect(id)`.
//! 2. `send`/`join`/`leave`: encode a named event and hand it to the task.
//! 3. Remote `disconnect` event, clean close, or transport error: mark
//!    disconnected, dispatch `on_disconnect` (at most once per established
//!    connection), then re-dial when reconnection is enabled.
//! 4. `disconnect()`: shutdown signal; the task closes the transport and
//!    exits without re-dialing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use events::Event;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{Dialer, Transport, WsDialer};
use crate::view::{ChatMessage, ChatView, Sender};

/// How long `disconnect` waits for the connection task before aborting it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// SHARED STATE
// =============================================================================

/// State shared between the handle and the connection task.
struct Shared {
    /// True from the inbound `connect` event until the session ends.
    connected: AtomicBool,
    /// Peer-assigned identifier. Kept (stale) after disconnect.
    connection_id: Mutex<Option<String>>,
    /// Creation-order counter for [`ChatMessage::seq`].
    seq: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            connection_id: Mutex::new(None),
            seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn set_connection_id(&self, id: &str) {
        let mut slot = self
            .connection_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(id.to_owned());
    }

    fn connection_id(&self) -> Option<String> {
        self.connection_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Channel ends and task handle for one spawned connection task.
struct Session {
    cmd_tx: mpsc::UnboundedSender<Event>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle owning one logical connection to a remote event-based peer.
///
/// Operations return immediately except [`disconnect`], which awaits task
/// shutdown. Establishment outcomes are reported through the injected
/// [`ChatView`], not through return values. Dropping the handle aborts the
/// connection task.
///
/// [`disconnect`]: ChatClient::disconnect
pub struct ChatClient {
    view: Arc<dyn ChatView>,
    dialer: Arc<dyn Dialer>,
    shared: Arc<Shared>,
    config: Mutex<Option<ClientConfig>>,
    session: Mutex<Option<Session>>,
}

impl ChatClient {
    /// Create a client that renders through `view` and dials websockets.
    #[must_use]
    pub fn new(view: Arc<dyn ChatView>) -> Self {
        Self::with_dialer(view, Arc::new(WsDialer))
    }

    /// Create a client with a custom [`Dialer`]. Tests inject mocks here.
    #[must_use]
    pub fn with_dialer(view: Arc<dyn ChatView>, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            view,
            dialer,
            shared: Arc::new(Shared::new()),
            config: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Store `config` and start the first connection attempt.
    ///
    /// Returns immediately; the outcome is observed through the view. A
    /// successful attempt dispatches `on_connect`, a failed one dispatches
    /// nothing and is retried only when reconnection is enabled. Calling
    /// this while a session is live is a warned no-op.
    pub fn initialize(&self, config: ClientConfig) {
        if self.session_live() {
            warn!("initialize while a session is live; ignoring");
            return;
        }
        *self.lock_config() = Some(config.clone());
        self.spawn_session(config);
    }

    /// Re-dial with the stored configuration after a disconnect.
    ///
    /// A warned no-op when `initialize` was never called or when a session
    /// is already live.
    pub fn connect(&self) {
        let Some(config) = self.lock_config().clone() else {
            warn!("connect before initialize; ignoring");
            return;
        };
        if self.session_live() {
            warn!("connect while a session is live; ignoring");
            return;
        }
        self.spawn_session(config);
    }

    /// Voluntarily end the connection and await connection-task shutdown.
    ///
    /// Safe to call at any time; when already disconnected it only logs the
    /// (possibly stale) connection identifier. A voluntary disconnect never
    /// triggers reconnection.
    pub async fn disconnect(&self) {
        match self.shared.connection_id() {
            Some(id) => info!(connection_id = %id, "disconnect requested"),
            None => info!("disconnect requested"),
        }

        let session = self.lock_session().take();
        let Some(mut session) = session else {
            debug!("disconnect with no session");
            return;
        };

        if let Some(shutdown_tx) = session.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut session.task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_error)) => warn!(%join_error, "connection task ended abnormally"),
            Err(_) => {
                warn!("connection task did not exit in time; aborting");
                session.task.abort();
                let _ = session.task.await;
            }
        }

        // Safety net for the abort path; the task normally clears this.
        self.shared.connected.store(false, Ordering::Release);
    }

    /// Send chat text to the fixed room.
    ///
    /// Emits exactly one `message` event and dispatches the local echo
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no session is established;
    /// nothing is emitted and nothing is dispatched.
    pub fn send(&self, text: &str) -> Result<(), ClientError> {
        self.emit(Event::message(events::DEFAULT_LIVE_CHAT_ID, text))?;

        let message = ChatMessage {
            sender: Sender::Local,
            text: text.to_owned(),
            seq: self.shared.next_seq(),
        };
        debug!(seq = message.seq, "local echo");
        self.view.on_message(&message);
        Ok(())
    }

    /// Ask the peer to subscribe this connection to `room`.
    ///
    /// Membership is not tracked locally and nothing is dispatched; when
    /// disconnected the event is silently dropped.
    pub fn join(&self, room: &str) {
        if let Err(error) = self.emit(Event::join(room)) {
            debug!(room, %error, "join dropped");
        }
    }

    /// Ask the peer to unsubscribe this connection from its room.
    ///
    /// Same silence rules as [`join`](ChatClient::join).
    pub fn leave(&self) {
        if let Err(error) = self.emit(Event::leave()) {
            debug!(%error, "leave dropped");
        }
    }

    /// True between the inbound `connect` event and the end of the session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Peer-assigned connection identifier, if one was ever received.
    /// Retained (stale) after disconnect.
    #[must_use]
    pub fn connection_id(&self) -> Option<String> {
        self.shared.connection_id()
    }

    /// Hand one outbound event to the connection task.
    fn emit(&self, event: Event) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let session = self.lock_session();
        let Some(session) = session.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        session
            .cmd_tx
            .send(event)
            .map_err(|_| ClientError::NotConnected)
    }

    fn session_live(&self) -> bool {
        self.lock_session()
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    fn spawn_session(&self, config: ClientConfig) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            Arc::clone(&self.dialer),
            config,
            Arc::clone(&self.view),
            Arc::clone(&self.shared),
            cmd_rx,
            shutdown_rx,
        ));
        *self.lock_session() = Some(Session {
            cmd_tx,
            shutdown_tx: Some(shutdown_tx),
            task,
        });
    }

    fn lock_config(&self) -> MutexGuard<'_, Option<ClientConfig>> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        // No executor to drive a graceful close here; aborting the task
        // drops the transport.
        if let Some(session) = self.lock_session().take() {
            session.task.abort();
        }
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("connected", &self.is_connected())
            .field("connection_id", &self.connection_id())
            .finish()
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

/// How one established session ended.
enum SessionEnd {
    /// Voluntary shutdown: `disconnect` call or handle dropped. Never
    /// re-dial.
    Shutdown,
    /// Remote-initiated: `disconnect` event, clean close, or transport
    /// error.
    Remote,
}

/// Dial, run the session, re-dial while the reconnection budget allows.
/// One task per `initialize`/`connect` call.
async fn run_connection(
    dialer: Arc<dyn Dialer>,
    config: ClientConfig,
    view: Arc<dyn ChatView>,
    shared: Arc<Shared>,
    mut cmd_rx: mpsc::UnboundedReceiver<Event>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(endpoint = %config.endpoint, "connection task started");
    let mut attempts_left = config.reconnection_attempts;

    loop {
        match dialer.dial(&config).await {
            Ok(transport) => {
                // A successful dial earns a fresh reconnection budget.
                attempts_left = config.reconnection_attempts;
                let end =
                    run_session(transport, &view, &shared, &mut cmd_rx, &mut shutdown_rx).await;
                if matches!(end, SessionEnd::Shutdown) {
                    break;
                }
            }
            Err(error) => warn!(%error, "connection attempt failed"),
        }

        if !config.reconnection {
            break;
        }
        if attempts_left == 0 {
            warn!("reconnection attempts exhausted");
            break;
        }
        attempts_left -= 1;
        debug!(delay = ?config.reconnection_delay, attempts_left, "re-dialing after delay");
        tokio::select! {
            () = tokio::time::sleep(config.reconnection_delay) => {}
            _ = &mut shutdown_rx => {
                debug!("shutdown during reconnection wait");
                break;
            }
        }
    }

    debug!("connection task exited");
}

/// Drive one established session until it ends.
async fn run_session(
    mut transport: Box<dyn Transport>,
    view: &Arc<dyn ChatView>,
    shared: &Shared,
    cmd_rx: &mut mpsc::UnboundedReceiver<Event>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    // At most one `on_disconnect` per established connection, however many
    // teardown signals arrive.
    let mut dispatched_disconnect = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(event) => {
                    debug!(event = %event.name, "send event");
                    if let Err(error) = transport.send(events::encode_event(&event)).await {
                        warn!(%error, "transport send failed");
                        end_session(shared, view, &mut dispatched_disconnect);
                        return SessionEnd::Remote;
                    }
                }
                // Handle dropped mid-session; treat like a voluntary
                // disconnect.
                None => {
                    debug!("command channel closed");
                    end_session(shared, view, &mut dispatched_disconnect);
                    let _ = transport.close().await;
                    return SessionEnd::Shutdown;
                }
            },
            _ = &mut *shutdown_rx => {
                debug!("shutdown requested");
                end_session(shared, view, &mut dispatched_disconnect);
                let _ = transport.close().await;
                return SessionEnd::Shutdown;
            }
            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => {
                    if let Some(end) =
                        dispatch_inbound(&text, view, shared, &mut dispatched_disconnect)
                    {
                        let _ = transport.close().await;
                        return end;
                    }
                }
                Some(Err(error)) => {
                    warn!(%error, "transport receive failed");
                    end_session(shared, view, &mut dispatched_disconnect);
                    return SessionEnd::Remote;
                }
                None => {
                    info!("connection closed by peer");
                    end_session(shared, view, &mut dispatched_disconnect);
                    return SessionEnd::Remote;
                }
            }
        }
    }
}

// =============================================================================
// INBOUND DISPATCH
// =============================================================================

/// Decode and dispatch one inbound frame. Returns `Some` when the event ends
/// the session.
fn dispatch_inbound(
    text: &str,
    view: &Arc<dyn ChatView>,
    shared: &Shared,
    dispatched_disconnect: &mut bool,
) -> Option<SessionEnd> {
    let event = match events::decode_event(text) {
        Ok(event) => event,
        Err(error) => {
            warn!(%error, "dropping malformed frame");
            return None;
        }
    };

    match event.name.as_str() {
        events::CONNECT => {
            let connection_id = event.arg_str(0).unwrap_or_default().to_owned();
            shared.set_connection_id(&connection_id);
            shared.connected.store(true, Ordering::Release);
            info!(%connection_id, "connected");
            view.on_connect(&connection_id);
            None
        }
        events::DISCONNECT => {
            info!("peer ended the session");
            end_session(shared, view, dispatched_disconnect);
            Some(SessionEnd::Remote)
        }
        events::MESSAGE => {
            let Some(first) = event.args.first() else {
                warn!("message event without arguments; dropping");
                return None;
            };
            // Only the first argument is rendered; peers may append more.
            let text = match first {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let message = ChatMessage {
                sender: Sender::Remote,
                text,
                seq: shared.next_seq(),
            };
            view.on_message(&message);
            None
        }
        name => {
            debug!(event = name, "ignoring unhandled event");
            None
        }
    }
}

/// Mark the session over and dispatch `on_disconnect` if not yet dispatched.
fn end_session(shared: &Shared, view: &Arc<dyn ChatView>, dispatched_disconnect: &mut bool) {
    shared.connected.store(false, Ordering::Release);
    if !*dispatched_disconnect {
        *dispatched_disconnect = true;
        view.on_disconnect();
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
