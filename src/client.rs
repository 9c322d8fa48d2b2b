//! Async room client.
//!
//! [`RoomClient`] is a cheap, cloneable handle. Each [`connect`](RoomClient::connect)
//! spawns a background channel task that opens a transport through the
//! configured [`Connector`], forwards queued command frames and applies every
//! inbound event to the shared [`Session`]. The session lives in a
//! [`tokio::sync::watch`] channel so the presentation layer can render the
//! latest state and await changes via [`RoomClient::subscribe`].
//!
//! Commands are fire-and-forget. They return immediately; outcomes show up as
//! later session changes. A command issued while no channel is open is
//! dropped, never queued.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = RoomClient::websocket(RoomConfig::from_env());
//! let mut session = client.subscribe();
//!
//! let host = client.downgrade();
//! client.connect_then(move || {
//!     if let Some(host) = host.upgrade() {
//!         host.create_room("Alice", RoomType::Duo);
//!     }
//! });
//!
//! while session.changed().await.is_ok() {
//!     let state = session.borrow_and_update().clone();
//!     if let Some(code) = state.room_code() {
//!         println!("share code {code}");
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::error::Result;
use crate::protocol::{ClientMessage, RoomType};
use crate::session::{ConnectionStatus, Generation, Session};
use crate::transport::{Connector, Transport};

/// Server used when neither the config nor the environment names one.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8030/ws/match";

/// Environment variable read by [`RoomConfig::from_env`].
pub const SERVER_URL_ENV: &str = "MATCH_SERVER_URL";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RoomClient`].
///
/// # Example
///
/// ```
/// use familimatch_room::client::RoomConfig;
/// use std::time::Duration;
///
/// let config = RoomConfig::new("wss://match.example.com/ws/match")
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_consent_on_file(true);
/// assert_eq!(config.server_url, "wss://match.example.com/ws/match");
/// assert!(config.consent_on_file);
/// ```
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Room server endpoint.
    pub server_url: String,
    /// How long the WebSocket connector waits for the handshake.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// How long [`RoomClient::shutdown`] waits for the channel task before
    /// aborting it. A zero timeout aborts immediately.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Whether the user already granted biometric consent in an earlier
    /// visit. Storing that decision is the caller's job.
    pub consent_on_file: bool,
}

impl RoomConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            consent_on_file: false,
        }
    }

    /// Read the server URL from `MATCH_SERVER_URL`, falling back to
    /// [`DEFAULT_SERVER_URL`].
    pub fn from_env() -> Self {
        Self::new(server_url_or_default(std::env::var(SERVER_URL_ENV).ok()))
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_consent_on_file(mut self, consent_on_file: bool) -> Self {
        self.consent_on_file = consent_on_file;
        self
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

fn server_url_or_default(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
}

// ── Channel ownership ───────────────────────────────────────────────

type OnReady = Box<dyn FnOnce() + Send + 'static>;

/// The one live channel. Dropping it drops both senders, which the channel
/// task treats as a shutdown request.
struct ActiveChannel {
    generation: Generation,
    cmd_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl ActiveChannel {
    /// Ask the task to close its transport and hand back its join handle.
    /// Frames already queued are flushed first.
    fn close(self) -> tokio::task::JoinHandle<()> {
        let _ = self.shutdown_tx.send(());
        self.task
    }
}

struct ClientInner<C> {
    connector: Arc<C>,
    state: Arc<watch::Sender<Session>>,
    channel: Mutex<Option<ActiveChannel>>,
    shutdown_timeout: Duration,
}

impl<C> Drop for ClientInner<C> {
    fn drop(&mut self) {
        // No executor to await a graceful close here.
        let slot = self.channel.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(channel) = slot.take() {
            channel.task.abort();
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to one room session.
///
/// Clones share the same session and channel.
pub struct RoomClient<C: Connector> {
    inner: Arc<ClientInner<C>>,
}

impl<C: Connector> Clone for RoomClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`RoomClient`], for callbacks that run on the
/// channel task.
pub struct WeakRoomClient<C: Connector> {
    inner: Weak<ClientInner<C>>,
}

impl<C: Connector> WeakRoomClient<C> {
    /// The client, if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<RoomClient<C>> {
        self.inner.upgrade().map(|inner| RoomClient { inner })
    }
}

impl<C: Connector> Clone for WeakRoomClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

#[cfg(feature = "transport-websocket")]
impl RoomClient<crate::transports::WebSocketConnector> {
    /// Client that dials `config.server_url` over WebSocket.
    pub fn websocket(config: RoomConfig) -> Self {
        let connector = crate::transports::WebSocketConnector::new(
            config.server_url.clone(),
            config.connect_timeout,
        );
        Self::new(connector, config)
    }
}

impl<C: Connector> RoomClient<C> {
    /// Create an idle client. Nothing is opened until [`connect`](Self::connect).
    pub fn new(connector: C, config: RoomConfig) -> Self {
        let (state, _) = watch::channel(Session::new(config.consent_on_file));
        Self {
            inner: Arc::new(ClientInner {
                connector: Arc::new(connector),
                state: Arc::new(state),
                channel: Mutex::new(None),
                shutdown_timeout: config.shutdown_timeout,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRoomClient<C> {
        WeakRoomClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ── State ───────────────────────────────────────────────────────

    /// Watch the session. Every applied transition marks the receiver changed.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.borrow().status()
    }

    // ── Connection ──────────────────────────────────────────────────

    /// Open a fresh channel, replacing any existing one.
    ///
    /// Returns immediately; the status moves to `Connecting` and later to
    /// `Connected` or `Error`.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        self.open_channel(None);
    }

    /// Like [`connect`](Self::connect), then run `on_ready` once the channel
    /// is open. The callback runs on the channel task; commands issued from it
    /// are sent before any later frame.
    ///
    /// The channel task owns `on_ready` until the connect resolves. A callback
    /// that captures a [`RoomClient`] keeps the client alive for that long,
    /// forever if the connector never returns. Capture a
    /// [`downgrade`](Self::downgrade)d handle instead so dropping the last
    /// client still tears the channel down.
    pub fn connect_then(&self, on_ready: impl FnOnce() + Send + 'static) {
        self.open_channel(Some(Box::new(on_ready)));
    }

    fn open_channel(&self, on_ready: Option<OnReady>) {
        let mut slot = self.lock_channel();

        // Bump the generation before touching the old channel so that its
        // close is already stale when it lands.
        let mut generation = 0;
        self.inner
            .state
            .send_modify(|s| generation = s.begin_connect());

        if let Some(old) = slot.take() {
            debug!(
                old = old.generation,
                new = generation,
                "replacing existing channel"
            );
            drop(old.close());
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(channel_task(
            Arc::clone(&self.inner.connector),
            Arc::clone(&self.inner.state),
            generation,
            cmd_rx,
            shutdown_rx,
            on_ready,
        ));

        *slot = Some(ActiveChannel {
            generation,
            cmd_tx,
            shutdown_tx,
            task,
        });
    }

    /// Leave the room: send `leave`, close the channel and reset to idle
    /// regardless of any reply. Calling it while idle does nothing.
    pub fn leave(&self) {
        let mut slot = self.lock_channel();
        if let Some(channel) = slot.take() {
            if self.is_open(&channel) {
                let msg = self.inner.state.borrow().leave();
                self.forward(&channel, &msg);
            }
            drop(channel.close());
        }
        self.inner.state.send_if_modified(|s| {
            if s.is_idle() {
                return false;
            }
            s.reset();
            true
        });
    }

    /// Tear the session down without sending `leave` (the user navigated
    /// away). Waits up to the configured shutdown timeout for the channel
    /// task, then aborts it.
    pub async fn shutdown(&self) {
        debug!("RoomClient: shutdown requested");

        let channel = self.lock_channel().take();
        self.inner.state.send_modify(Session::reset);

        let Some(channel) = channel else {
            return;
        };
        let mut task = channel.close();
        match tokio::time::timeout(self.inner.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => {
                warn!("channel task terminated with join error: {join_err}");
            }
            Err(_) => {
                warn!("channel task did not exit within timeout; aborting");
                task.abort();
                if let Err(join_err) = task.await {
                    debug!("channel task aborted: {join_err}");
                }
            }
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    /// `create_room {name, room_type}`.
    pub fn create_room(&self, name: impl Into<String>, room_type: RoomType) {
        let name = name.into();
        self.command(|s| Some(s.create_room(name, room_type)));
    }

    /// `join_room {name, room_code}`.
    pub fn join_room(&self, name: impl Into<String>, room_code: impl Into<String>) {
        let name = name.into();
        let room_code = room_code.into();
        self.command(|s| Some(s.join_room(name, room_code)));
    }

    /// `grant_consent {}`, clearing the consent prompt immediately.
    pub fn grant_consent(&self) {
        self.command(|s| Some(s.grant_consent()));
    }

    /// Leave the lobby: grant consent if it is on hand and go to upload,
    /// otherwise show the consent prompt.
    pub fn room_ready(&self) {
        self.command(Session::room_ready);
    }

    /// `upload_photo {photo}` with any `data:` URI header removed.
    pub fn upload_photo(&self, image: &str) {
        self.command(|s| Some(s.upload_photo(image)));
    }

    /// `ready {}`.
    pub fn mark_ready(&self) {
        self.command(|s| Some(s.mark_ready()));
    }

    /// Send an arbitrary `{type, data}` frame over the open channel.
    ///
    /// Dropped silently when no channel is open, like every command.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::EmptyMessageType`](crate::RoomError::EmptyMessageType)
    /// if `kind` is empty.
    pub fn send_raw(&self, kind: &str, data: serde_json::Value) -> Result<()> {
        let frame = codec::encode_raw(kind, data)?;
        let slot = self.lock_channel();
        match slot.as_ref().filter(|c| self.is_open(c)) {
            Some(channel) => push_frame(channel, kind, frame),
            None => debug!(kind, "channel not open, dropping frame"),
        }
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Apply a command to the session and send what it produces, but only
    /// while a channel is open.
    ///
    /// The open check runs inside the same `watch` update as the command, so
    /// a close applied by the channel task cannot land in between.
    fn command<F>(&self, build: F)
    where
        F: FnOnce(&mut Session) -> Option<ClientMessage>,
    {
        let slot = self.lock_channel();
        let Some(channel) = slot.as_ref() else {
            debug!("no channel, dropping command");
            return;
        };

        let mut outbound = None;
        let applied = self.inner.state.send_if_modified(|s| {
            if !s.is_connected() || s.generation() != channel.generation {
                return false;
            }
            outbound = build(s);
            true
        });

        if !applied {
            debug!(generation = channel.generation, "channel not open, dropping command");
            return;
        }
        if let Some(msg) = outbound {
            self.forward(channel, &msg);
        }
    }

    fn forward(&self, channel: &ActiveChannel, msg: &ClientMessage) {
        match codec::encode(msg) {
            Ok(frame) => push_frame(channel, msg.kind(), frame),
            Err(e) => error!(kind = msg.kind(), "failed to encode command: {e}"),
        }
    }

    fn is_open(&self, channel: &ActiveChannel) -> bool {
        let session = self.inner.state.borrow();
        session.is_connected() && session.generation() == channel.generation
    }

    fn lock_channel(&self) -> MutexGuard<'_, Option<ActiveChannel>> {
        self.inner
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector> std::fmt::Debug for RoomClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.state.borrow();
        f.debug_struct("RoomClient")
            .field("status", &session.status())
            .field("generation", &session.generation())
            .field("room_code", &session.room_code())
            .field("phase", session.phase())
            .finish()
    }
}

fn push_frame(channel: &ActiveChannel, kind: &str, frame: String) {
    debug!(generation = channel.generation, kind, "queueing frame");
    if channel.cmd_tx.send(frame).is_err() {
        debug!(kind, "channel task gone, dropping frame");
    }
}

// ── Channel task ────────────────────────────────────────────────────

/// Open one transport and pump it until it closes, fails or is told to stop.
///
/// Every session update is tagged with `generation`, so once this channel
/// has been superseded its callbacks are no-ops.
async fn channel_task<C: Connector>(
    connector: Arc<C>,
    state: Arc<watch::Sender<Session>>,
    generation: Generation,
    mut cmd_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: oneshot::Receiver<()>,
    on_ready: Option<OnReady>,
) {
    debug!(generation, "channel task started");

    let opened = tokio::select! {
        result = connector.connect() => result,
        _ = &mut shutdown_rx => {
            debug!(generation, "connect abandoned");
            return;
        }
    };

    let mut transport = match opened {
        Ok(transport) => transport,
        Err(e) => {
            error!(generation, "failed to open room channel: {e}");
            state.send_if_modified(|s| s.channel_failed(generation));
            return;
        }
    };

    if !state.send_if_modified(|s| s.channel_opened(generation)) {
        debug!(generation, "channel opened after being superseded, closing it");
        let _ = transport.close().await;
        return;
    }
    info!(generation, "room channel open");

    if let Some(on_ready) = on_ready {
        on_ready();
    }

    loop {
        tokio::select! {
            // Queued commands go out before a shutdown is honoured, so a
            // `leave` issued right before closing still reaches the server.
            biased;

            cmd = cmd_rx.recv() => {
                let Some(frame) = cmd else {
                    debug!(generation, "command channel closed");
                    let _ = transport.close().await;
                    break;
                };
                if let Err(e) = transport.send(frame).await {
                    error!(generation, "transport send error: {e}");
                    state.send_if_modified(|s| s.channel_failed(generation));
                    break;
                }
            }

            _ = &mut shutdown_rx => {
                debug!(generation, "shutdown signal received");
                if let Err(e) = transport.close().await {
                    debug!(generation, "close handshake failed: {e}");
                }
                break;
            }

            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => apply_frame(&state, generation, &text),
                Some(Err(e)) => {
                    error!(generation, "transport receive error: {e}");
                    state.send_if_modified(|s| s.channel_failed(generation));
                    break;
                }
                None => {
                    debug!(generation, "room channel closed by server");
                    state.send_if_modified(|s| s.channel_closed(generation));
                    break;
                }
            },
        }
    }

    debug!(generation, "channel task exited");
}

fn apply_frame(state: &watch::Sender<Session>, generation: Generation, text: &str) {
    match codec::decode(text) {
        Ok(Some(msg)) => {
            debug!(generation, kind = msg.kind(), "server event");
            state.send_if_modified(|s| s.apply(generation, msg));
        }
        Ok(None) => debug!(generation, "ignoring unrecognized message type"),
        Err(e) => warn!(generation, len = text.len(), "discarding frame: {e}"),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::error::RoomError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Replays scripted frames, then stays open until closed.
    struct ScriptedTransport {
        incoming: VecDeque<Option<std::result::Result<String, RoomError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), RoomError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, RoomError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), RoomError> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    /// Hands out one scripted transport per `connect`.
    struct ScriptedConnector {
        scripts: StdMutex<VecDeque<Vec<Option<std::result::Result<String, RoomError>>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedConnector {
        fn new(
            scripts: Vec<Vec<Option<std::result::Result<String, RoomError>>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let connector = Self {
                scripts: StdMutex::new(scripts.into()),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (connector, sent, closed)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = ScriptedTransport;

        async fn connect(&self) -> std::result::Result<ScriptedTransport, RoomError> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| RoomError::Io(std::io::ErrorKind::ConnectionRefused.into()))?;
            Ok(ScriptedTransport {
                incoming: script.into(),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
            })
        }
    }

    async fn wait_until(
        rx: &mut watch::Receiver<Session>,
        pred: impl FnMut(&Session) -> bool,
    ) -> Session {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("timed out waiting for session")
            .map(|state| Session::clone(&state))
            .expect("session sender dropped")
    }

    #[test]
    fn config_defaults() {
        let config = RoomConfig::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert!(!config.consent_on_file);
    }

    #[test]
    fn config_builder_methods() {
        let config = RoomConfig::new("ws://example.test/ws/match")
            .with_connect_timeout(Duration::from_secs(3))
            .with_shutdown_timeout(Duration::ZERO)
            .with_consent_on_file(true);
        assert_eq!(config.server_url, "ws://example.test/ws/match");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.shutdown_timeout, Duration::ZERO);
        assert!(config.consent_on_file);
    }

    #[test]
    fn blank_server_url_falls_back_to_default() {
        assert_eq!(server_url_or_default(None), DEFAULT_SERVER_URL);
        assert_eq!(server_url_or_default(Some("  ".into())), DEFAULT_SERVER_URL);
        assert_eq!(
            server_url_or_default(Some(" wss://m.example/ws ".into())),
            "wss://m.example/ws"
        );
    }

    #[tokio::test]
    async fn commands_before_connect_are_dropped() {
        let (connector, sent, _closed) = ScriptedConnector::new(vec![vec![]]);
        let client = RoomClient::new(connector, RoomConfig::default());

        client.create_room("Alice", RoomType::Duo);
        client.upload_photo("data:image/jpeg;base64,AAAA");

        let session = client.session();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.phase(), &crate::session::Phase::Lobby);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_then_runs_callback_once_open() {
        let room_created =
            r#"{"type":"room_created","data":{"room_code":"5678","player_id":"p_1"}}"#;
        let (connector, sent, _closed) =
            ScriptedConnector::new(vec![vec![Some(Ok(room_created.to_string()))]]);
        let client = RoomClient::new(connector, RoomConfig::default());
        let mut rx = client.subscribe();

        let host = client.clone();
        client.connect_then(move || host.create_room("Alice", RoomType::Duo));

        let session = wait_until(&mut rx, |s| s.room_code().is_some()).await;
        assert!(session.is_host());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let frames = sent.lock().unwrap().clone();
        assert_eq!(frames.len(), 1);
        let envelope: codec::Envelope = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(envelope.kind, "create_room");

        client.shutdown().await;
    }

    #[tokio::test]
    async fn failed_connect_sets_error_status() {
        let (connector, _sent, _closed) = ScriptedConnector::new(vec![]);
        let client = RoomClient::new(connector, RoomConfig::default());
        let mut rx = client.subscribe();

        client.connect();
        let session = wait_until(&mut rx, |s| s.status() == ConnectionStatus::Error).await;
        assert_eq!(
            session.last_error(),
            Some(crate::session::CONNECTION_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_resets() {
        let (connector, _sent, closed) = ScriptedConnector::new(vec![vec![]]);
        let client = RoomClient::new(connector, RoomConfig::default());
        let mut rx = client.subscribe();

        client.connect();
        wait_until(&mut rx, Session::is_connected).await;

        client.shutdown().await;
        assert!(closed.load(Ordering::Acquire));
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn send_raw_rejects_empty_type_and_forwards_otherwise() {
        let (connector, sent, _closed) = ScriptedConnector::new(vec![vec![]]);
        let client = RoomClient::new(connector, RoomConfig::default());
        let mut rx = client.subscribe();

        assert!(matches!(
            client.send_raw("", serde_json::json!({})),
            Err(RoomError::EmptyMessageType)
        ));

        client.connect();
        wait_until(&mut rx, Session::is_connected).await;
        client
            .send_raw("ping", serde_json::Value::Null)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            [r#"{"type":"ping","data":{}}"#]
        );

        client.shutdown().await;
    }
}
