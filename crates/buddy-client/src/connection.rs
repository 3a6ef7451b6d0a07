//! The connection collaborator.
//!
//! [`Connection`] is the seam between the session controller and the
//! network: named-event subscription, emit, establishment and teardown.
//! [`SocketConnection`] is the production implementation. It spawns one
//! background task per establishment that pumps the socket, re-dials with
//! [`Backoff`] after transport failures, and reports everything as
//! [`TransportEvent`]s through a channel.
//!
//! Use [`SocketConnection::new`] with any [`Connector`], or the convenience
//! constructor [`websocket`](SocketConnection::websocket) (native only).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use buddy_core::chat::ChatId;
use buddy_core::protocol::{ClientMessage, DisconnectReason, ServerMessage, parse_server_frame};
use buddy_core::transport::{Connector, Transport, TransportError, TransportReader, TransportWriter};

use crate::config::{ClientConfig, endpoint_url};
use crate::reconnect::Backoff;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Every event name the controller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    Connect,
    Joined,
    ChatRestore,
    ChatClosed,
    Inactive,
    Disconnect,
    ReconnectAttempt,
    ReconnectError,
}

impl EventName {
    pub const ALL: [EventName; 8] = [
        EventName::Connect,
        EventName::ChatClosed,
        EventName::Joined,
        EventName::ChatRestore,
        EventName::Inactive,
        EventName::Disconnect,
        EventName::ReconnectAttempt,
        EventName::ReconnectError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventName::Connect => "connect",
            EventName::Joined => "joined",
            EventName::ChatRestore => "chat-restore",
            EventName::ChatClosed => "chat-closed",
            EventName::Inactive => "inactive",
            EventName::Disconnect => "disconnect",
            EventName::ReconnectAttempt => "reconnect_attempt",
            EventName::ReconnectError => "reconnect_error",
        }
    }
}

/// Everything a connection can report to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is up (initial establishment or successful reconnect).
    Connect,
    Disconnect(DisconnectReason),
    /// The transport is about to make automatic attempt `n` (1-based).
    ReconnectAttempt(u32),
    /// The last automatic attempt failed.
    ReconnectError,
    Server(ServerMessage),
}

impl TransportEvent {
    pub fn name(&self) -> EventName {
        match self {
            TransportEvent::Connect => EventName::Connect,
            TransportEvent::Disconnect(_) => EventName::Disconnect,
            TransportEvent::ReconnectAttempt(_) => EventName::ReconnectAttempt,
            TransportEvent::ReconnectError => EventName::ReconnectError,
            TransportEvent::Server(ServerMessage::Joined { .. }) => EventName::Joined,
            TransportEvent::Server(ServerMessage::ChatRestore { .. }) => EventName::ChatRestore,
            TransportEvent::Server(ServerMessage::ChatClosed(_)) => EventName::ChatClosed,
            TransportEvent::Server(ServerMessage::Inactive) => EventName::Inactive,
        }
    }
}

/// Transport-level connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Live handler registrations, counted per event name.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    live: HashMap<EventName, usize>,
}

impl Subscriptions {
    pub fn subscribe(&mut self, name: EventName) {
        *self.live.entry(name).or_default() += 1;
    }

    pub fn unsubscribe(&mut self, name: EventName) {
        if let Some(count) = self.live.get_mut(&name) {
            *count -= 1;
            if *count == 0 {
                self.live.remove(&name);
            }
        }
    }

    pub fn is_subscribed(&self, name: EventName) -> bool {
        self.live.contains_key(&name)
    }

    /// Total live registrations across all names.
    pub fn total(&self) -> usize {
        self.live.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Connection trait
// ---------------------------------------------------------------------------

/// A persistent bidirectional channel to the matchmaking server.
///
/// Exactly one [`Runtime`](crate::runtime::Runtime) owns a connection.
/// [`next_event`](Connection::next_event) only yields events that have a
/// live subscription; everything else is dropped.
pub trait Connection: Send {
    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish the connection, resuming `chat_id` when given.
    ///
    /// A failed first dial is returned as an error; the implementation keeps
    /// retrying on its own and reports progress as events.
    fn connect(
        &mut self,
        chat_id: Option<&str>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn emit(&mut self, msg: &ClientMessage) -> Result<(), TransportError>;

    /// Close the connection and stop automatic reconnection.
    fn disconnect(&mut self);

    fn subscribe(&mut self, name: EventName);

    fn unsubscribe(&mut self, name: EventName);

    /// Wait for the next subscribed event.
    fn next_event(&mut self) -> impl Future<Output = TransportEvent> + Send;
}

// ---------------------------------------------------------------------------
// SocketConnection
// ---------------------------------------------------------------------------

/// Item carried from the background task to the connection handle.
#[derive(Debug)]
enum Signal {
    Event(TransportEvent),
    /// Automatic reconnection gave up; nothing more will arrive.
    Exhausted,
}

/// Reconnecting socket connection over any [`Connector`].
pub struct SocketConnection<C: Connector> {
    connector: Arc<C>,
    server_url: String,
    backoff: Backoff,
    max_reconnect_attempts: Option<u32>,
    state: ConnectionState,
    subscriptions: Subscriptions,
    /// Bumped on every establishment and teardown; stale signals are dropped.
    generation: u64,
    events_tx: mpsc::UnboundedSender<(u64, Signal)>,
    events_rx: mpsc::UnboundedReceiver<(u64, Signal)>,
    /// Writer channel of the current generation.
    outgoing: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

#[cfg(feature = "native")]
impl SocketConnection<buddy_core::ws_transport::WsConnector> {
    /// A WebSocket connection configured from `config`.
    pub fn websocket(config: &ClientConfig) -> Self {
        Self::new(buddy_core::ws_transport::WsConnector, config)
    }
}

impl<C: Connector> SocketConnection<C> {
    pub fn new(connector: C, config: &ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector: Arc::new(connector),
            server_url: config.server_url.clone(),
            backoff: config.backoff,
            max_reconnect_attempts: config.max_reconnect_attempts,
            state: ConnectionState::Disconnected,
            subscriptions: Subscriptions::default(),
            generation: 0,
            events_tx,
            events_rx,
            outgoing: None,
            task: None,
        }
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    fn endpoint(&self, chat_id: Option<&str>) -> Result<String, TransportError> {
        endpoint_url(&self.server_url, chat_id)
            .map(String::from)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.outgoing = None;
    }

    /// Track the state implied by an event of the current generation.
    fn observe(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Connect => self.state = ConnectionState::Connected,
            TransportEvent::Disconnect(reason) => {
                self.state = if reason.is_explicit() {
                    ConnectionState::Disconnected
                } else {
                    ConnectionState::Connecting
                };
            }
            TransportEvent::ReconnectAttempt(_) => self.state = ConnectionState::Connecting,
            TransportEvent::ReconnectError | TransportEvent::Server(_) => {}
        }
    }
}

impl<C: Connector> Connection for SocketConnection<C> {
    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self, chat_id: Option<&str>) -> Result<(), TransportError> {
        if self.state != ConnectionState::Disconnected {
            return Ok(());
        }
        let url = self.endpoint(chat_id)?;

        self.stop_task();
        self.generation += 1;
        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.outgoing = Some(cmd_tx);

        let (first, result) = match self.connector.open(&url).await {
            Ok(transport) => (Some(transport), Ok(())),
            Err(e) => (None, Err(e)),
        };

        let session = SocketSession {
            connector: Arc::clone(&self.connector),
            url,
            backoff: self.backoff,
            max_attempts: self.max_reconnect_attempts,
            generation: self.generation,
            events: self.events_tx.clone(),
        };
        self.task = Some(tokio::spawn(session.run(first, cmd_rx)));
        result
    }

    fn emit(&mut self, msg: &ClientMessage) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let frame = msg
            .to_frame()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        match &self.outgoing {
            Some(tx) => tx.send(frame).map_err(|_| TransportError::ConnectionClosed),
            None => Err(TransportError::NotConnected),
        }
    }

    fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected && self.task.is_none() {
            return;
        }
        self.stop_task();
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
        let _ = self.events_tx.send((
            self.generation,
            Signal::Event(TransportEvent::Disconnect(DisconnectReason::ClientDisconnect)),
        ));
    }

    fn subscribe(&mut self, name: EventName) {
        self.subscriptions.subscribe(name);
    }

    fn unsubscribe(&mut self, name: EventName) {
        self.subscriptions.unsubscribe(name);
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            // `events_tx` lives in `self`, so the channel never closes.
            let Some((generation, signal)) = self.events_rx.recv().await else {
                return std::future::pending().await;
            };
            if generation != self.generation {
                tracing::trace!(generation, current = self.generation, "Dropping stale signal");
                continue;
            }
            match signal {
                Signal::Exhausted => {
                    self.state = ConnectionState::Disconnected;
                    self.task = None;
                    self.outgoing = None;
                }
                Signal::Event(event) => {
                    self.observe(&event);
                    if self.subscriptions.is_subscribed(event.name()) {
                        return event;
                    }
                    tracing::trace!(event = event.name().as_str(), "No subscriber, dropping");
                }
            }
        }
    }
}

impl<C: Connector> Drop for SocketConnection<C> {
    fn drop(&mut self) {
        self.stop_task();
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// How a live socket ended.
enum SocketEnd {
    /// The server closed the socket on purpose.
    ServerClosed,
    Failed(DisconnectReason),
    /// The handle dropped its writer channel.
    Abandoned,
}

/// State owned by the background task of one generation.
struct SocketSession<C: Connector> {
    connector: Arc<C>,
    url: String,
    backoff: Backoff,
    max_attempts: Option<u32>,
    generation: u64,
    events: mpsc::UnboundedSender<(u64, Signal)>,
}

impl<C: Connector> SocketSession<C> {
    async fn run(self, first: Option<C::Transport>, mut outgoing: mpsc::UnboundedReceiver<String>) {
        let mut next = first;
        loop {
            let transport = match next.take() {
                Some(transport) => transport,
                None => match self.reconnect().await {
                    Some(transport) => transport,
                    None => {
                        self.send(Signal::Exhausted);
                        return;
                    }
                },
            };

            self.emit(TransportEvent::Connect);
            match self.pump(transport, &mut outgoing).await {
                SocketEnd::ServerClosed => {
                    self.emit(TransportEvent::Disconnect(DisconnectReason::ServerDisconnect));
                    return;
                }
                SocketEnd::Failed(reason) => {
                    tracing::debug!(%reason, "Socket dropped, reconnecting");
                    self.emit(TransportEvent::Disconnect(reason));
                }
                SocketEnd::Abandoned => return,
            }
        }
    }

    /// Shuttle frames until the socket ends.
    async fn pump(
        &self,
        transport: C::Transport,
        outgoing: &mut mpsc::UnboundedReceiver<String>,
    ) -> SocketEnd {
        let (mut reader, mut writer) = transport.split();
        loop {
            tokio::select! {
                frame = reader.recv() => match frame {
                    Ok(Some(text)) => match parse_server_frame(&text) {
                        Ok(msg) => self.emit(TransportEvent::Server(msg)),
                        Err(e) => tracing::debug!(error = %e, "Dropping server frame"),
                    },
                    Ok(None) => return SocketEnd::ServerClosed,
                    Err(TransportError::ConnectionClosed) => {
                        return SocketEnd::Failed(DisconnectReason::TransportClose);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Socket read failed");
                        return SocketEnd::Failed(DisconnectReason::TransportError);
                    }
                },
                cmd = outgoing.recv() => match cmd {
                    Some(text) => {
                        if let Err(e) = writer.send(&text).await {
                            tracing::debug!(error = %e, "Socket write failed");
                            return SocketEnd::Failed(DisconnectReason::TransportError);
                        }
                    }
                    None => return SocketEnd::Abandoned,
                },
            }
        }
    }

    /// Re-dial with backoff. `None` once `max_attempts` is spent.
    async fn reconnect(&self) -> Option<C::Transport> {
        let mut attempt: u32 = 0;
        loop {
            if self.max_attempts.is_some_and(|max| attempt >= max) {
                tracing::warn!(attempts = attempt, "Giving up automatic reconnection");
                return None;
            }
            attempt += 1;
            tokio::time::sleep(self.backoff.delay(attempt)).await;

            self.emit(TransportEvent::ReconnectAttempt(attempt));
            match self.connector.open(&self.url).await {
                Ok(transport) => return Some(transport),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Reconnection attempt failed");
                    self.emit(TransportEvent::ReconnectError);
                }
            }
        }
    }

    fn emit(&self, event: TransportEvent) {
        self.send(Signal::Event(event));
    }

    fn send(&self, signal: Signal) {
        // The handle may already be gone; nothing left to notify.
        let _ = self.events.send((self.generation, signal));
    }
}
