//! Per-peer session state machine over the duplex transport.
//!
//! All mutable session state — the peer session, the transport handle, the
//! state machine itself — is owned by a single actor task. Callers hold a
//! cloneable [`SessionHandle`] and talk to the actor over a command channel,
//! so connect, send, and the receive loop can never race on shared state.
//!
//! The receive loop and the transport writer run as separate tasks per
//! connection; both are aborted on disconnect. Handshakes run in their own
//! task under a deadline, reporting back as events, so a slow directory
//! never stalls command processing.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use meshtalk_crypto::{cipher, derive_session_key, IdentityKeyStore, SecretVault, SessionKey};
use meshtalk_protocol::{codec, Envelope};

use crate::config::ClientConfig;
use crate::directory::Directory;
use crate::error::{ClientError, TransportError};
use crate::registration::local_user_id;
use crate::sink::MessageSink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake phase within an active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// Connected, no peer session yet.
    NoSession,
    /// Directory lookup + key derivation in flight.
    Establishing,
    /// Session key derived — sends are accepted.
    Ready,
}

/// Observable session manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected(PeerPhase),
}

/// The established per-peer session. Held only in memory; re-derived after
/// every reconnect.
struct PeerSession {
    peer_id: String,
    key: SessionKey,
    #[allow(dead_code)]
    established_at: i64,
}

enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    SetPeer {
        peer_id: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    State {
        reply: oneshot::Sender<SessionState>,
    },
}

enum Event {
    /// Binary frame from the receive loop.
    Frame { generation: u64, data: Vec<u8> },
    /// The transport closed or errored; the receive loop has ended.
    Closed {
        generation: u64,
        reason: Option<String>,
    },
    /// A handshake task finished.
    HandshakeDone {
        peer_id: String,
        result: Result<SessionKey, ClientError>,
    },
}

/// Cloneable handle to the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Open the transport. Requires a registered identity.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::Connect { reply }).await?
    }

    /// Close the transport and discard the in-memory session.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Choose the peer to talk to and start the handshake. Resolves once
    /// the handshake completes (or fails — non-fatally; retry by calling
    /// again).
    pub async fn set_peer(&self, peer_id: impl Into<String>) -> Result<(), ClientError> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::SetPeer { peer_id, reply })
            .await?
    }

    /// Encrypt and send one text message to the current peer.
    ///
    /// If the session is not ready the handshake is (re)started and the
    /// message is dropped — there is no send queue; callers retry once the
    /// session is up.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let text = text.into();
        self.request(|reply| Command::Send { text, reply }).await?
    }

    /// Current state snapshot.
    pub async fn state(&self) -> SessionState {
        self.request(|reply| Command::State { reply })
            .await
            .unwrap_or(SessionState::Disconnected)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| ClientError::NotConnected)?;
        reply_rx.await.map_err(|_| ClientError::NotConnected)
    }
}

/// Spawns the owning actor task and hands out its handle.
pub struct SessionManager;

impl SessionManager {
    pub fn spawn(
        config: ClientConfig,
        vault: Arc<dyn SecretVault>,
        directory: Arc<dyn Directory>,
        sink: Arc<dyn MessageSink>,
    ) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);

        let actor = Actor {
            store: IdentityKeyStore::new(vault.clone(), &config.key_account),
            config,
            vault,
            directory,
            sink,
            state: SessionState::Disconnected,
            local_id: None,
            target_peer: None,
            session: None,
            conn: None,
            generation: 0,
            pending_handshake: None,
            event_tx,
        };
        tokio::spawn(actor.run(command_rx, event_rx));

        SessionHandle {
            commands: command_tx,
        }
    }
}

/// Per-connection transport plumbing.
struct Connection {
    writer_tx: mpsc::Sender<Message>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

struct Actor {
    config: ClientConfig,
    store: IdentityKeyStore,
    vault: Arc<dyn SecretVault>,
    directory: Arc<dyn Directory>,
    sink: Arc<dyn MessageSink>,
    state: SessionState,
    local_id: Option<String>,
    target_peer: Option<String>,
    session: Option<PeerSession>,
    conn: Option<Connection>,
    /// Connection counter — events from torn-down connections carry an old
    /// generation and are discarded.
    generation: u64,
    pending_handshake: Option<oneshot::Sender<Result<(), ClientError>>>,
    event_tx: mpsc::Sender<Event>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: mpsc::Receiver<Event>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        // All handles dropped — shut down.
                        self.teardown();
                        break;
                    }
                },
                // The actor holds an event_tx clone, so this arm never
                // yields None while the loop runs.
                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let _ = reply.send(self.do_connect().await);
            }
            Command::Disconnect { reply } => {
                self.teardown();
                self.state = SessionState::Disconnected;
                info!("disconnected");
                let _ = reply.send(());
            }
            Command::SetPeer { peer_id, reply } => {
                self.target_peer = Some(peer_id.clone());
                match self.state {
                    SessionState::Disconnected | SessionState::Connecting => {
                        // Stored; the handshake starts on connect.
                        let _ = reply.send(Ok(()));
                    }
                    SessionState::Connected(_) => {
                        let already_ready = self.state
                            == SessionState::Connected(PeerPhase::Ready)
                            && self
                                .session
                                .as_ref()
                                .is_some_and(|s| s.peer_id == peer_id);
                        if already_ready {
                            let _ = reply.send(Ok(()));
                        } else {
                            if let Some(old) = self.pending_handshake.take() {
                                let _ = old.send(Err(ClientError::SessionNotReady));
                            }
                            self.pending_handshake = Some(reply);
                            self.start_handshake(peer_id);
                        }
                    }
                }
            }
            Command::Send { text, reply } => {
                let _ = reply.send(self.do_send(text).await);
            }
            Command::State { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Frame { generation, data } => {
                if generation == self.generation && self.conn.is_some() {
                    self.on_frame(&data);
                }
            }
            Event::Closed { generation, reason } => {
                if generation != self.generation || self.conn.is_none() {
                    return; // stale connection
                }
                match reason {
                    Some(reason) => warn!("transport closed: {reason}"),
                    None => info!("transport closed by server"),
                }
                self.teardown();
                self.state = SessionState::Disconnected;
            }
            Event::HandshakeDone { peer_id, result } => {
                if self.target_peer.as_deref() != Some(peer_id.as_str()) {
                    return; // superseded by a newer set_peer
                }
                if self.state != SessionState::Connected(PeerPhase::Establishing) {
                    return; // disconnected meanwhile, or already resolved
                }
                match result {
                    Ok(key) => {
                        info!(peer = %peer_id, "session established");
                        self.session = Some(PeerSession {
                            peer_id,
                            key,
                            established_at: unix_now(),
                        });
                        self.state = SessionState::Connected(PeerPhase::Ready);
                        if let Some(reply) = self.pending_handshake.take() {
                            let _ = reply.send(Ok(()));
                        }
                    }
                    Err(e) => {
                        warn!(peer = %peer_id, "handshake failed: {e}");
                        self.state = SessionState::Connected(PeerPhase::NoSession);
                        if let Some(reply) = self.pending_handshake.take() {
                            let _ = reply.send(Err(e));
                        }
                    }
                }
            }
        }
    }

    async fn do_connect(&mut self) -> Result<(), ClientError> {
        // Tear down any stale connection first.
        if self.conn.is_some() {
            self.teardown();
        }

        // Restore-if-present: connecting never mints a new identity.
        if self.store.load()?.is_none() {
            return Err(ClientError::NoIdentity);
        }
        let local_id = local_user_id(self.vault.as_ref(), &self.config)?
            .ok_or(ClientError::NotRegistered)?;

        self.state = SessionState::Connecting;
        let url = format!("{}?userID={}", self.config.transport_url, local_id);
        info!(%url, "opening transport");

        let ws = match timeout(self.config.connect_timeout(), connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                self.state = SessionState::Disconnected;
                return Err(TransportError::ConnectFailed(e.to_string()).into());
            }
            Err(_) => {
                self.state = SessionState::Disconnected;
                return Err(TransportError::ConnectFailed("timed out".into()).into());
            }
        };

        self.generation += 1;
        let (write_half, read_half) = ws.split();
        let (writer_tx, writer_rx) = mpsc::channel(64);
        let writer_task = tokio::spawn(writer_task(write_half, writer_rx));
        let reader_task = tokio::spawn(reader_task(
            read_half,
            self.event_tx.clone(),
            self.generation,
        ));

        self.conn = Some(Connection {
            writer_tx,
            writer_task,
            reader_task,
        });
        self.local_id = Some(local_id);
        self.session = None;
        self.state = SessionState::Connected(PeerPhase::NoSession);
        info!("transport connected");

        if let Some(peer) = self.target_peer.clone() {
            self.start_handshake(peer);
        }
        Ok(())
    }

    async fn do_send(&mut self, text: String) -> Result<(), ClientError> {
        let SessionState::Connected(phase) = self.state else {
            return Err(ClientError::NotConnected);
        };

        match phase {
            PeerPhase::Ready => {}
            PeerPhase::Establishing => return Err(ClientError::SessionNotReady),
            PeerPhase::NoSession => {
                // A send without a session doubles as a handshake trigger;
                // the message itself is dropped.
                if let Some(peer) = self.target_peer.clone() {
                    self.start_handshake(peer);
                }
                return Err(ClientError::SessionNotReady);
            }
        }

        let session = self.session.as_ref().ok_or(ClientError::SessionNotReady)?;
        let local_id = self.local_id.clone().ok_or(ClientError::NotConnected)?;

        let ciphertext = cipher::encrypt(text.as_bytes(), &session.key)?;
        let timestamp = unix_now();
        let envelope = Envelope::text(local_id, session.peer_id.clone(), ciphertext, timestamp);
        let frame = codec::encode(&envelope)?;

        let conn = self.conn.as_ref().ok_or(ClientError::NotConnected)?;
        conn.writer_tx
            .send(Message::Binary(frame))
            .await
            .map_err(|_| TransportError::SendFailed("writer task ended".into()))?;

        debug!(peer = %envelope.recipient_id, "message sent");
        self.sink.insert(&text, true, timestamp);
        Ok(())
    }

    /// Process one inbound frame. Every failure here is per-message: log,
    /// drop, keep the connection.
    fn on_frame(&self, data: &[u8]) {
        let envelope = match codec::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("dropping undecodable frame: {e}");
                return;
            }
        };

        // Loop-back guard: the relay echoes our own traffic back.
        if self.local_id.as_deref() == Some(envelope.sender_id.as_str()) {
            trace!("discarding looped-back frame");
            return;
        }

        let session = match (&self.state, &self.session) {
            (SessionState::Connected(PeerPhase::Ready), Some(session)) => session,
            _ => {
                debug!(sender = %envelope.sender_id, "no session ready — dropping frame");
                return;
            }
        };

        match cipher::decrypt(&envelope.payload, &session.key) {
            Ok(plaintext) => match String::from_utf8(plaintext) {
                Ok(text) => {
                    debug!(sender = %envelope.sender_id, "message received");
                    self.sink.insert(&text, false, envelope.timestamp);
                }
                Err(_) => warn!(sender = %envelope.sender_id, "decrypted payload is not UTF-8 — dropping"),
            },
            Err(e) => {
                warn!(sender = %envelope.sender_id, "dropping message that failed decryption: {e}");
            }
        }
    }

    /// Spawn a handshake task for `peer_id` and enter `Establishing`.
    ///
    /// The result comes back as an event; a stale result (peer changed,
    /// connection gone) is discarded there.
    fn start_handshake(&mut self, peer_id: String) {
        let Some(identity) = self.store.identity().cloned() else {
            warn!("handshake requested without a loaded identity");
            if let Some(reply) = self.pending_handshake.take() {
                let _ = reply.send(Err(ClientError::NoIdentity));
            }
            return;
        };

        self.state = SessionState::Connected(PeerPhase::Establishing);
        debug!(peer = %peer_id, "handshake started");

        let directory = Arc::clone(&self.directory);
        let deadline = self.config.handshake_timeout();
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            let result = async {
                let peer_key = match timeout(deadline, directory.fetch_public_key(&peer_id)).await
                {
                    Ok(Ok(key)) => key,
                    Ok(Err(e)) => return Err(ClientError::from(e)),
                    Err(_) => return Err(ClientError::HandshakeTimeout),
                };
                Ok(derive_session_key(&identity, &peer_key)?)
            }
            .await;
            let _ = events.send(Event::HandshakeDone { peer_id, result }).await;
        });
    }

    /// Abort connection tasks and drop the peer session. The writer task is
    /// left to drain and send a close frame on its own; the reader is
    /// aborted outright.
    fn teardown(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.writer_tx);
            drop(conn.writer_task);
            conn.reader_task.abort();
        }
        self.session = None;
        if let Some(reply) = self.pending_handshake.take() {
            let _ = reply.send(Err(ClientError::NotConnected));
        }
    }
}

/// Transport writer: pumps encoded frames from the channel onto the socket,
/// then closes it.
async fn writer_task(
    mut write_half: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = write_half.send(message).await {
            error!("transport write error: {e}");
            break;
        }
    }
    let _ = write_half.send(Message::Close(None)).await;
    debug!("transport writer ended");
}

/// Receive loop: forwards binary frames to the actor until the transport
/// reports closed or errors.
async fn reader_task(mut read_half: SplitStream<WsStream>, events: mpsc::Sender<Event>, generation: u64) {
    while let Some(message) = read_half.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                if events.send(Event::Frame { generation, data }).await.is_err() {
                    return; // actor gone
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // text/ping/pong frames are not part of the protocol
            Err(e) => {
                let _ = events
                    .send(Event::Closed {
                        generation,
                        reason: Some(e.to_string()),
                    })
                    .await;
                return;
            }
        }
    }
    let _ = events.send(Event::Closed { generation, reason: None }).await;
    debug!("receive loop ended");
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
