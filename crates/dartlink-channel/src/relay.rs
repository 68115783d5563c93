//! WebSocket relay implementation using `tokio-tungstenite`.
//!
//! The relay is a dumb fan-out hub: it keeps no game state and never
//! inspects the payload. Clients speak a small JSON frame protocol to
//! identify themselves, manage subscriptions, publish, and query
//! occupancy; the relay forwards published payloads to every
//! subscriber of the channel, the publisher included.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dartlink_protocol::{ChannelId, Codec, GameMessage, JsonCodec, PlayerIdentity};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::{ChannelError, ChannelEvent, ChannelService, PresenceAction, Subscription};

/// Counter for generating unique connection IDs on the relay.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

type ServerWs = tokio_tungstenite::WebSocketStream<TcpStream>;
type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

fn broken_pipe(e: tokio_tungstenite::tungstenite::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, e)
}

// ---------------------------------------------------------------------------
// Frame protocol
// ---------------------------------------------------------------------------

/// Frames sent from a client to the relay.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientFrame {
    /// Must be the first frame on a connection.
    Identify { identity: PlayerIdentity },
    Subscribe { channel: ChannelId },
    Unsubscribe { channel: ChannelId },
    Publish {
        channel: ChannelId,
        payload: GameMessage,
    },
    HereNow { channel: ChannelId },
}

/// Frames sent from the relay to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ServerFrame {
    Message {
        channel: ChannelId,
        payload: GameMessage,
    },
    Presence {
        channel: ChannelId,
        action: PresenceAction,
        identity: PlayerIdentity,
    },
    /// Answer to a HereNow, in request order.
    Occupancy { channel: ChannelId, count: usize },
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

struct Peer {
    conn: u64,
    identity: PlayerIdentity,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

#[derive(Default)]
struct RelayState {
    channels: HashMap<ChannelId, Vec<Peer>>,
}

impl RelayState {
    fn fan_out(&mut self, channel: &ChannelId, frame: ServerFrame) {
        if let Some(peers) = self.channels.get_mut(channel) {
            peers.retain(|peer| peer.tx.send(frame.clone()).is_ok());
        }
    }
}

/// The relay server: accepts WebSocket connections and fans out
/// published messages per channel.
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<Mutex<RelayState>>,
}

impl RelayServer {
    /// Binds the relay to the given address.
    pub async fn bind(addr: &str) -> Result<Self, ChannelError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(ChannelError::ConnectFailed)?;
        tracing::info!(addr, "relay listening");
        Ok(Self {
            listener,
            state: Arc::new(Mutex::new(RelayState::default())),
        })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.listener.local_addr().map_err(ChannelError::ConnectFailed)
    }

    /// Accepts connections forever. Each connection runs in its own task.
    pub async fn run(self) -> Result<(), ChannelError> {
        loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(ChannelError::ConnectFailed)?;
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => serve_connection(state, ws).await,
                    Err(e) => {
                        tracing::warn!(%addr, error = %e, "WebSocket handshake failed");
                    }
                }
            });
        }
    }
}

async fn serve_connection(state: Arc<Mutex<RelayState>>, ws: ServerWs) {
    let conn = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    // Writer task: drains outbound frames onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let bytes = match JsonCodec.encode(&frame) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unencodable frame");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut identity: Option<PlayerIdentity> = None;
    while let Some(msg) = stream.next().await {
        let bytes = match msg {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/frame
            Err(e) => {
                tracing::debug!(conn, error = %e, "connection error");
                break;
            }
        };
        let frame: ClientFrame = match JsonCodec.decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(conn, error = %e, "ignoring malformed frame");
                continue;
            }
        };
        handle_frame(&state, conn, &mut identity, &tx, frame);
    }

    if let Some(identity) = identity {
        drop_connection(&state, conn, &identity);
    }
    writer.abort();
    tracing::debug!(conn, "connection closed");
}

fn handle_frame(
    state: &Arc<Mutex<RelayState>>,
    conn: u64,
    identity: &mut Option<PlayerIdentity>,
    tx: &mpsc::UnboundedSender<ServerFrame>,
    frame: ClientFrame,
) {
    if let ClientFrame::Identify { identity: who } = frame {
        tracing::debug!(conn, identity = %who, "identified");
        *identity = Some(who);
        return;
    }
    let Some(who) = identity.as_ref() else {
        tracing::warn!(conn, "frame before identify, ignoring");
        return;
    };
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    match frame {
        ClientFrame::Identify { .. } => unreachable!("handled above"),
        ClientFrame::Subscribe { channel } => {
            let peers = state.channels.entry(channel.clone()).or_default();
            peers.retain(|peer| peer.conn != conn);
            peers.push(Peer {
                conn,
                identity: who.clone(),
                tx: tx.clone(),
            });
            let join = ServerFrame::Presence {
                channel: channel.clone(),
                action: PresenceAction::Join,
                identity: who.clone(),
            };
            if let Some(peers) = state.channels.get_mut(&channel) {
                peers.retain(|peer| {
                    peer.conn == conn || peer.tx.send(join.clone()).is_ok()
                });
            }
            tracing::debug!(conn, %channel, "subscribed");
        }
        ClientFrame::Unsubscribe { channel } => {
            let removed = state
                .channels
                .get_mut(&channel)
                .map(|peers| {
                    let before = peers.len();
                    peers.retain(|peer| peer.conn != conn);
                    peers.len() != before
                })
                .unwrap_or(false);
            if removed {
                state.fan_out(
                    &channel,
                    ServerFrame::Presence {
                        channel: channel.clone(),
                        action: PresenceAction::Leave,
                        identity: who.clone(),
                    },
                );
                tracing::debug!(conn, %channel, "unsubscribed");
            }
        }
        ClientFrame::Publish { channel, payload } => {
            state.fan_out(
                &channel,
                ServerFrame::Message {
                    channel: channel.clone(),
                    payload,
                },
            );
        }
        ClientFrame::HereNow { channel } => {
            let count = state.channels.get(&channel).map(Vec::len).unwrap_or(0);
            let _ = tx.send(ServerFrame::Occupancy { channel, count });
        }
    }
}

/// Removes a dead connection from every channel, announcing the leave.
fn drop_connection(state: &Arc<Mutex<RelayState>>, conn: u64, identity: &PlayerIdentity) {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    let member_of: Vec<ChannelId> = state
        .channels
        .iter()
        .filter(|(_, peers)| peers.iter().any(|peer| peer.conn == conn))
        .map(|(channel, _)| channel.clone())
        .collect();
    for channel in member_of {
        if let Some(peers) = state.channels.get_mut(&channel) {
            peers.retain(|peer| peer.conn != conn);
        }
        state.fan_out(
            &channel,
            ServerFrame::Presence {
                channel: channel.clone(),
                action: PresenceAction::Leave,
                identity: identity.clone(),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ClientShared {
    /// Per-channel event senders for the live subscriptions.
    routes: Mutex<HashMap<ChannelId, mpsc::UnboundedSender<ChannelEvent>>>,
    /// Outstanding occupancy queries, answered in FIFO order.
    occupancy: Mutex<VecDeque<oneshot::Sender<usize>>>,
}

/// A client connection to a [`RelayServer`].
///
/// Dropping the client tears down the connection; the relay announces
/// the leave to any channels it was still subscribed to.
pub struct RelayClient {
    identity: PlayerIdentity,
    writer: Arc<tokio::sync::Mutex<SplitSink<ClientWs, Message>>>,
    shared: Arc<ClientShared>,
    reader: tokio::task::JoinHandle<()>,
}

impl RelayClient {
    /// Connects to the relay at `addr` (host:port) and identifies.
    pub async fn connect(addr: &str, identity: PlayerIdentity) -> Result<Self, ChannelError> {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url).await.map_err(|e| {
            ChannelError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;
        let (sink, stream) = ws.split();
        let shared = Arc::new(ClientShared::default());
        let reader = tokio::spawn(read_loop(stream, Arc::clone(&shared)));

        let client = Self {
            identity: identity.clone(),
            writer: Arc::new(tokio::sync::Mutex::new(sink)),
            shared,
            reader,
        };
        client.send_frame(&ClientFrame::Identify { identity }).await?;
        Ok(client)
    }

    async fn send_frame(&self, frame: &ClientFrame) -> Result<(), ChannelError> {
        let bytes = JsonCodec.encode(frame)?;
        self.writer
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| ChannelError::SendFailed(broken_pipe(e)))
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        // Stop the reader so both socket halves are released and the
        // relay observes the disconnect.
        self.reader.abort();
    }
}

/// Routes inbound relay frames to the matching subscription streams.
async fn read_loop(mut stream: SplitStream<ClientWs>, shared: Arc<ClientShared>) {
    while let Some(msg) = stream.next().await {
        let bytes = match msg {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "relay connection error");
                break;
            }
        };
        let frame: ServerFrame = match JsonCodec.decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed relay frame");
                continue;
            }
        };
        match frame {
            ServerFrame::Message { channel, payload } => {
                deliver(
                    &shared,
                    &channel,
                    ChannelEvent::Message {
                        channel: channel.clone(),
                        message: payload,
                    },
                );
            }
            ServerFrame::Presence {
                channel,
                action,
                identity,
            } => {
                deliver(
                    &shared,
                    &channel,
                    ChannelEvent::Presence {
                        channel: channel.clone(),
                        action,
                        identity,
                    },
                );
            }
            ServerFrame::Occupancy { count, .. } => {
                let pending = shared
                    .occupancy
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .pop_front();
                match pending {
                    Some(tx) => {
                        let _ = tx.send(count);
                    }
                    None => tracing::warn!("unsolicited occupancy frame"),
                }
            }
        }
    }
    // Connection gone: close every subscription stream and fail the
    // outstanding occupancy queries.
    shared
        .routes
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
    shared
        .occupancy
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
}

fn deliver(shared: &ClientShared, channel: &ChannelId, event: ChannelEvent) {
    let routes = shared.routes.lock().unwrap_or_else(|e| e.into_inner());
    match routes.get(channel) {
        Some(tx) => {
            let _ = tx.send(event);
        }
        None => tracing::debug!(%channel, "event for unsubscribed channel"),
    }
}

impl ChannelService for RelayClient {
    fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    async fn subscribe(&self, channel: &ChannelId) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.clone(), tx);
        self.send_frame(&ClientFrame::Subscribe {
            channel: channel.clone(),
        })
        .await?;
        Ok(Subscription::new(channel.clone(), rx))
    }

    async fn unsubscribe(&self, channel: &ChannelId) -> Result<(), ChannelError> {
        let removed = self
            .shared
            .routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(channel)
            .is_some();
        if !removed {
            return Err(ChannelError::NotSubscribed(channel.clone()));
        }
        self.send_frame(&ClientFrame::Unsubscribe {
            channel: channel.clone(),
        })
        .await
    }

    async fn publish(
        &self,
        channel: &ChannelId,
        message: &GameMessage,
    ) -> Result<(), ChannelError> {
        self.send_frame(&ClientFrame::Publish {
            channel: channel.clone(),
            payload: message.clone(),
        })
        .await
    }

    async fn here_now(&self, channel: &ChannelId) -> Result<usize, ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .occupancy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(tx);
        self.send_frame(&ClientFrame::HereNow {
            channel: channel.clone(),
        })
        .await?;
        rx.await
            .map_err(|_| ChannelError::ConnectionClosed("relay connection lost".into()))
    }
}
