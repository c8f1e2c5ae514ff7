//! Ingestion loop and WebSocket fan-out server
//!
//! One task owns the [`FrameDecoder`] and the [`ReadingBroadcaster`]. Raw
//! lines, new subscriptions and departures all arrive at that task and are
//! handled one at a time, so readings reach subscribers strictly in the order
//! they were decoded. Each WebSocket connection gets a small task that moves
//! serialized readings from its channel onto the socket.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::broadcaster::{ReadingBroadcaster, SubscriptionId};
use crate::sensor::{FrameDecoder, FrameStats};

/// Readings buffered per client before new ones are dropped for it
pub const CLIENT_CHANNEL_BUFFER: usize = 4;
const CONTROL_CHANNEL_BUFFER: usize = 32;

/// Ingestion-side failures. All of them end the bridge process.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to open sensor source {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read sensor source: {0}")]
    SourceRead(std::io::Error),
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Line-oriented sensor link
pub type LineSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Open the sensor link: a device node, FIFO or file, or `-` for stdin
pub async fn open_source(path: &Path) -> Result<LineSource, BridgeError> {
    if path == Path::new("-") {
        log::info!("Reading sensor frames from stdin");
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| BridgeError::SourceOpen {
            path: path.to_path_buf(),
            source,
        })?;
    log::info!("Sensor source opened on {}", path.display());
    Ok(Box::new(BufReader::new(file)))
}

/// Requests from connection tasks to the ingestion loop
enum Control {
    Subscribe {
        sink: mpsc::Sender<String>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe(SubscriptionId),
}

/// WebSocket server publishing decoded readings to every connected client
pub struct BridgeServer {
    listener: TcpListener,
}

impl BridgeServer {
    pub async fn bind(addr: &str) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Run until the source reaches end of input or `shutdown` fires.
    ///
    /// On exit every subscriber is released and every connection closed.
    pub async fn run<R>(self, source: R, shutdown: CancellationToken) -> Result<FrameStats, BridgeError>
    where
        R: AsyncBufRead + Unpin,
    {
        if let Some(addr) = self.local_addr() {
            log::info!("Bridge running on ws://{}", addr);
        }

        let (control_tx, mut control_rx) = mpsc::channel::<Control>(CONTROL_CHANNEL_BUFFER);
        let clients_token = shutdown.child_token();
        let clients = TaskTracker::new();
        let mut hub = ReadingBroadcaster::new();
        let mut decoder = FrameDecoder::new();
        // Raw segments so line noise that is not UTF-8 reaches the decoder
        // and is rejected there instead of failing the read
        let mut lines = source.split(b'\n');

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("Closing bridge...");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        clients.spawn(serve_client(
                            stream,
                            peer,
                            control_tx.clone(),
                            clients_token.clone(),
                        ));
                    }
                    Err(e) => log::warn!("Failed to accept connection: {}", e),
                },
                Some(control) = control_rx.recv() => match control {
                    Control::Subscribe { sink, reply } => {
                        let id = hub.subscribe(sink);
                        let _ = reply.send(id);
                        log::info!("New WebSocket client ({} total)", hub.len());
                    }
                    Control::Unsubscribe(id) => {
                        if hub.unsubscribe(id) {
                            log::info!("Client disconnected ({} remaining)", hub.len());
                        }
                    }
                },
                line = lines.next_segment() => match line {
                    Ok(Some(raw)) => {
                        if let Some(reading) = decoder.decode(&String::from_utf8_lossy(&raw)) {
                            hub.publish(&reading);
                        }
                    }
                    Ok(None) => {
                        log::info!("Sensor source closed");
                        break Ok(());
                    }
                    Err(e) => break Err(BridgeError::SourceRead(e)),
                },
            }
        };

        hub.clear();
        // Pending subscribe requests are dropped with the receiver
        drop(control_rx);
        clients_token.cancel();
        clients.close();
        clients.wait().await;

        let stats = decoder.stats();
        log::info!(
            "Bridge stopped: {} readings, {} rejected, {} debug lines",
            stats.readings,
            stats.rejected(),
            stats.debug_lines
        );
        result.map(|()| stats)
    }
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    control: mpsc::Sender<Control>,
    shutdown: CancellationToken,
) {
    let handshake = tokio::select! {
        _ = shutdown.cancelled() => return,
        handshake = accept_async(stream) => handshake,
    };
    let ws = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_CHANNEL_BUFFER);
    let (reply_tx, reply_rx) = oneshot::channel();
    if control
        .send(Control::Subscribe {
            sink: tx,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        return;
    }
    let Ok(id) = reply_rx.await else {
        return;
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            outbound = rx.recv() => match outbound {
                Some(json) => {
                    if let Err(e) = write.send(Message::Text(json)).await {
                        log::debug!("Send to {} failed: {}", peer, e);
                        break;
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    log::warn!("WebSocket error from {}: {}", peer, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = control.send(Control::Unsubscribe(id)).await;
}
