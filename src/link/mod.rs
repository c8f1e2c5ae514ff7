//! Game-side subscription to the bridge
//!
//! Keeps a single consumer fed with [`SensorReading`]s over a WebSocket that
//! may drop at any time. The connection cycles
//! `Connecting -> Open -> Closed -> Connecting` forever, waiting a fixed delay
//! after every loss, until the owning [`ConnectionHandle`] is shut down or
//! dropped.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::consts::RECONNECT_DELAY_MS;
use crate::now_ms;
use crate::sensor::SensorReading;

/// Where the subscription currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Lost or failed; a reconnect is pending
    Closed,
    /// Torn down, no further reconnects
    Stopped,
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why an open connection stopped pumping
enum PumpExit {
    Lost,
    Cancelled,
    ConsumerGone,
}

/// Reconnecting reading subscription
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    url: String,
    reconnect_delay: Duration,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }

    /// Override the delay between a loss and the next attempt
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection loop on the current runtime.
    ///
    /// Readings are pushed into `readings` without waiting: if the consumer
    /// is behind, the newest reading is dropped rather than queued.
    pub fn spawn(self, readings: mpsc::Sender<SensorReading>) -> ConnectionHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let task = tokio::spawn(self.run(readings, state_tx, cancel.clone()));
        ConnectionHandle {
            cancel,
            state: state_rx,
            task,
        }
    }

    async fn run(
        self,
        readings: mpsc::Sender<SensorReading>,
        state: watch::Sender<ConnectionState>,
        cancel: CancellationToken,
    ) {
        loop {
            state.send_replace(ConnectionState::Connecting);

            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                attempt = connect_async(self.url.as_str()) => attempt,
            };

            match attempt {
                Ok((socket, _)) => {
                    log::info!("Connected to bridge at {}", self.url);
                    state.send_replace(ConnectionState::Open);
                    match pump(socket, &readings, &cancel).await {
                        PumpExit::Lost => {}
                        PumpExit::Cancelled => break,
                        PumpExit::ConsumerGone => {
                            log::info!("Reading consumer gone, closing bridge connection");
                            break;
                        }
                    }
                }
                Err(e) => log::warn!("Bridge connection to {} failed: {}", self.url, e),
            }

            state.send_replace(ConnectionState::Closed);
            log::info!("Reconnecting in {} ms...", self.reconnect_delay.as_millis());

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = readings.closed() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        state.send_replace(ConnectionState::Stopped);
        log::debug!("Bridge connection to {} stopped", self.url);
    }
}

/// Forward messages from an open socket until it closes or we are told to stop
async fn pump(
    mut socket: Socket,
    readings: &mpsc::Sender<SensorReading>,
    cancel: &CancellationToken,
) -> PumpExit {
    loop {
        let inbound = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = socket.close(None).await;
                return PumpExit::Cancelled;
            }
            _ = readings.closed() => {
                let _ = socket.close(None).await;
                return PumpExit::ConsumerGone;
            }
            inbound = socket.next() => inbound,
        };

        match inbound {
            Some(Ok(Message::Text(text))) => match SensorReading::from_wire(&text, now_ms()) {
                Ok(reading) => match readings.try_send(reading) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::debug!("Consumer busy, reading dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        let _ = socket.close(None).await;
                        return PumpExit::ConsumerGone;
                    }
                },
                Err(e) => log::warn!("Discarding bridge message ({}): {}", e, text),
            },
            Some(Ok(Message::Close(_))) | None => {
                log::info!("Bridge closed connection");
                return PumpExit::Lost;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                log::warn!("Bridge connection error: {}", e);
                return PumpExit::Lost;
            }
        }
    }
}

/// Owner of a running [`ConnectionManager`]. Dropping it tears the
/// connection down.
pub struct ConnectionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch channel following every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the active connection, cancel any pending reconnect and wait for
    /// the loop to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            log::warn!("Connection task ended abnormally: {}", e);
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn reading_json(flex0: f64, ts: u64) -> String {
        let mut values = [0.0; 13];
        values[0] = flex0;
        SensorReading::from_values(&values, ts)
            .unwrap()
            .to_json()
            .unwrap()
    }

    async fn wait_for(state: &mut watch::Receiver<ConnectionState>, wanted: ConnectionState) {
        tokio::time::timeout(TIMEOUT, state.wait_for(|s| *s == wanted))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_forwards_only_valid_messages_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(reading_json(1.0, 10))).await.unwrap();
            ws.send(Message::Text("{not json".into())).await.unwrap();
            ws.send(Message::Text(r#"{"flex":[1,2,3,4],"accel":[0,0,0]}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(reading_json(2.0, 20))).await.unwrap();
            // Hold the socket open until the client goes away
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (tx, mut rx) = mpsc::channel(8);
        let handle = ConnectionManager::new(format!("ws://{}", addr)).spawn(tx);

        let first = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.flex[0], 1.0);
        assert_eq!(first.captured_at, 10);
        assert_eq!(second.flex[0], 2.0);
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.shutdown().await;
        tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // First connection is dropped straight away
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
            drop(ws);

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(reading_json(7.0, 70))).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (tx, mut rx) = mpsc::channel(8);
        let handle = ConnectionManager::new(format!("ws://{}", addr))
            .with_reconnect_delay(Duration::from_millis(50))
            .spawn(tx);
        let mut states = handle.subscribe_state();

        let reading = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(reading.flex[0], 7.0);
        wait_for(&mut states, ConnectionState::Open).await;

        handle.shutdown().await;
        tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_default_delay_waits_before_reconnecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let lost_at = tokio::time::Instant::now();
            ws.close(None).await.unwrap();
            drop(ws);

            let (stream, _) = listener.accept().await.unwrap();
            let gap = lost_at.elapsed();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(reading_json(3.0, 30))).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
            gap
        });

        let manager = ConnectionManager::new(format!("ws://{}", addr));
        assert_eq!(manager.reconnect_delay, Duration::from_millis(RECONNECT_DELAY_MS));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = manager.spawn(tx);
        let mut states = handle.subscribe_state();
        wait_for(&mut states, ConnectionState::Closed).await;

        let reading = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(reading.flex[0], 3.0);

        handle.shutdown().await;
        let gap = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
        assert!(gap >= Duration::from_millis(RECONNECT_DELAY_MS), "reconnected after {:?}", gap);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_reconnect() {
        // Reserve a port and free it so connecting is refused
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, _rx) = mpsc::channel(8);
        let handle = ConnectionManager::new(format!("ws://{}", addr))
            .with_reconnect_delay(Duration::from_secs(3600))
            .spawn(tx);
        let mut states = handle.subscribe_state();
        wait_for(&mut states, ConnectionState::Closed).await;

        tokio::time::timeout(TIMEOUT, handle.shutdown()).await.unwrap();
        assert_eq!(*states.borrow(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionManager::new(format!("ws://{}", addr))
            .with_reconnect_delay(Duration::from_secs(3600))
            .spawn(tx);
        let mut states = handle.subscribe_state();
        wait_for(&mut states, ConnectionState::Closed).await;

        drop(rx);
        wait_for(&mut states, ConnectionState::Stopped).await;
    }
}
