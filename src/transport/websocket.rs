//! WebSocket ingest client for the upstream L2-orderbook feed.
//!
//! An outer loop reconnects with exponential backoff (100ms, doubling,
//! capped at 30s) and resets the delay on every clean connection; the inner
//! loop answers pings and hands each decoded
//! [`Snapshot`](crate::wire::Snapshot) straight to the simulator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::simulator::Simulator;
use crate::wire::Snapshot;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(100);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct WebsocketMetrics {
    pub messages_received: AtomicU64,
    pub parse_errors: AtomicU64,
    pub reconnects: AtomicU64,
    pub connected: AtomicBool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebsocketMetricsSnapshot {
    pub messages_received: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    pub connected: bool,
}

impl WebsocketMetrics {
    pub fn snapshot(&self) -> WebsocketMetricsSnapshot {
        WebsocketMetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed),
        }
    }
}

/// Owns the upstream URL and forwards every ingested snapshot to a
/// [`Simulator`] handle.
pub struct WebsocketIngest {
    url: String,
    simulator: Simulator,
    metrics: Arc<WebsocketMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl WebsocketIngest {
    pub fn new(url: String, simulator: Simulator) -> Self {
        Self {
            url,
            simulator,
            metrics: Arc::new(WebsocketMetrics::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn metrics(&self) -> Arc<WebsocketMetrics> {
        self.metrics.clone()
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the reconnect loop until `shutdown` is set. Never returns `Err`;
    /// connection failures are retried with backoff.
    pub async fn run(self) {
        let mut delay = INITIAL_RECONNECT_DELAY;

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.connect_and_stream().await {
                Ok(()) => {
                    delay = INITIAL_RECONNECT_DELAY;
                }
                Err(err) => {
                    self.metrics.connected.store(false, Ordering::Release);
                    self.metrics.reconnects.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, delay_ms = delay.as_millis(), "websocket ingest disconnected, retrying");

                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                }
            }
        }
    }

    async fn connect_and_stream(&self) -> Result<()> {
        let (stream, _) = connect_async(&self.url)
            .await
            .context("failed to connect to orderbook feed")?;

        info!(url = %self.url, "connected to orderbook feed");
        self.metrics.connected.store(true, Ordering::Release);

        let (mut write, mut read) = stream.split();

        while let Some(message) = read.next().await {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let message = message.context("websocket stream error")?;

            match message {
                Message::Text(text) => match serde_json::from_str::<Snapshot>(&text) {
                    Ok(snapshot) => {
                        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        self.simulator.on_snapshot(&snapshot);
                    }
                    Err(err) => {
                        self.metrics.parse_errors.fetch_add(1, Ordering::Relaxed);
                        debug!(error = %err, "failed to parse snapshot");
                    }
                },
                Message::Ping(payload) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Message::Close(frame) => {
                    info!(?frame, "orderbook feed closed the connection");
                    break;
                }
                _ => {}
            }
        }

        self.metrics.connected.store(false, Ordering::Release);
        Ok(())
    }
}
