use crate::data_sync::config::DataSyncConfig;
use crate::error::SyncError;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// Trade event as published on the `<symbol>@trade` stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Price as a decimal string
    #[serde(rename = "p")]
    pub price: String,
    /// Event time, ms since the epoch
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
}

impl TradeMessage {
    pub fn to_point(&self) -> Result<PricePoint, SyncError> {
        let price: f64 = self
            .price
            .parse()
            .map_err(|e| SyncError::ParseFailure(format!("invalid price {:?}: {}", self.price, e)))?;
        if !price.is_finite() {
            return Err(SyncError::ParseFailure(format!("invalid price {:?}", self.price)));
        }
        Ok(PricePoint { time_ms: self.event_time, price })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time_ms: u64,
    pub price: f64,
}

/// Append-only price history in arrival order. No dedup: two trades with the
/// same event time are two points.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    points: VecDeque<PricePoint>,
    max_points: Option<usize>,
}

impl PriceSeries {
    pub fn new(max_points: Option<usize>) -> Self {
        Self { points: VecDeque::new(), max_points }
    }

    /// Append a point, dropping the oldest ones past `max_points`
    pub fn push(&mut self, point: PricePoint) {
        self.points.push_back(point);
        if let Some(max) = self.max_points {
            while self.points.len() > max {
                self.points.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<PricePoint> {
        self.points.back().copied()
    }

    pub fn points(&self) -> Vec<PricePoint> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Why a connection ended without an error
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Shutdown,
    ClosedByServer,
}

/// Live trade feed over a WebSocket, feeding a [`PriceSeries`]
pub struct PriceStream {
    url: String,
    connection_timeout: Duration,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    series: Arc<RwLock<PriceSeries>>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PriceStream {
    pub fn new(
        url: String,
        connection_timeout: Duration,
        max_reconnect_attempts: u32,
        reconnect_delay: Duration,
        max_points: Option<usize>,
    ) -> Self {
        Self {
            url,
            connection_timeout,
            max_reconnect_attempts,
            reconnect_delay,
            series: Arc::new(RwLock::new(PriceSeries::new(max_points))),
            task: None,
            shutdown_tx: None,
        }
    }

    pub fn from_config(config: &DataSyncConfig) -> Self {
        Self::new(
            config.price_stream_url.clone(),
            config.ws_connection_timeout(),
            config.max_reconnect_attempts,
            config.reconnect_delay(),
            config.price_stream_max_points,
        )
    }

    /// Spawn the connection task. Returns `false` if it is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let url = self.url.clone();
        let connection_timeout = self.connection_timeout;
        let max_reconnect_attempts = self.max_reconnect_attempts;
        let reconnect_delay = self.reconnect_delay;
        let series = Arc::clone(&self.series);

        self.task = Some(tokio::spawn(async move {
            let mut reconnect_count = 0;

            loop {
                match Self::connect_and_stream(&url, connection_timeout, &series, &mut shutdown_rx).await {
                    Ok(StreamEnd::Shutdown) => {
                        info!("Price stream shut down");
                        break;
                    }
                    Ok(StreamEnd::ClosedByServer) => {
                        reconnect_count = 0;
                        info!("Price stream closed by server, reconnecting in {:?}", reconnect_delay);
                    }
                    Err(e) => {
                        error!("Price stream connection error: {}", e);
                        reconnect_count += 1;

                        if reconnect_count >= max_reconnect_attempts {
                            error!("Max reconnection attempts reached, giving up");
                            break;
                        }

                        warn!("Attempting reconnection #{} in {:?}", reconnect_count, reconnect_delay);
                    }
                }

                tokio::select! {
                    _ = sleep(reconnect_delay) => {}
                    _ = shutdown_rx.recv() => {
                        info!("Price stream shut down while waiting to reconnect");
                        break;
                    }
                }
            }
        }));

        true
    }

    /// Signal shutdown and wait for the connection task to finish
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Price stream task error during shutdown: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn points(&self) -> Vec<PricePoint> {
        self.series.read().await.points()
    }

    pub async fn latest(&self) -> Option<PricePoint> {
        self.series.read().await.latest()
    }

    pub async fn len(&self) -> usize {
        self.series.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.series.read().await.is_empty()
    }

    /// Shared handle on the series, for readers outside the stream
    pub fn series(&self) -> Arc<RwLock<PriceSeries>> {
        Arc::clone(&self.series)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect_and_stream(
        url: &str,
        connection_timeout: Duration,
        series: &RwLock<PriceSeries>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<StreamEnd, SyncError> {
        let url = Url::parse(url).map_err(|e| SyncError::NetworkFailure(format!("invalid stream url: {e}")))?;
        info!("Connecting to price stream: {}", url);

        let (ws_stream, _) = timeout(connection_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| SyncError::NetworkFailure("WebSocket connection timeout".to_string()))?
            .map_err(|e| SyncError::NetworkFailure(format!("WebSocket connection failed: {e}")))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        loop {
            tokio::select! {
                ws_msg = ws_receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = Self::handle_message(text.as_str(), series).await {
                                warn!("Failed to handle price message: {}", e);
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Ok(StreamEnd::ClosedByServer);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                                return Err(SyncError::NetworkFailure(format!("failed to send pong: {e}")));
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(SyncError::NetworkFailure(format!("WebSocket error: {e}")));
                        }
                        None => {
                            return Ok(StreamEnd::ClosedByServer);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    return Ok(StreamEnd::Shutdown);
                }
            }
        }
    }

    /// Decode one trade message and append it
    async fn handle_message(text: &str, series: &RwLock<PriceSeries>) -> Result<PricePoint, SyncError> {
        let trade: TradeMessage = serde_json::from_str(text)?;
        let point = trade.to_point()?;
        debug!("Trade at {}: {}", point.time_ms, point.price);
        series.write().await.push(point);
        Ok(point)
    }
}

impl Drop for PriceStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
