//! Real `StreamTransport`: a generic JSON-over-WebSocket client.
//!
//! Grounded on the teacher's `sniffer/wss_source.rs` (heartbeat-driven
//! reconnect loop, backoff-doubling) generalised from Solana's
//! logs-subscribe pubsub client to a plain JSON WS feed per
//! `original_source/early_detector/pumpportal.py`'s connect options
//! (`ping_interval=30`, `ping_timeout=10`, `max_size=1MB`).

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::errors::{DetectorError, ErrorContext};

use super::source::{StreamConnection, StreamTransport};

pub struct TungsteniteTransport;

#[async_trait]
impl StreamTransport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, DetectorError> {
        let (ws_stream, _resp) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| anyhow::Error::from(e).ingestion_context("connecting to stream source"))?;
        Ok(Box::new(WsConnection { inner: ws_stream }))
    }
}

struct WsConnection {
    inner: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn send_json(&mut self, msg: &Value) -> Result<(), DetectorError> {
        let text = serde_json::to_string(msg)
            .map_err(|e| anyhow::Error::from(e).ingestion_context("encoding subscribe message"))?;
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| anyhow::Error::from(e).ingestion_context("sending subscribe message"))?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, DetectorError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(anyhow::Error::from(e).ingestion_context("stream recv failed"))
                }
            }
        }
    }
}
