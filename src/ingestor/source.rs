//! Wire protocol for the generic JSON-over-WebSocket `StreamSource` (§6).
//!
//! `StreamTransport`/`StreamConnection` are the testable seam: the real
//! implementation is `TungsteniteTransport` ([`super::wss`]); tests drive
//! an in-memory fake that yields canned JSON frames.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::DetectorError;

#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, DetectorError>;
}

#[async_trait]
pub trait StreamConnection: Send {
    async fn send_json(&mut self, msg: &Value) -> Result<(), DetectorError>;

    /// `Ok(None)` means the connection closed cleanly; transient recv
    /// errors are folded into `Err` and trigger a reconnect.
    async fn recv(&mut self) -> Result<Option<String>, DetectorError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Create {
        mint: String,
        name: Option<String>,
        symbol: Option<String>,
        creator: Option<String>,
    },
    Trade {
        mint: String,
        trader: String,
    },
    Migration {
        mint: String,
        trader: Option<String>,
    },
}

/// Parse a server→client frame per §6's wire format. Returns `None` for
/// anything unrecognised or malformed — the caller counts these as dropped
/// rather than propagating a parse error up the connection loop.
pub fn parse_event(raw: &str) -> Option<StreamEvent> {
    let v: Value = serde_json::from_str(raw).ok()?;
    let tx_type = v.get("txType")?.as_str()?;
    let mint = v.get("mint").and_then(Value::as_str).map(String::from);
    let trader = v
        .get("traderPublicKey")
        .or_else(|| v.get("userPublicKey"))
        .and_then(Value::as_str)
        .map(String::from);

    match tx_type {
        "create" => Some(StreamEvent::Create {
            mint: mint?,
            name: v.get("name").and_then(Value::as_str).map(String::from),
            symbol: v.get("symbol").and_then(Value::as_str).map(String::from),
            creator: trader,
        }),
        "buy" | "sell" => Some(StreamEvent::Trade {
            mint: mint?,
            trader: trader?,
        }),
        "migration" => Some(StreamEvent::Migration { mint: mint?, trader }),
        _ => None,
    }
}

pub fn subscribe_new_token_msg() -> Value {
    serde_json::json!({"method": "subscribeNewToken"})
}

pub fn subscribe_migration_msg() -> Value {
    serde_json::json!({"method": "subscribeMigration"})
}

pub fn subscribe_account_trade_msg(keys: &[String]) -> Value {
    serde_json::json!({"method": "subscribeAccountTrade", "keys": keys})
}

pub fn subscribe_token_trade_msg(keys: &[String]) -> Value {
    serde_json::json!({"method": "subscribeTokenTrade", "keys": keys})
}
