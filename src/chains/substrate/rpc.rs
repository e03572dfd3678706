use crate::error::{Result, ScanError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// One decoded event as reported by the node-side block API.
#[derive(Debug, Clone)]
pub struct RawChainEvent {
    pub pallet: String,
    pub method: String,
    /// Positional event data, rendered as text.
    pub data: Vec<String>,
}

/// Remote procedure boundary of the block scanner. Mirrors the four
/// calls the traversal needs; mocked in tests.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Best block height at the time of the call.
    async fn chain_head_height(&self) -> Result<u64>;

    /// Block hash for a given height.
    async fn block_hash(&self, height: u64) -> Result<String>;

    /// All events recorded in the block.
    async fn events_at(&self, block_hash: &str) -> Result<Vec<RawChainEvent>>;

    /// Block timestamp in milliseconds (`timestamp.set` inherent).
    async fn timestamp_at(&self, block_hash: &str) -> Result<u64>;
}

/// HTTP client for a Substrate API sidecar endpoint
/// (`GET /blocks/head`, `GET /blocks/{id}`).
///
/// The traversal asks for hash, events and timestamp of the same block
/// in sequence, so the last fetched block body is kept and reused
/// instead of refetched per call.
pub struct SidecarClient {
    http: reqwest::Client,
    base_url: String,
    last_block: Mutex<Option<(String, Value)>>,
}

impl SidecarClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Configuration(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_block: Mutex::new(None),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("🌐 GET {}", url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ScanError::Transport(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(response.json::<Value>().await?)
    }

    /// Fetch (or reuse) the block body for a hash.
    async fn block_by_hash(&self, block_hash: &str) -> Result<Value> {
        if let Some((hash, body)) = self.last_block.lock().await.as_ref() {
            if hash == block_hash {
                return Ok(body.clone());
            }
        }
        let body = self.get_json(&format!("/blocks/{}", block_hash)).await?;
        *self.last_block.lock().await = Some((block_hash.to_string(), body.clone()));
        Ok(body)
    }
}

#[async_trait]
impl ChainRpc for SidecarClient {
    async fn chain_head_height(&self) -> Result<u64> {
        let head = self.get_json("/blocks/head").await?;
        parse_number(&head["number"])
            .ok_or_else(|| ScanError::Transport("head block has no number".to_string()))
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        let body = self.get_json(&format!("/blocks/{}", height)).await?;
        let hash = body["hash"]
            .as_str()
            .ok_or_else(|| ScanError::Transport(format!("block {} has no hash", height)))?
            .to_string();
        *self.last_block.lock().await = Some((hash.clone(), body));
        Ok(hash)
    }

    async fn events_at(&self, block_hash: &str) -> Result<Vec<RawChainEvent>> {
        let block = self.block_by_hash(block_hash).await?;
        Ok(collect_events(&block))
    }

    async fn timestamp_at(&self, block_hash: &str) -> Result<u64> {
        let block = self.block_by_hash(block_hash).await?;
        extract_timestamp_millis(&block).ok_or_else(|| {
            ScanError::Transport(format!("block {} has no timestamp inherent", block_hash))
        })
    }
}

fn parse_number(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn render_datum(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn event_from_value(value: &Value) -> Option<RawChainEvent> {
    let pallet = value["method"]["pallet"].as_str()?.to_string();
    let method = value["method"]["method"].as_str()?.to_string();
    let data = value["data"]
        .as_array()
        .map(|items| items.iter().map(render_datum).collect())
        .unwrap_or_default();
    Some(RawChainEvent {
        pallet,
        method,
        data,
    })
}

/// Flatten every event the block carries in on-chain emission order:
/// `onInitialize` hooks, then per-extrinsic events, then `onFinalize`.
/// Round rewards are paid from lifecycle hooks, so those sections carry
/// real reward events, not just bookkeeping.
fn collect_events(block: &Value) -> Vec<RawChainEvent> {
    let mut events = Vec::new();

    if let Some(items) = block["onInitialize"]["events"].as_array() {
        events.extend(items.iter().filter_map(event_from_value));
    }

    if let Some(extrinsics) = block["extrinsics"].as_array() {
        for extrinsic in extrinsics {
            if let Some(items) = extrinsic["events"].as_array() {
                events.extend(items.iter().filter_map(event_from_value));
            }
        }
    }

    if let Some(items) = block["onFinalize"]["events"].as_array() {
        events.extend(items.iter().filter_map(event_from_value));
    }

    events
}

/// Block time comes from the `timestamp.set` inherent's `now` argument.
fn extract_timestamp_millis(block: &Value) -> Option<u64> {
    let extrinsics = block["extrinsics"].as_array()?;
    extrinsics.iter().find_map(|extrinsic| {
        let pallet = extrinsic["method"]["pallet"].as_str()?;
        let method = extrinsic["method"]["method"].as_str()?;
        if pallet.eq_ignore_ascii_case("timestamp") && method.eq_ignore_ascii_case("set") {
            parse_number(&extrinsic["args"]["now"])
        } else {
            None
        }
    })
}
