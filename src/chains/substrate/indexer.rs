use crate::core::filter::EventFilter;
use crate::core::source::{FetchStep, RawRecord, SourceAdapter};
use crate::core::types::{EventOrdering, ScanCursor, SourceRef, Termination};
use crate::error::{Result, ScanError};
use crate::utils::retry::{retry_async, RetryPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Indexer responses can be slow on deep pages.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Paginated events query boundary, mocked in tests.
#[async_trait]
pub trait IndexerApi: Send + Sync {
    /// Fetch one page of raw event rows. An empty vector marks the
    /// natural end of data.
    async fn events_page(&self, page: u64) -> Result<Vec<Value>>;
}

/// Subscan-style events endpoint client: `POST <endpoint>` with an
/// `X-API-Key` header and a fixed (module, call) filter in the body.
pub struct SubscanClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    page_size: usize,
    from_timestamp: Option<u64>,
    to_timestamp: Option<u64>,
}

impl SubscanClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        page_size: usize,
        from_timestamp: Option<u64>,
        to_timestamp: Option<u64>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScanError::Configuration(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            page_size,
            from_timestamp,
            to_timestamp,
        })
    }

    fn request_body(&self, page: u64) -> Value {
        let mut body = json!({
            "row": self.page_size,
            "page": page,
            "module": EventFilter::REWARD_MODULE,
            "call": EventFilter::REWARD_CALL,
        });
        if let Some(from) = self.from_timestamp {
            body["from"] = json!(from);
        }
        if let Some(to) = self.to_timestamp {
            body["to"] = json!(to);
        }
        body
    }
}

#[async_trait]
impl IndexerApi for SubscanClient {
    async fn events_page(&self, page: u64) -> Result<Vec<Value>> {
        debug!(page, "🌐 POST {}", self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-API-Key", &self.api_key)
            .json(&self.request_body(page))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ScanError::Transport(format!(
                "{} returned HTTP {}",
                self.endpoint,
                response.status()
            )));
        }
        let body = response.json::<Value>().await?;
        // A null events list is how the API reports the last page.
        Ok(body["data"]["events"]
            .as_array()
            .cloned()
            .unwrap_or_default())
    }
}

/// One event row as returned by the indexer, before normalization.
#[derive(Debug, Deserialize)]
struct IndexerRow {
    block_num: u64,
    /// JSON-string-encoded positional parameters.
    params: String,
    event_index: String,
    #[serde(default)]
    event_idx: u32,
    #[serde(default)]
    extrinsic_hash: String,
    block_timestamp: u64,
    #[serde(default = "default_module")]
    module_id: String,
    #[serde(default = "default_call")]
    event_id: String,
}

fn default_module() -> String {
    EventFilter::REWARD_MODULE.to_string()
}

fn default_call() -> String {
    EventFilter::REWARD_CALL.to_string()
}

#[derive(Debug, Deserialize)]
struct RowParam {
    value: Value,
}

/// Paginated traversal over the indexer API. The cursor is a page
/// number; an empty page is the natural end, and an optional page
/// ceiling caps the scan ahead of it.
pub struct IndexerPager<A: IndexerApi> {
    api: A,
    retry: RetryPolicy,
    start_page: u64,
    max_pages: Option<u64>,
}

impl<A: IndexerApi> IndexerPager<A> {
    pub fn new(api: A, retry: RetryPolicy, start_page: u64, max_pages: Option<u64>) -> Self {
        Self {
            api,
            retry,
            start_page,
            max_pages,
        }
    }

    fn parse_row(row: &Value) -> Result<RawRecord> {
        let row: IndexerRow = serde_json::from_value(row.clone())
            .map_err(|e| ScanError::MalformedRecord(e.to_string()))?;

        let params: Vec<RowParam> = serde_json::from_str(&row.params)
            .map_err(|e| ScanError::MalformedRecord(format!("params: {}", e)))?;
        let params = params
            .into_iter()
            .map(|p| match p.value {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();

        // Rebuild the composite index from the block part of the
        // reported index and the in-block event position.
        let block_part = row
            .event_index
            .split('-')
            .next()
            .unwrap_or(&row.event_index);
        let event_index = format!("{}-{}", block_part, row.event_idx);

        Ok(RawRecord {
            module: row.module_id,
            call: row.event_id,
            params,
            timestamp: row.block_timestamp,
            source_ref: SourceRef::Indexer {
                event_index,
                extrinsic_hash: row.extrinsic_hash,
            },
        })
    }
}

#[async_trait]
impl<A: IndexerApi> SourceAdapter for IndexerPager<A> {
    async fn start_cursor(&self) -> Result<ScanCursor> {
        info!(
            start_page = self.start_page,
            "🔍 Starting indexer retrieval from page {}", self.start_page
        );
        if let Some(cap) = self.max_pages {
            info!("⚠️ Manual page limit set. Retrieval stops after page {}.", cap);
        }
        Ok(ScanCursor::new(self.start_page, self.max_pages))
    }

    async fn fetch_next(&self, cursor: &ScanCursor) -> Result<FetchStep> {
        let page = cursor.position;
        let rows = retry_async(|| self.api.events_page(page), &self.retry)
            .await
            .map_err(|e| ScanError::RetrievalExhausted {
                attempts: self.retry.max_attempts,
                last: e.to_string(),
            })?;

        let next = cursor.advanced();

        if rows.is_empty() {
            info!(page, "No more events found. Terminating.");
            return Ok(FetchStep {
                records: Vec::new(),
                next,
                done: Some(Termination::NaturalEnd),
                skipped: None,
                match_limit: None,
            });
        }

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::parse_row(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(page, error = %e, "Dropping malformed indexer row"),
            }
        }
        info!(page, rows = rows.len(), parsed = records.len(), "Processed page");

        // The cap fires once the next page number would exceed it,
        // regardless of remaining data.
        let done = cursor
            .end
            .filter(|cap| next.position >= *cap)
            .map(|_| Termination::PageCapReached);
        if done.is_some() {
            info!(page, "Page limit reached. Terminating.");
        }

        Ok(FetchStep {
            records,
            next,
            done,
            skipped: None,
            match_limit: None,
        })
    }

    fn ordering(&self) -> EventOrdering {
        EventOrdering::NewestFirst
    }
}
