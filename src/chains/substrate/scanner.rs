use crate::chains::substrate::rpc::ChainRpc;
use crate::core::source::{FetchStep, RawRecord, SourceAdapter};
use crate::core::types::{EventOrdering, ScanCursor, SourceRef, Termination};
use crate::error::{Result, ScanError};
use crate::utils::retry::{retry_async, RetryPolicy};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Sequential block traversal over the node RPC boundary.
///
/// Per position: resolve the block hash, fetch the block's events and
/// timestamp, and hand the raw records back. A block that stays
/// unreadable after retries is reported as skipped; one bad block must
/// not abort a multi-hour scan. The cursor advances exactly once per
/// call either way, so a failure never re-processes the same height.
pub struct ChainScanner<R: ChainRpc> {
    rpc: R,
    retry: RetryPolicy,
    from_block: u64,
    to_block: Option<u64>,
}

impl<R: ChainRpc> ChainScanner<R> {
    pub fn new(rpc: R, retry: RetryPolicy, from_block: u64, to_block: Option<u64>) -> Self {
        Self {
            rpc,
            retry,
            from_block,
            to_block,
        }
    }

    /// Resolve hash, events and timestamp for one height, each call
    /// under the retry policy.
    async fn fetch_block_records(&self, height: u64) -> Result<Vec<RawRecord>> {
        let block_hash = retry_async(|| self.rpc.block_hash(height), &self.retry).await?;
        debug!(height, hash = %block_hash, "Resolved block hash");

        let events = retry_async(|| self.rpc.events_at(&block_hash), &self.retry).await?;
        debug!(height, count = events.len(), "Fetched block events");

        let millis = retry_async(|| self.rpc.timestamp_at(&block_hash), &self.retry).await?;
        // Node reports milliseconds; events are normalized to unix seconds.
        let timestamp = millis / 1000;

        Ok(events
            .into_iter()
            .enumerate()
            .map(|(idx, event)| RawRecord {
                module: event.pallet,
                call: event.method,
                params: event.data,
                timestamp,
                source_ref: SourceRef::Block {
                    height,
                    event_idx: idx as u32,
                },
            })
            .collect())
    }
}

#[async_trait]
impl<R: ChainRpc> SourceAdapter for ChainScanner<R> {
    async fn start_cursor(&self) -> Result<ScanCursor> {
        // Upper bound is sampled once; a moving head would make the
        // range ill-defined.
        let end = match self.to_block {
            Some(to) => to,
            None => retry_async(|| self.rpc.chain_head_height(), &self.retry)
                .await
                .map_err(|e| ScanError::RetrievalExhausted {
                    attempts: self.retry.max_attempts,
                    last: e.to_string(),
                })?,
        };
        info!(
            from = self.from_block,
            to = end,
            "🔍 Scanning block range [{}, {})",
            self.from_block,
            end
        );
        Ok(ScanCursor::new(self.from_block, Some(end)))
    }

    async fn fetch_next(&self, cursor: &ScanCursor) -> Result<FetchStep> {
        let end = cursor.end.unwrap_or(cursor.position);
        if cursor.position >= end {
            return Ok(FetchStep {
                records: Vec::new(),
                next: *cursor,
                done: Some(Termination::RangeExhausted),
                skipped: None,
                match_limit: Some(1),
            });
        }

        let height = cursor.position;
        // Advance before evaluating the fetch result.
        let next = cursor.advanced();
        let done = (next.position >= end).then_some(Termination::RangeExhausted);

        match self.fetch_block_records(height).await {
            Ok(records) => Ok(FetchStep {
                records,
                next,
                done,
                skipped: None,
                match_limit: Some(1),
            }),
            Err(e) => {
                warn!(
                    height,
                    error = %e,
                    "⚠️ Block unavailable after {} attempts, skipping",
                    self.retry.max_attempts
                );
                Ok(FetchStep {
                    records: Vec::new(),
                    next,
                    done,
                    skipped: Some(height),
                    match_limit: Some(1),
                })
            }
        }
    }

    fn ordering(&self) -> EventOrdering {
        EventOrdering::OldestFirst
    }
}
