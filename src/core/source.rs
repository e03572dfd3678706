use crate::core::types::{EventOrdering, ScanCursor, SourceRef, Termination};
use crate::error::Result;
use async_trait::async_trait;

/// One raw event record, normalized to the shape the filter understands
/// regardless of which source produced it.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Pallet / module identifier as reported by the source.
    pub module: String,
    /// Event / call identifier as reported by the source.
    pub call: String,
    /// Positional textual parameters. A reward event carries exactly
    /// two: account key and amount.
    pub params: Vec<String>,
    /// Block timestamp as unix seconds.
    pub timestamp: u64,
    pub source_ref: SourceRef,
}

/// Result of one traversal step.
#[derive(Debug, Clone)]
pub struct FetchStep {
    /// Raw records fetched at the cursor position. Empty when the
    /// position was skipped or the source is exhausted.
    pub records: Vec<RawRecord>,
    /// Cursor for the next iteration.
    pub next: ScanCursor,
    /// Set when this step was the last one.
    pub done: Option<Termination>,
    /// Block height that stayed unreadable after retries, if any.
    pub skipped: Option<u64>,
    /// Cap on matching events kept from this step. The block scanner
    /// keeps only the first match per block.
    pub match_limit: Option<usize>,
}

/// A remote data source the orchestrator can traverse one cursor step at
/// a time: sequential block RPC or a paginated indexer API.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch the raw records at `cursor` and report where the traversal
    /// goes next. The returned cursor must never move backwards, and it
    /// advances exactly one step per call whether or not records were
    /// found.
    async fn fetch_next(&self, cursor: &ScanCursor) -> Result<FetchStep>;

    /// Initial cursor for a fresh scan.
    async fn start_cursor(&self) -> Result<ScanCursor>;

    /// The emission order this source produces.
    fn ordering(&self) -> EventOrdering;
}
