use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the record a reward event was extracted from, uniquely
/// within one scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Block height plus the event's index within that block (RPC scan).
    Block { height: u64, event_idx: u32 },
    /// Composite indexer event index ("{block_num}-{event_idx}") plus the
    /// extrinsic hash the indexer reported for the event.
    Indexer {
        event_index: String,
        extrinsic_hash: String,
    },
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Block { height, event_idx } => write!(f, "{}-{}", height, event_idx),
            SourceRef::Indexer { extrinsic_hash, .. } => write!(f, "{}", extrinsic_hash),
        }
    }
}

/// One "staking reward paid" event, normalized across sources.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RewardEvent {
    /// Reward amount in minimal chain units (femto for KILT).
    pub amount: u128,
    /// Block timestamp as unix seconds.
    pub timestamp: u64,
    pub source_ref: SourceRef,
}

/// Traversal position: a block height for the RPC scanner, a page number
/// for the indexer pager. `end` is the exclusive upper bound (target
/// block for the scanner, optional page ceiling for the pager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub position: u64,
    pub end: Option<u64>,
}

impl ScanCursor {
    pub fn new(position: u64, end: Option<u64>) -> Self {
        Self { position, end }
    }

    /// Next cursor, one step forward. The bound is carried unchanged.
    pub fn advanced(&self) -> Self {
        Self {
            position: self.position + 1,
            end: self.end,
        }
    }
}

/// Why a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The half-open block range was fully traversed.
    RangeExhausted,
    /// The indexer returned an empty page: natural end of data.
    NaturalEnd,
    /// The configured page ceiling was hit before the natural end.
    PageCapReached,
    /// A shutdown signal arrived between iterations; everything fetched
    /// so far was flushed.
    Interrupted,
}

/// Order in which events were emitted, matching the source's native
/// traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrdering {
    /// ChainScanner walks increasing block heights.
    OldestFirst,
    /// The indexer API pages from newest to oldest.
    NewestFirst,
}

/// Outcome of a completed (non-aborted) scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Every flushed event, in emission order.
    pub events: Vec<RewardEvent>,
    /// Block heights that stayed unreadable after retries (RPC scan only).
    pub skipped_blocks: Vec<u64>,
    pub termination: Termination,
    pub ordering: EventOrdering,
    /// Cursor position after the last iteration.
    pub final_cursor: ScanCursor,
}
