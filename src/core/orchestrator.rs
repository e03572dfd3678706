use crate::core::buffer::{PageBuffer, RewardSink};
use crate::core::filter::EventFilter;
use crate::core::source::SourceAdapter;
use crate::core::types::{RewardEvent, ScanResult, Termination};
use crate::error::Result;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Owns the cursor and the in-flight batch, and drives the
/// fetch → filter → buffer loop to completion.
///
/// Single remote call outstanding at a time; each flush is awaited
/// before the next fetch, so the source never outruns the sink.
pub struct ScanOrchestrator<S: SourceAdapter, K: RewardSink> {
    source: S,
    sink: K,
    filter: EventFilter,
    page_size: usize,
}

impl<S: SourceAdapter, K: RewardSink> ScanOrchestrator<S, K> {
    pub fn new(source: S, sink: K, filter: EventFilter, page_size: usize) -> Self {
        Self {
            source,
            sink,
            filter,
            page_size,
        }
    }

    /// Run one scan to completion.
    ///
    /// The shutdown receiver is polled once per iteration, after the
    /// previous batch has settled and before the next fetch; a signal
    /// stops the scan with `Termination::Interrupted`. On interrupt and
    /// on a fatal source or sink error alike, the pending partial batch
    /// is flushed first, so no already-fetched event is lost;
    /// already-flushed batches remain valid either way.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<ScanResult> {
        let mut cursor = self.source.start_cursor().await?;
        let mut buffer = PageBuffer::new(self.page_size);
        let mut events: Vec<RewardEvent> = Vec::new();
        let mut skipped_blocks: Vec<u64> = Vec::new();

        let termination = loop {
            match shutdown.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    info!(position = cursor.position, "🛑 Shutdown requested, stopping scan");
                    break Termination::Interrupted;
                }
                Err(_) => {}
            }

            let step = match self.source.fetch_next(&cursor).await {
                Ok(step) => step,
                Err(e) => {
                    if let Err(flush_err) = buffer.flush(&mut self.sink).await {
                        error!(error = %flush_err, "❌ Failed to flush pending batch during abort");
                    }
                    error!(position = cursor.position, error = %e, "❌ Scan aborted");
                    return Err(e);
                }
            };

            if let Some(height) = step.skipped {
                skipped_blocks.push(height);
            }

            let mut matched = 0usize;
            for record in &step.records {
                if step.match_limit.is_some_and(|limit| matched >= limit) {
                    break;
                }
                if let Some(event) = self.filter.extract(record) {
                    matched += 1;
                    events.push(event.clone());
                    buffer.append(event, &mut self.sink).await?;
                }
            }
            debug!(
                position = cursor.position,
                records = step.records.len(),
                matched,
                captured = events.len(),
                "Processed cursor position"
            );

            debug_assert!(
                step.next.position >= cursor.position,
                "cursor must never move backwards"
            );
            cursor = step.next;

            if let Some(termination) = step.done {
                break termination;
            }
        };

        buffer.flush(&mut self.sink).await?;

        info!(
            total = events.len(),
            skipped = skipped_blocks.len(),
            flushes = buffer.flush_count(),
            "✅ Scan complete ({:?})",
            termination
        );

        Ok(ScanResult {
            events,
            skipped_blocks,
            termination,
            ordering: self.source.ordering(),
            final_cursor: cursor,
        })
    }
}
