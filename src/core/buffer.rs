use crate::core::types::RewardEvent;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Downstream sink receiving flushed batches. Called once per full page
/// and once more for the final partial page; implementations must
/// tolerate multiple calls per scan.
#[async_trait]
pub trait RewardSink: Send {
    async fn write(&mut self, batch: &[RewardEvent]) -> Result<()>;
}

/// Accumulates filtered events up to the configured page size and hands
/// full batches to the sink. The flush is awaited before the caller
/// continues, so the source never races ahead of the sink.
pub struct PageBuffer {
    pending: Vec<RewardEvent>,
    page_size: usize,
    flush_count: u64,
}

impl PageBuffer {
    pub fn new(page_size: usize) -> Self {
        Self {
            pending: Vec::with_capacity(page_size),
            page_size,
            flush_count: 0,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    /// Append one event, flushing through the sink when the page fills.
    pub async fn append(&mut self, event: RewardEvent, sink: &mut dyn RewardSink) -> Result<()> {
        self.pending.push(event);
        if self.pending.len() >= self.page_size {
            self.flush(sink).await?;
        }
        Ok(())
    }

    /// Hand the pending batch to the sink and clear it. No-op when the
    /// batch is empty, so a scan that ends on a page boundary does not
    /// produce a trailing empty write.
    pub async fn flush(&mut self, sink: &mut dyn RewardSink) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        debug!(batch_len = self.pending.len(), "Flushing batch to sink");
        sink.write(&self.pending).await?;
        self.flush_count += 1;
        self.pending.clear();
        Ok(())
    }
}
