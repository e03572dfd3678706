use crate::config::OutputConfig;
use crate::core::buffer::RewardSink;
use crate::core::types::RewardEvent;
use crate::error::Result;
use crate::utils::format::format_amount;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Koinly custom-CSV column layout.
const CSV_HEADER: &str = "Koinly Date,Amount,Currency,Label,TxHash";
const LABEL: &str = "staking";

/// Appends flushed reward batches to a Koinly-importable CSV file.
///
/// The file (and its directory) is created with the header on first
/// write; later batches append. Dry-run mode logs the rows instead.
pub struct CsvSink {
    path: PathBuf,
    currency: String,
    decimals: u32,
    dry_run: bool,
}

impl CsvSink {
    pub fn new(cfg: &OutputConfig) -> Self {
        Self {
            path: PathBuf::from(&cfg.dir).join(&cfg.file_name),
            currency: cfg.currency.clone(),
            decimals: cfg.decimals,
            dry_run: cfg.dry_run,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn ensure_file(&self) -> std::io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        info!(path = %self.path.display(), "Output CSV does not exist, creating it");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", CSV_HEADER))
    }

    fn format_row(&self, event: &RewardEvent) -> String {
        format!(
            "{},{},{},{},{}",
            format_date(event.timestamp),
            format_amount(event.amount, self.decimals),
            self.currency,
            LABEL,
            event.source_ref
        )
    }
}

fn format_date(unix_seconds: u64) -> String {
    match Utc.timestamp_opt(unix_seconds as i64, 0).single() {
        Some(date) => date.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => {
            warn!(unix_seconds, "Timestamp out of range, writing raw value");
            unix_seconds.to_string()
        }
    }
}

#[async_trait]
impl RewardSink for CsvSink {
    async fn write(&mut self, batch: &[RewardEvent]) -> Result<()> {
        if self.dry_run {
            info!(rows = batch.len(), "Dry run: not writing to file");
            for event in batch {
                info!("  {}", self.format_row(event));
            }
            return Ok(());
        }

        self.ensure_file()?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        for event in batch {
            writeln!(file, "{}", self.format_row(event))?;
        }
        info!(
            rows = batch.len(),
            path = %self.path.display(),
            "💾 Appended batch to CSV"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SourceRef;

    fn output_config(dir: &std::path::Path, dry_run: bool) -> OutputConfig {
        OutputConfig {
            dir: dir.to_string_lossy().to_string(),
            file_name: "rewards.csv".to_string(),
            currency: "KILT".to_string(),
            decimals: 15,
            dry_run,
        }
    }

    fn event(amount: u128, timestamp: u64) -> RewardEvent {
        RewardEvent {
            amount,
            timestamp,
            source_ref: SourceRef::Block {
                height: 1002,
                event_idx: 0,
            },
        }
    }

    #[tokio::test]
    async fn creates_file_with_header_and_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(&output_config(dir.path(), false));

        sink.write(&[event(500_000_000_000_000, 1_700_000_000)])
            .await
            .unwrap();
        sink.write(&[event(1_000_000_000_000_000, 1_700_086_400)])
            .await
            .unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2023-11-14 22:13 UTC,0.5,KILT,staking,1002-0");
        assert_eq!(lines[2], "2023-11-15 22:13 UTC,1,KILT,staking,1002-0");
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(&output_config(dir.path(), true));

        sink.write(&[event(1, 1_700_000_000)]).await.unwrap();
        assert!(!sink.path().exists());
    }

    #[test]
    fn date_format_is_koinly_compatible() {
        assert_eq!(format_date(1_700_000_000), "2023-11-14 22:13 UTC");
        assert_eq!(format_date(0), "1970-01-01 00:00 UTC");
    }
}
