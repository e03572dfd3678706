use anyhow::{Context, Result};
use clap::Parser;
use reward_scanner::{
    chains::substrate::{
        address::AccountKey,
        indexer::{IndexerPager, SubscanClient},
        rpc::SidecarClient,
        scanner::ChainScanner,
    },
    cli::Cli,
    config::{AppConfig, SourceKind},
    core::{
        buffer::RewardSink, filter::EventFilter, orchestrator::ScanOrchestrator,
        source::SourceAdapter, types::ScanResult,
    },
    error::ScanError,
    output::csv::CsvSink,
    utils::logger::init_logger,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let mut cfg = AppConfig::load(&args.config)?;
    if args.dry_run {
        cfg.output.dry_run = true;
    }
    cfg.validate()?;

    // Initialize logger system
    init_logger(
        &cfg.logging.level,
        cfg.logging.to_file,
        &cfg.logging.file_path,
    );

    info!("✅ Configuration load successful");
    info!(source = ?cfg.scan.source, "Reward source");
    info!(account = %cfg.scan.rewarded_account, "Rewarded account");
    info!(page_size = cfg.scan.page_size, "Batch size");

    let key = AccountKey::from_ss58(&cfg.scan.rewarded_account, cfg.scan.ss58_prefix)
        .context("Failed to resolve rewarded account address")?;
    info!(key = %key.to_hex(), "🔑 Resolved account key");

    let filter = EventFilter::new(key);
    let sink = CsvSink::new(&cfg.output);
    let retry = cfg.scan.retry_policy();

    // Create shutdown channel; the orchestrator polls it between a
    // completed flush and the next fetch.
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Spawn signal handler task for Ctrl+C
    let shutdown_tx_sigint = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("📡 Received shutdown signal (Ctrl+C)");
        let _ = shutdown_tx_sigint.send(());
    });

    // SIGTERM handler (Unix only)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let shutdown_tx_sigterm = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                info!("📡 Received SIGTERM signal");
                let _ = shutdown_tx_sigterm.send(());
            }
        });
    }

    let result = match cfg.scan.source {
        SourceKind::Rpc => {
            // validate() guarantees the section exists
            let chain = cfg
                .chain
                .as_ref()
                .ok_or_else(|| ScanError::Configuration("chain section missing".to_string()))?;
            info!(endpoint = %chain.endpoint, from = chain.from_block, "🚀 Starting block traversal...");
            let rpc = SidecarClient::new(
                &chain.endpoint,
                std::time::Duration::from_secs(chain.timeout_secs),
            )?;
            let scanner = ChainScanner::new(rpc, retry, chain.from_block, chain.to_block);
            run_scan(scanner, sink, filter, cfg.scan.page_size, shutdown_rx).await?
        }
        SourceKind::Indexer => {
            let indexer = cfg
                .indexer
                .as_ref()
                .ok_or_else(|| ScanError::Configuration("indexer section missing".to_string()))?;
            info!(endpoint = %indexer.endpoint, start_page = indexer.start_page, "🚀 Starting indexer pagination...");
            let api = SubscanClient::new(
                &indexer.endpoint,
                &indexer.api_key,
                cfg.scan.page_size,
                indexer.from_timestamp,
                indexer.to_timestamp,
            )?;
            let pager = IndexerPager::new(api, retry, indexer.start_page, indexer.max_pages);
            run_scan(pager, sink, filter, cfg.scan.page_size, shutdown_rx).await?
        }
    };

    if !result.skipped_blocks.is_empty() {
        warn!(blocks = ?result.skipped_blocks, "⚠️ Some blocks were skipped after repeated failures");
    }
    info!(
        rewards = result.events.len(),
        ordering = ?result.ordering,
        "✨ Scan finished ({:?})",
        result.termination
    );

    Ok(())
}

/// Drives the orchestrator to its natural end or until a shutdown
/// signal arrives. An interrupt stops between iterations and the
/// pending partial batch is flushed before returning.
async fn run_scan<S, K>(
    source: S,
    sink: K,
    filter: EventFilter,
    page_size: usize,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<ScanResult>
where
    S: SourceAdapter,
    K: RewardSink,
{
    let orchestrator = ScanOrchestrator::new(source, sink, filter, page_size);

    info!("💡 Press Ctrl+C to stop gracefully");
    Ok(orchestrator.run(shutdown_rx).await?)
}
