//! End-to-end scan flow over mocked remote sources.

use async_trait::async_trait;
use reward_scanner::chains::substrate::address::AccountKey;
use reward_scanner::chains::substrate::indexer::{IndexerApi, IndexerPager};
use reward_scanner::chains::substrate::rpc::{ChainRpc, RawChainEvent};
use reward_scanner::chains::substrate::scanner::ChainScanner;
use reward_scanner::core::buffer::RewardSink;
use reward_scanner::core::filter::EventFilter;
use reward_scanner::core::orchestrator::ScanOrchestrator;
use reward_scanner::core::types::{EventOrdering, RewardEvent, SourceRef, Termination};
use reward_scanner::error::{Result, ScanError};
use reward_scanner::utils::retry::RetryPolicy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const ALICE_SS58: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
const ALICE_KEY_HEX: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

fn alice_filter() -> EventFilter {
    EventFilter::new(AccountKey::from_ss58(ALICE_SS58, 42).unwrap())
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

fn no_shutdown() -> broadcast::Receiver<()> {
    broadcast::channel(1).1
}

/// Sink that records every flushed batch, shared with the test body.
#[derive(Clone)]
struct SharedSink {
    batches: Arc<Mutex<Vec<Vec<RewardEvent>>>>,
}

impl SharedSink {
    fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn batches(&self) -> Vec<Vec<RewardEvent>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RewardSink for SharedSink {
    async fn write(&mut self, batch: &[RewardEvent]) -> Result<()> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

struct MockRpc {
    head: u64,
    blocks: HashMap<u64, Vec<RawChainEvent>>,
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn chain_head_height(&self) -> Result<u64> {
        Ok(self.head)
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        Ok(format!("0x{:064x}", height))
    }

    async fn events_at(&self, block_hash: &str) -> Result<Vec<RawChainEvent>> {
        let height = u64::from_str_radix(block_hash.trim_start_matches("0x"), 16)
            .map_err(|e| ScanError::Transport(e.to_string()))?;
        Ok(self.blocks.get(&height).cloned().unwrap_or_default())
    }

    async fn timestamp_at(&self, _block_hash: &str) -> Result<u64> {
        Ok(1_700_000_000_000)
    }
}

fn reward(account_hex: &str, amount: &str) -> RawChainEvent {
    RawChainEvent {
        pallet: "parachainStaking".to_string(),
        method: "Rewarded".to_string(),
        data: vec![format!("0x{}", account_hex), amount.to_string()],
    }
}

fn transfer_noise() -> RawChainEvent {
    RawChainEvent {
        pallet: "balances".to_string(),
        method: "Transfer".to_string(),
        data: vec!["0xfrom".to_string(), "0xto".to_string(), "1".to_string()],
    }
}

#[tokio::test]
async fn block_traversal_collects_matching_rewards_over_a_range() {
    // Range [1000, 1003): reward for the watched account at 1002 only,
    // plus noise and a reward for somebody else.
    let mut blocks = HashMap::new();
    blocks.insert(1000, vec![transfer_noise()]);
    blocks.insert(1001, vec![reward("deadbeef", "999")]);
    blocks.insert(
        1002,
        vec![transfer_noise(), reward(ALICE_KEY_HEX, "500000000000000")],
    );

    let scanner = ChainScanner::new(
        MockRpc { head: 2000, blocks },
        fast_retry(),
        1000,
        Some(1003),
    );
    let sink = SharedSink::new();
    let result = ScanOrchestrator::new(scanner, sink.clone(), alice_filter(), 50)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::RangeExhausted);
    assert_eq!(result.ordering, EventOrdering::OldestFirst);
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].amount, 500_000_000_000_000);
    assert_eq!(result.events[0].timestamp, 1_700_000_000);
    assert_eq!(
        result.events[0].source_ref,
        SourceRef::Block {
            height: 1002,
            event_idx: 1
        }
    );
    assert_eq!(result.final_cursor.position, 1003);

    // One flush with the single event.
    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
}

struct MockIndexer {
    pages: Vec<Vec<Value>>,
}

#[async_trait]
impl IndexerApi for MockIndexer {
    async fn events_page(&self, page: u64) -> Result<Vec<Value>> {
        Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
    }
}

fn indexer_row(block: u64, account_hex: &str, amount: &str) -> Value {
    json!({
        "block_num": block,
        "params": format!(
            r#"[{{"type":"AccountId","value":"0x{}"}},{{"type":"Balance","value":"{}"}}]"#,
            account_hex, amount
        ),
        "event_index": format!("{}-2", block),
        "event_idx": 0,
        "extrinsic_hash": "",
        "block_timestamp": 1_699_999_000u64,
        "module_id": "parachainstaking",
        "event_id": "Rewarded",
    })
}

#[tokio::test]
async fn indexer_pagination_flushes_full_batches_until_empty_page() {
    // Two rows per page, page size two: each full page flushes once,
    // the empty page terminates with nothing pending.
    let pages = vec![
        vec![
            indexer_row(1002, ALICE_KEY_HEX, "3"),
            indexer_row(1001, ALICE_KEY_HEX, "2"),
        ],
        vec![
            indexer_row(1000, ALICE_KEY_HEX, "1"),
            indexer_row(999, "deadbeef", "7"),
        ],
        vec![],
    ];

    let pager = IndexerPager::new(MockIndexer { pages }, fast_retry(), 0, None);
    let sink = SharedSink::new();
    let result = ScanOrchestrator::new(pager, sink.clone(), alice_filter(), 2)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::NaturalEnd);
    assert_eq!(result.ordering, EventOrdering::NewestFirst);
    let amounts: Vec<u128> = result.events.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![3, 2, 1]);

    let batches = sink.batches();
    assert!(batches.iter().all(|b| b.len() <= 2));
    assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 3);
    assert_eq!(batches[0].len(), 2);
}

struct FlakyIndexer {
    pages: Vec<Vec<Value>>,
    fail_from: u64,
}

#[async_trait]
impl IndexerApi for FlakyIndexer {
    async fn events_page(&self, page: u64) -> Result<Vec<Value>> {
        if page >= self.fail_from {
            return Err(ScanError::Transport("indexer down".to_string()));
        }
        Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
    }
}

#[tokio::test]
async fn fatal_source_error_flushes_the_partial_batch_first() {
    // Page 0 yields one matching event (batch not yet full), page 1
    // keeps failing. The pending event must reach the sink anyway.
    let pages = vec![vec![indexer_row(1002, ALICE_KEY_HEX, "42")]];
    let pager = IndexerPager::new(
        FlakyIndexer {
            pages,
            fail_from: 1,
        },
        fast_retry(),
        0,
        None,
    );
    let sink = SharedSink::new();
    let err = ScanOrchestrator::new(pager, sink.clone(), alice_filter(), 50)
        .run(no_shutdown())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::RetrievalExhausted { .. }));
    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].amount, 42);
}

/// Indexer that raises the shutdown flag while serving its first page,
/// as a signal handler would mid-scan.
struct SignalingIndexer {
    pages: Vec<Vec<Value>>,
    shutdown_tx: broadcast::Sender<()>,
}

#[async_trait]
impl IndexerApi for SignalingIndexer {
    async fn events_page(&self, page: u64) -> Result<Vec<Value>> {
        if page == 0 {
            let _ = self.shutdown_tx.send(());
        }
        Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
    }
}

#[tokio::test]
async fn shutdown_mid_scan_flushes_the_pending_partial_batch() {
    // Page size 50, one matched event buffered: the signal arriving
    // during page 0 must stop the scan before page 1 and still hand the
    // buffered event to the sink.
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let pager = IndexerPager::new(
        SignalingIndexer {
            pages: vec![
                vec![indexer_row(1002, ALICE_KEY_HEX, "42")],
                vec![indexer_row(1001, ALICE_KEY_HEX, "7")],
            ],
            shutdown_tx,
        },
        fast_retry(),
        0,
        None,
    );
    let sink = SharedSink::new();
    let result = ScanOrchestrator::new(pager, sink.clone(), alice_filter(), 50)
        .run(shutdown_rx)
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::Interrupted);
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].amount, 42);

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].amount, 42);
}

#[tokio::test]
async fn page_cap_stops_pagination_with_data_remaining() {
    let pages = vec![
        vec![indexer_row(1002, ALICE_KEY_HEX, "2")],
        vec![indexer_row(1001, ALICE_KEY_HEX, "1")],
        vec![indexer_row(1000, ALICE_KEY_HEX, "0")],
    ];
    let pager = IndexerPager::new(MockIndexer { pages }, fast_retry(), 0, Some(2));
    let sink = SharedSink::new();
    let result = ScanOrchestrator::new(pager, sink, alice_filter(), 50)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::PageCapReached);
    assert_eq!(result.events.len(), 2);
}
