use crate::error::ScanError;
use crate::utils::retry::RetryPolicy;
use anyhow::Result;
use config as config_loader;
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Global config structure
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub chain: Option<ChainConfig>,
    #[serde(default)]
    pub indexer: Option<IndexerConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which remote source drives the scan.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Sequential block traversal over the node RPC.
    Rpc,
    /// Paginated indexer API query.
    Indexer,
}

/// Scan parameters shared by both source variants
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "ScanConfig::default_source")]
    pub source: SourceKind,
    /// SS58 address whose rewards are collected
    #[serde(default)]
    pub rewarded_account: String,
    #[serde(default = "ScanConfig::default_ss58_prefix")]
    pub ss58_prefix: u16,
    /// Events per flushed batch (and rows per indexer page)
    #[serde(default = "ScanConfig::default_page_size")]
    pub page_size: usize,
    #[serde(default = "ScanConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "ScanConfig::default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl ScanConfig {
    fn default_source() -> SourceKind {
        SourceKind::Indexer
    }
    fn default_ss58_prefix() -> u16 {
        38 // KILT
    }
    fn default_page_size() -> usize {
        50
    }
    fn default_max_attempts() -> u32 {
        5
    }
    fn default_retry_delay_secs() -> u64 {
        5
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay_secs))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source: Self::default_source(),
            rewarded_account: String::new(),
            ss58_prefix: Self::default_ss58_prefix(),
            page_size: Self::default_page_size(),
            max_attempts: Self::default_max_attempts(),
            retry_delay_secs: Self::default_retry_delay_secs(),
        }
    }
}

/// Node RPC source config
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub endpoint: String,
    #[serde(default)]
    pub from_block: u64,
    /// Exclusive upper bound; defaults to the head observed at scan start
    #[serde(default)]
    pub to_block: Option<u64>,
    #[serde(default = "ChainConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ChainConfig {
    fn default_timeout_secs() -> u64 {
        30
    }
}

/// Indexer API source config
#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    #[serde(default = "IndexerConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub start_page: u64,
    #[serde(default)]
    pub from_timestamp: Option<u64>,
    #[serde(default)]
    pub to_timestamp: Option<u64>,
    /// Hard page-count ceiling, distinct from the natural end of data
    #[serde(default)]
    pub max_pages: Option<u64>,
}

impl IndexerConfig {
    fn default_endpoint() -> String {
        "https://spiritnet.api.subscan.io/api/scan/events".to_string()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            api_key: String::new(),
            start_page: 0,
            from_timestamp: None,
            to_timestamp: None,
            max_pages: None,
        }
    }
}

/// CSV output config
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_dir")]
    pub dir: String,
    #[serde(default = "OutputConfig::default_file_name")]
    pub file_name: String,
    #[serde(default = "OutputConfig::default_currency")]
    pub currency: String,
    #[serde(default = "OutputConfig::default_decimals")]
    pub decimals: u32,
    #[serde(default)]
    pub dry_run: bool,
}

impl OutputConfig {
    fn default_dir() -> String {
        ".".to_string()
    }
    fn default_file_name() -> String {
        "rewards.csv".to_string()
    }
    fn default_currency() -> String {
        "KILT".to_string()
    }
    fn default_decimals() -> u32 {
        15
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            file_name: Self::default_file_name(),
            currency: Self::default_currency(),
            decimals: Self::default_decimals(),
            dry_run: false,
        }
    }
}

/// Logging config
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub to_file: bool,
    #[serde(default = "LoggingConfig::default_file_path")]
    pub file_path: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_file_path() -> String {
        "./logs/reward-scanner.log".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            to_file: false,
            file_path: Self::default_file_path(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv().ok(); // Load the .env file

        let builder = config_loader::Config::builder()
            .add_source(config_loader::File::from(path.as_ref().to_path_buf()).required(false))
            .add_source(config_loader::Environment::with_prefix("SCANNER").separator("__"))
            .build()?;

        let mut cfg = builder.try_deserialize::<AppConfig>()?;
        cfg.apply_legacy_env()?;
        Ok(cfg)
    }

    /// Bare env-variable names kept compatible with earlier tooling;
    /// they win over file values.
    fn apply_legacy_env(&mut self) -> Result<()> {
        if let Ok(account) = std::env::var("REWARDED_ACCOUNT") {
            self.scan.rewarded_account = account;
        }
        if let Some(rows) = env_parse::<usize>("MAX_ROWS")? {
            self.scan.page_size = rows;
        }
        if let Some(attempts) = env_parse::<u32>("MAX_ATTEMPTS")? {
            self.scan.max_attempts = attempts;
        }
        if let Some(delay) = env_parse::<u64>("RETRY_TIMEOUT")? {
            self.scan.retry_delay_secs = delay;
        }

        if let Ok(key) = std::env::var("SUBSCAN_API_KEY") {
            self.indexer.get_or_insert_with(Default::default).api_key = key;
        }
        if let Some(page) = env_parse::<u64>("START_PAGE")? {
            self.indexer.get_or_insert_with(Default::default).start_page = page;
        }
        if let Some(pages) = env_parse::<u64>("MAX_PAGES")? {
            self.indexer.get_or_insert_with(Default::default).max_pages = Some(pages);
        }
        if let Some(from) = env_parse::<u64>("FROM_TIMESTAMP")? {
            self.indexer
                .get_or_insert_with(Default::default)
                .from_timestamp = Some(from);
        }
        if let Some(to) = env_parse::<u64>("TO_TIMESTAMP")? {
            self.indexer
                .get_or_insert_with(Default::default)
                .to_timestamp = Some(to);
        }

        if let Ok(endpoint) = std::env::var("RPC_ENDPOINT") {
            if let Some(chain) = self.chain.as_mut() {
                chain.endpoint = endpoint;
            } else {
                self.chain = Some(ChainConfig {
                    endpoint,
                    from_block: 0,
                    to_block: None,
                    timeout_secs: ChainConfig::default_timeout_secs(),
                });
            }
        }
        if let Some(from) = env_parse::<u64>("FROM_BLOCK")? {
            if let Some(chain) = self.chain.as_mut() {
                chain.from_block = from;
            }
        }
        if let Some(to) = env_parse::<u64>("TO_BLOCK")? {
            if let Some(chain) = self.chain.as_mut() {
                chain.to_block = Some(to);
            }
        }

        Ok(())
    }

    /// Checks every parameter the selected source needs. Fatal before
    /// the scan starts.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.scan.rewarded_account.is_empty() {
            return Err(ScanError::Configuration(
                "scan.rewarded_account (or REWARDED_ACCOUNT) is required".to_string(),
            ));
        }
        if self.scan.page_size == 0 {
            return Err(ScanError::Configuration(
                "scan.page_size must be at least 1".to_string(),
            ));
        }
        if self.scan.max_attempts == 0 {
            return Err(ScanError::Configuration(
                "scan.max_attempts must be at least 1".to_string(),
            ));
        }

        match self.scan.source {
            SourceKind::Rpc => {
                let chain = self.chain.as_ref().ok_or_else(|| {
                    ScanError::Configuration(
                        "chain section (or RPC_ENDPOINT) is required for source = rpc".to_string(),
                    )
                })?;
                if chain.endpoint.is_empty() {
                    return Err(ScanError::Configuration(
                        "chain.endpoint must not be empty".to_string(),
                    ));
                }
                if let Some(to) = chain.to_block {
                    if to < chain.from_block {
                        return Err(ScanError::Configuration(format!(
                            "chain.to_block ({}) is below chain.from_block ({})",
                            to, chain.from_block
                        )));
                    }
                }
            }
            SourceKind::Indexer => {
                let indexer = self.indexer.as_ref().ok_or_else(|| {
                    ScanError::Configuration(
                        "indexer section (or SUBSCAN_API_KEY) is required for source = indexer"
                            .to_string(),
                    )
                })?;
                if indexer.api_key.is_empty() {
                    return Err(ScanError::Configuration(
                        "indexer.api_key (or SUBSCAN_API_KEY) is required".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ScanError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ScanError::Configuration(format!("{}={}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
