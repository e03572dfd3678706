use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "reward-scanner",
    version,
    about = "Collects parachain staking rewards for one account into a Koinly CSV"
)]
pub struct Cli {
    /// Specify the config file path (default: ./config.yaml)
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Log the rows that would be written instead of touching the CSV
    #[arg(long)]
    pub dry_run: bool,
}
