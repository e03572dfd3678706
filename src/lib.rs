pub mod chains;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod output;
pub mod utils;
