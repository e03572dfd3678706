pub mod buffer;
pub mod filter;
pub mod orchestrator;
pub mod source;
pub mod types;
