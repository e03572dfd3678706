pub mod address;
pub mod indexer;
pub mod rpc;
pub mod scanner;
