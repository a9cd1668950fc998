pub mod charts;
pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod server;
pub mod stats;
pub mod storage;
