pub mod config;
pub mod deepl;
pub mod error;
pub mod poll;
pub mod provider;
pub mod server;
pub mod storage;
