pub mod auth;
pub mod config;
pub mod content_store;
pub mod ledger;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod retry;
pub mod segmenter;
pub mod transfer;
