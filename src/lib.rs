pub mod cli;
pub mod config;
pub mod connection;
pub mod constants;
pub mod detector;
pub mod gaps;
pub mod ingest;
pub mod logging;
pub mod notifier;
pub mod store;
pub mod tick;
