//! Sync OpenF1 session and driver metadata into a local SQLite store,
//! with a TTL response cache and retrying HTTP client in front of the API.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod openf1;
pub mod sync;
