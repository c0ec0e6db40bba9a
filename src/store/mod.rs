//! Durable storage
//!
//! Crash-safe persistence with a table-per-entity layout, atomic multi-table
//! transactions, and additive-only schema upgrades.

mod db;
mod schema;

pub use db::Database;
pub use schema::SCHEMA_VERSION;
