//! Persistence for runs, responses, and analysis rows.
//!
//! Backed by SQLite. The store only records raw per-response scores;
//! leaderboards and trends are always recomputed from these rows.

pub mod schema;
pub mod sqlite;

pub use sqlite::{ClearStats, Store};
