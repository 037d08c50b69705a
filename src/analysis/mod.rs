//! Analysis modules.
//!
//! `mentions` scores one response against a brand list; `aggregator` rolls
//! stored scores up into leaderboards, prompt breakdowns, and trends.

pub mod aggregator;
pub mod mentions;

pub use aggregator::*;
pub use mentions::{analyze_response, AnalysisItem, MAX_SCORE_PER_RESPONSE};
