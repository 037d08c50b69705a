//! Report rendering.

pub mod generator;

pub use generator::{
    generate_json_report, generate_results_markdown, generate_trend_markdown, write_report,
};
