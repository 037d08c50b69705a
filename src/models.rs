//! Data models for the share-of-voice tracker.
//!
//! This module contains the stored records (runs, responses, analysis rows)
//! and the read-side views computed from them (leaderboard, breakdown, trend).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One analysis session: a prompt set executed against a brand list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier (UUID v4).
    pub id: String,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// How many times each prompt is sent to the model.
    pub runs_per_prompt: u32,
}

impl Run {
    /// Creates a new run stamped with the current time.
    pub fn new(runs_per_prompt: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            runs_per_prompt,
        }
    }
}

/// A brand tracked by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBrand {
    pub run_id: String,
    pub brand: String,
    /// Whether this is the brand whose visibility is being tracked.
    pub is_primary: bool,
}

/// A prompt belonging to a run, in entry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPrompt {
    pub run_id: String,
    pub prompt_index: u32,
    pub prompt_text: String,
}

/// Output of a single LLM call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Unique response identifier (UUID v4).
    pub id: String,
    /// Owning run. `None` for legacy responses recorded before runs existed.
    pub run_id: Option<String>,
    /// Prompt text sent to the model.
    pub prompt: String,
    /// Raw answer text.
    pub response_text: String,
    /// Repeat number within the prompt, `1..=runs_per_prompt`.
    pub run_number: u32,
    /// Opaque tag naming the generation backend.
    pub provider: String,
    /// When the response was recorded.
    pub created_at: DateTime<Utc>,
}

impl ResponseRecord {
    /// Creates a new response for a run, stamped with the current time.
    pub fn new(
        run_id: Option<String>,
        prompt: impl Into<String>,
        response_text: impl Into<String>,
        run_number: u32,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id,
            prompt: prompt.into(),
            response_text: response_text.into(),
            run_number,
            provider: provider.into(),
            created_at: Utc::now(),
        }
    }
}

/// Scored result for one (response, brand) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub response_id: String,
    pub brand: String,
    pub mentioned: bool,
    pub total_mentions: u32,
    /// Character offset of the first mention, `-1` when absent.
    pub first_position: i64,
    pub in_first_paragraph: bool,
    /// Rubric score, `0..=MAX_SCORE_PER_RESPONSE`.
    pub score: u32,
}

impl AnalysisRecord {
    /// Builds a storable record from an analyzer result.
    pub fn from_item(response_id: &str, item: &crate::analysis::AnalysisItem) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            response_id: response_id.to_string(),
            brand: item.brand.clone(),
            mentioned: item.mentioned,
            total_mentions: item.total_mentions,
            first_position: item.first_position,
            in_first_paragraph: item.in_first_paragraph,
            score: item.score,
        }
    }
}

/// A brand's aggregated standing within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardItem {
    pub brand: String,
    /// Total score rescaled onto `0..=max_possible_score`.
    pub total_score: f64,
    /// Ceiling of `total_score` (the per-response maximum).
    pub max_possible_score: u32,
    /// Number of responses in which the brand was mentioned.
    pub mention_count: u32,
    pub avg_score: f64,
    /// Percentage of all brands' total score, `0..=100`.
    pub share_of_voice: f64,
}

/// One brand's summed score for a single prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandScore {
    pub brand: String,
    pub score: u32,
}

/// Per-prompt score breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBreakdown {
    pub prompt: String,
    pub brand_scores: Vec<BrandScore>,
}

/// Description of the run that a result set belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub runs_per_prompt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_brand: Option<String>,
    /// Prompts of the run, in entry order.
    pub prompts: Vec<String>,
}

/// Complete result set for the latest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub leaderboard: Vec<LeaderboardItem>,
    pub prompt_breakdown: Vec<PromptBreakdown>,
    pub raw_responses: Vec<ResponseRecord>,
    /// Set when results are scoped to a run rather than legacy responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_info: Option<RunInfo>,
}

/// Reference to a run (batch) included in a trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRef {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// The primary brand's standing in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDataPoint {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub share_of_voice: f64,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub brand: String,
    pub data: Vec<TrendDataPoint>,
}

/// Share-of-voice history of the primary brand across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub batches: Vec<BatchRef>,
    pub series: Vec<TrendSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_brand: Option<String>,
}

impl Trend {
    /// Returns the trend with no batches and no series.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Data points of the primary brand's series, if any.
    pub fn points(&self) -> &[TrendDataPoint] {
        self.series.first().map(|s| s.data.as_slice()).unwrap_or(&[])
    }
}

/// Outcome of a single prompt execution within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Error { message: String },
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Success => write!(f, "success"),
            CallStatus::Error { message } => write!(f, "error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub prompt: String,
    pub run_number: u32,
    #[serde(flatten)]
    pub status: CallStatus,
}

/// Summary returned after executing a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub outcomes: Vec<CallOutcome>,
}

impl RunSummary {
    /// Number of calls that produced a stored response.
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == CallStatus::Success)
            .count()
    }

    /// Number of calls that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}
