//! Markdown and JSON report generation.
//!
//! Renders the latest run's results (leaderboard, prompt breakdown, raw
//! response log) and the primary brand's share-of-voice trend.

use crate::config::ReportConfig;
use crate::models::{
    LeaderboardItem, PromptBreakdown, ResponseRecord, Results, RunInfo, Trend,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Generate the Markdown report for a result set.
pub fn generate_results_markdown(results: &Results, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# Share of Voice Report\n\n");

    let primary = results
        .run_info
        .as_ref()
        .and_then(|info| info.primary_brand.as_deref());

    match results.run_info {
        Some(ref info) => output.push_str(&generate_run_info_section(info)),
        None if !results.raw_responses.is_empty() => {
            output.push_str("_Showing responses recorded outside of any run._\n\n");
        }
        None => {}
    }

    if results.raw_responses.is_empty() {
        output.push_str("No responses recorded yet. Start a run to collect data.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    output.push_str(&generate_leaderboard_section(&results.leaderboard, primary));
    output.push_str(&generate_breakdown_section(
        &results.prompt_breakdown,
        &results.leaderboard,
    ));

    if config.include_raw_responses {
        output.push_str(&generate_raw_section(
            &results.raw_responses,
            config.max_excerpt_chars,
        ));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the run information section.
fn generate_run_info_section(info: &RunInfo) -> String {
    let mut section = String::new();

    section.push_str("## Run\n\n");
    section.push_str(&format!("- **Run ID:** `{}`\n", info.run_id));
    section.push_str(&format!(
        "- **Started:** {}\n",
        info.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref brand) = info.primary_brand {
        section.push_str(&format!("- **Primary Brand:** {}\n", brand));
    }
    section.push_str(&format!("- **Runs per Prompt:** {}\n", info.runs_per_prompt));

    if !info.prompts.is_empty() {
        section.push_str("- **Prompts:**\n");
        for (i, prompt) in info.prompts.iter().enumerate() {
            section.push_str(&format!("  {}. {}\n", i + 1, prompt));
        }
    }
    section.push('\n');

    section
}

/// Generate the leaderboard table, best brand first.
fn generate_leaderboard_section(leaderboard: &[LeaderboardItem], primary: Option<&str>) -> String {
    let mut section = String::new();

    section.push_str("## Leaderboard\n\n");
    section.push_str("| Rank | Brand | Share of Voice | Score | Avg | Mentions |\n");
    section.push_str("|:---:|:---|:---:|:---:|:---:|:---:|\n");

    for (rank, item) in leaderboard.iter().enumerate() {
        let name = if Some(item.brand.as_str()) == primary {
            format!("**{}** (primary)", escape_cell(&item.brand))
        } else {
            escape_cell(&item.brand)
        };
        section.push_str(&format!(
            "| {} | {} | {:.1}% | {:.2} / {} | {:.2} | {} |\n",
            rank + 1,
            name,
            item.share_of_voice,
            item.total_score,
            item.max_possible_score,
            item.avg_score,
            item.mention_count
        ));
    }
    section.push('\n');

    section
}

/// Generate the prompt breakdown table with one column per brand.
fn generate_breakdown_section(breakdown: &[PromptBreakdown], leaderboard: &[LeaderboardItem]) -> String {
    let mut section = String::new();

    if breakdown.is_empty() {
        return section;
    }

    section.push_str("## Prompt Breakdown\n\n");

    let brands: Vec<&str> = leaderboard.iter().map(|item| item.brand.as_str()).collect();

    section.push_str("| Prompt |");
    for brand in &brands {
        section.push_str(&format!(" {} |", escape_cell(brand)));
    }
    section.push('\n');
    section.push_str("|:---|");
    section.push_str(&":---:|".repeat(brands.len()));
    section.push('\n');

    for row in breakdown {
        section.push_str(&format!("| {} |", escape_cell(&row.prompt)));
        for brand in &brands {
            let score = row
                .brand_scores
                .iter()
                .find(|s| s.brand == *brand)
                .map(|s| s.score)
                .unwrap_or(0);
            section.push_str(&format!(" {} |", score));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Generate the raw response log.
fn generate_raw_section(responses: &[ResponseRecord], max_chars: usize) -> String {
    let mut section = String::new();

    section.push_str("## Raw Responses\n\n");

    for response in responses {
        section.push_str(&format!(
            "### {} (run {}, {})\n\n",
            response.prompt, response.run_number, response.provider
        ));
        section.push_str(&format!(
            "_{}_\n\n",
            response.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        for line in truncate(&response.response_text, max_chars).lines() {
            section.push_str("> ");
            section.push_str(line);
            section.push('\n');
        }
        section.push('\n');
    }

    section
}

/// Generate the Markdown report for a trend.
pub fn generate_trend_markdown(trend: &Trend) -> String {
    let mut output = String::new();

    output.push_str("# Share of Voice Trend\n\n");

    let Some(ref brand) = trend.primary_brand else {
        output.push_str("No primary brand found in the latest run, so there is no trend to show.\n\n");
        output.push_str(&generate_footer());
        return output;
    };

    output.push_str(&format!("- **Primary Brand:** {}\n", brand));
    output.push_str(&format!("- **Runs:** {}\n\n", trend.batches.len()));

    let points = trend.points();
    if !points.is_empty() {
        output.push_str("| # | Run | Date | Share of Voice | Score |\n");
        output.push_str("|:---:|:---|:---|:---:|:---:|\n");
        for (i, point) in points.iter().enumerate() {
            output.push_str(&format!(
                "| {} | `{}` | {} | {:.1}% | {:.2} |\n",
                i + 1,
                short_id(&point.batch_id),
                point.created_at.format("%Y-%m-%d %H:%M"),
                point.share_of_voice,
                point.total_score
            ));
        }
        output.push('\n');
    }

    if trend.batches.len() < 2 {
        output.push_str("_At least two runs are needed to show a trend._\n\n");
    } else if let (Some(first), Some(last)) = (points.first(), points.last()) {
        let delta = last.share_of_voice - first.share_of_voice;
        output.push_str(&format!(
            "Change since first run: {:+.1} percentage points.\n\n",
            delta
        ));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by BrandPulse v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Serialize any report view as pretty JSON.
pub fn generate_json_report<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Write a rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
