//! Score aggregation across responses and runs.
//!
//! This module turns per-response analysis rows into the read-side views:
//! a normalized leaderboard for one run, a per-prompt breakdown, and the
//! primary brand's share-of-voice trend across runs. Only raw per-record
//! scores are persisted, so every aggregate here must be reproducible from
//! stored rows alone.

use super::mentions::MAX_SCORE_PER_RESPONSE;
use crate::models::{
    AnalysisRecord, BatchRef, BrandScore, LeaderboardItem, PromptBreakdown, ResponseRecord, Run,
    RunBrand, Trend, TrendDataPoint, TrendSeries,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ceiling that leaderboard totals are rescaled onto.
const NORMALIZED_MAX: f64 = MAX_SCORE_PER_RESPONSE as f64;

/// Everything the trend computation needs to know about one run.
#[derive(Debug, Clone)]
pub struct RunHistory {
    pub run: Run,
    pub brands: Vec<RunBrand>,
    pub responses: Vec<ResponseRecord>,
}

/// Keep only the analysis rows that belong to `responses`.
pub fn filter_analysis(responses: &[ResponseRecord], analysis: &[AnalysisRecord]) -> Vec<AnalysisRecord> {
    let ids: HashSet<&str> = responses.iter().map(|r| r.id.as_str()).collect();
    analysis
        .iter()
        .filter(|a| ids.contains(a.response_id.as_str()))
        .cloned()
        .collect()
}

/// Distinct brand names in order of first appearance.
fn distinct_brands(analysis: &[AnalysisRecord]) -> Vec<&str> {
    let mut seen = HashSet::new();
    analysis
        .iter()
        .map(|a| a.brand.as_str())
        .filter(|brand| seen.insert(*brand))
        .collect()
}

/// Build the leaderboard for one run, best brand first.
///
/// `analysis` must already be restricted to `responses`.
pub fn compute_leaderboard(
    responses: &[ResponseRecord],
    analysis: &[AnalysisRecord],
) -> Vec<LeaderboardItem> {
    let response_count = responses.len();
    if response_count == 0 {
        return Vec::new();
    }

    let raw_max_possible = response_count as f64 * NORMALIZED_MAX;
    let brands = distinct_brands(analysis);
    let brand_count = brands.len();

    let mut leaderboard: Vec<LeaderboardItem> = brands
        .iter()
        .map(|&brand| {
            let (raw_total, mention_count) = analysis
                .iter()
                .filter(|a| a.brand == brand)
                .fold((0u64, 0u32), |(total, mentions), a| {
                    (total + u64::from(a.score), mentions + u32::from(a.mentioned))
                });

            let total_score = if raw_max_possible > 0.0 {
                (raw_total as f64 * NORMALIZED_MAX) / raw_max_possible
            } else {
                0.0
            };

            // Divides by expected responses per brand, not by response count.
            let avg_score = if brand_count > 0 && response_count > 0 {
                total_score / (response_count as f64 / brand_count as f64)
            } else {
                0.0
            };

            LeaderboardItem {
                brand: brand.to_string(),
                total_score,
                max_possible_score: MAX_SCORE_PER_RESPONSE,
                mention_count,
                avg_score,
                share_of_voice: 0.0,
            }
        })
        .collect();

    let total_all_scores: f64 = leaderboard.iter().map(|item| item.total_score).sum();
    for item in &mut leaderboard {
        item.share_of_voice = if total_all_scores > 0.0 {
            (item.total_score / total_all_scores) * 100.0
        } else {
            0.0
        };
    }

    // Stable sort keeps first-appearance order for ties.
    leaderboard.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
    });

    leaderboard
}

/// Sum each brand's raw scores per prompt.
pub fn compute_prompt_breakdown(
    responses: &[ResponseRecord],
    analysis: &[AnalysisRecord],
) -> Vec<PromptBreakdown> {
    let prompt_by_response: HashMap<&str, &str> = responses
        .iter()
        .map(|r| (r.id.as_str(), r.prompt.as_str()))
        .collect();

    let mut seen = HashSet::new();
    let prompts: Vec<&str> = responses
        .iter()
        .map(|r| r.prompt.as_str())
        .filter(|prompt| seen.insert(*prompt))
        .collect();
    let brands = distinct_brands(analysis);

    prompts
        .into_iter()
        .map(|prompt| {
            let brand_scores = brands
                .iter()
                .map(|&brand| {
                    let score = analysis
                        .iter()
                        .filter(|a| {
                            a.brand == brand
                                && prompt_by_response.get(a.response_id.as_str()) == Some(&prompt)
                        })
                        .map(|a| a.score)
                        .sum();
                    BrandScore {
                        brand: brand.to_string(),
                        score,
                    }
                })
                .collect();

            PromptBreakdown {
                prompt: prompt.to_string(),
                brand_scores,
            }
        })
        .collect()
}

/// Track the latest run's primary brand across every run that includes it.
///
/// `runs` must be in chronological order; the last one is the latest.
pub fn compute_trend(runs: &[RunHistory], analysis: &[AnalysisRecord]) -> Trend {
    let Some(latest) = runs.last() else {
        return Trend::empty();
    };

    let Some(primary_brand) = latest
        .brands
        .iter()
        .find(|b| b.is_primary)
        .map(|b| b.brand.clone())
    else {
        debug!("Latest run {} has no primary brand; trend is empty", latest.run.id);
        return Trend::empty();
    };

    let mut batches = Vec::new();
    let mut data = Vec::new();

    for history in runs
        .iter()
        .filter(|h| h.brands.iter().any(|b| b.brand == primary_brand))
    {
        if history.responses.is_empty() {
            debug!("Skipping run {} with no responses", history.run.id);
            continue;
        }

        let run_analysis = filter_analysis(&history.responses, analysis);
        let leaderboard = compute_leaderboard(&history.responses, &run_analysis);
        let standing = leaderboard.iter().find(|item| item.brand == primary_brand);

        batches.push(BatchRef {
            id: history.run.id.clone(),
            created_at: history.run.created_at,
        });
        data.push(TrendDataPoint {
            batch_id: history.run.id.clone(),
            created_at: history.run.created_at,
            share_of_voice: standing.map(|s| s.share_of_voice).unwrap_or(0.0),
            total_score: standing.map(|s| s.total_score).unwrap_or(0.0),
        });
    }

    Trend {
        batches,
        series: vec![TrendSeries {
            brand: primary_brand.clone(),
            data,
        }],
        primary_brand: Some(primary_brand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_response;
    use chrono::{Duration, TimeZone, Utc};

    fn response(id: &str, prompt: &str) -> ResponseRecord {
        ResponseRecord {
            id: id.to_string(),
            run_id: Some("run".to_string()),
            prompt: prompt.to_string(),
            response_text: String::new(),
            run_number: 1,
            provider: "test".to_string(),
            created_at: Utc::now(),
        }
    }

    fn record(response_id: &str, brand: &str, score: u32) -> AnalysisRecord {
        AnalysisRecord {
            id: format!("{}-{}", response_id, brand),
            response_id: response_id.to_string(),
            brand: brand.to_string(),
            mentioned: score > 0,
            total_mentions: u32::from(score > 0),
            first_position: if score > 0 { 0 } else { -1 },
            in_first_paragraph: false,
            score,
        }
    }

    fn history(run_id: &str, minutes: i64, brands: &[(&str, bool)], responses: Vec<ResponseRecord>) -> RunHistory {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        RunHistory {
            run: Run {
                id: run_id.to_string(),
                created_at: base + Duration::minutes(minutes),
                runs_per_prompt: 1,
            },
            brands: brands
                .iter()
                .map(|(brand, is_primary)| RunBrand {
                    run_id: run_id.to_string(),
                    brand: brand.to_string(),
                    is_primary: *is_primary,
                })
                .collect(),
            responses,
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_leaderboard_normalizes_onto_ceiling() {
        let responses = vec![response("r1", "p"), response("r2", "p")];
        let analysis = vec![
            record("r1", "Acme", 8),
            record("r2", "Acme", 4),
            record("r1", "Foo", 2),
            record("r2", "Foo", 0),
        ];

        let board = compute_leaderboard(&responses, &analysis);

        assert_eq!(board[0].brand, "Acme");
        assert_close(board[0].total_score, 6.0); // 12 * 8 / 16
        assert_eq!(board[0].max_possible_score, 8);
        assert_eq!(board[0].mention_count, 2);
        assert_close(board[0].avg_score, 6.0); // 6 / (2 / 2)
        assert_close(board[0].share_of_voice, 6.0 / 7.0 * 100.0);

        assert_eq!(board[1].brand, "Foo");
        assert_close(board[1].total_score, 1.0);
        assert_eq!(board[1].mention_count, 1);
    }

    #[test]
    fn test_avg_score_uses_responses_per_brand() {
        let responses = vec![response("r1", "p"), response("r2", "p"), response("r3", "p"), response("r4", "p")];
        let analysis = vec![
            record("r1", "A", 8),
            record("r2", "A", 8),
            record("r3", "A", 8),
            record("r4", "A", 8),
            record("r1", "B", 0),
        ];

        let board = compute_leaderboard(&responses, &analysis);
        assert_close(board[0].total_score, 8.0);
        // 8 / (4 / 2)
        assert_close(board[0].avg_score, 4.0);
    }

    #[test]
    fn test_leaderboard_empty_without_responses() {
        assert!(compute_leaderboard(&[], &[]).is_empty());
    }

    #[test]
    fn test_leaderboard_without_mentions_has_zero_share() {
        let responses = vec![response("r1", "p")];
        let analysis = vec![record("r1", "Acme", 0), record("r1", "Foo", 0)];

        let board = compute_leaderboard(&responses, &analysis);
        assert_eq!(board.len(), 2);
        for item in &board {
            assert_eq!(item.total_score, 0.0);
            assert_eq!(item.share_of_voice, 0.0);
            assert!(!item.share_of_voice.is_nan());
        }
    }

    #[test]
    fn test_leaderboard_ties_keep_first_appearance_order() {
        let responses = vec![response("r1", "p")];
        let analysis = vec![
            record("r1", "Low", 1),
            record("r1", "TieA", 4),
            record("r1", "TieB", 4),
        ];

        let board = compute_leaderboard(&responses, &analysis);
        let order: Vec<&str> = board.iter().map(|i| i.brand.as_str()).collect();
        assert_eq!(order, vec!["TieA", "TieB", "Low"]);
    }

    #[test]
    fn test_share_of_voice_round_trip_from_analyzer() {
        let brands: Vec<String> = ["Acme", "Globex", "Initech"].iter().map(|s| s.to_string()).collect();
        let texts = [
            "Acme leads the market.\n\nGlobex follows.",
            "Initech, Initech, Initech!\n\nAcme too.",
            "Nobody relevant here.",
        ];

        let mut responses = Vec::new();
        let mut analysis = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let r = response(&format!("r{}", i), "p");
            for item in analyze_response(text, &brands, "Acme") {
                analysis.push(AnalysisRecord::from_item(&r.id, &item));
            }
            responses.push(r);
        }

        let board = compute_leaderboard(&responses, &analysis);
        let total: f64 = board.iter().map(|i| i.share_of_voice).sum();
        assert_close(total, 100.0);
        for item in &board {
            assert!(item.total_score <= NORMALIZED_MAX);
        }

        let silent = analyze_response("Nothing here", &brands, "Acme")
            .iter()
            .map(|item| AnalysisRecord::from_item("r0", item))
            .collect::<Vec<_>>();
        let board = compute_leaderboard(&[response("r0", "p")], &silent);
        let total: f64 = board.iter().map(|i| i.share_of_voice).sum();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_filter_analysis_by_responses() {
        let responses = vec![response("r1", "p")];
        let analysis = vec![record("r1", "Acme", 1), record("other", "Acme", 8)];
        let filtered = filter_analysis(&responses, &analysis);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].response_id, "r1");
    }

    #[test]
    fn test_prompt_breakdown() {
        let responses = vec![
            response("r1", "best crm"),
            response("r2", "cheap crm"),
            response("r3", "best crm"),
        ];
        let analysis = vec![
            record("r1", "Acme", 6),
            record("r1", "Foo", 1),
            record("r2", "Acme", 0),
            record("r2", "Foo", 3),
            record("r3", "Acme", 2),
            record("r3", "Foo", 0),
        ];

        let breakdown = compute_prompt_breakdown(&responses, &analysis);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].prompt, "best crm");
        assert_eq!(
            breakdown[0].brand_scores,
            vec![
                BrandScore { brand: "Acme".to_string(), score: 8 },
                BrandScore { brand: "Foo".to_string(), score: 1 },
            ]
        );
        assert_eq!(breakdown[1].prompt, "cheap crm");
        assert_eq!(breakdown[1].brand_scores[0].score, 0);
        assert_eq!(breakdown[1].brand_scores[1].score, 3);
    }

    #[test]
    fn test_prompt_breakdown_empty() {
        assert!(compute_prompt_breakdown(&[], &[]).is_empty());
    }

    #[test]
    fn test_trend_without_runs() {
        assert_eq!(compute_trend(&[], &[]), Trend::empty());
    }

    #[test]
    fn test_trend_requires_primary_on_latest_run() {
        let runs = vec![
            history("a", 0, &[("Acme", true)], vec![response("r1", "p")]),
            history("b", 1, &[("Acme", false)], vec![response("r2", "p")]),
        ];
        let trend = compute_trend(&runs, &[record("r1", "Acme", 8)]);
        assert!(trend.batches.is_empty());
        assert!(trend.series.is_empty());
        assert!(trend.primary_brand.is_none());
    }

    #[test]
    fn test_trend_single_run() {
        let runs = vec![history("a", 0, &[("Acme", true), ("Foo", false)], vec![response("r1", "p")])];
        let analysis = vec![record("r1", "Acme", 6), record("r1", "Foo", 2)];

        let trend = compute_trend(&runs, &analysis);

        assert_eq!(trend.primary_brand.as_deref(), Some("Acme"));
        assert_eq!(trend.series.len(), 1);
        assert_eq!(trend.series[0].brand, "Acme");
        let points = trend.points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].batch_id, "a");
        assert_close(points[0].share_of_voice, 75.0);
        assert_close(points[0].total_score, 6.0);
        assert_eq!(trend.batches.len(), 1);
    }

    #[test]
    fn test_trend_filters_runs_by_primary_name() {
        let runs = vec![
            // Acme present but not flagged primary: still included.
            history("a", 0, &[("Foo", true), ("Acme", false)], vec![response("r1", "p")]),
            // Acme absent: excluded.
            history("b", 1, &[("Foo", true)], vec![response("r2", "p")]),
            // No responses: skipped.
            history("c", 2, &[("Acme", true)], vec![]),
            history("d", 3, &[("Acme", true), ("Foo", false)], vec![response("r4", "p")]),
        ];
        let analysis = vec![
            record("r1", "Foo", 4),
            record("r2", "Foo", 8),
            record("r4", "Acme", 8),
            record("r4", "Foo", 0),
        ];

        let trend = compute_trend(&runs, &analysis);

        let ids: Vec<&str> = trend.batches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        let points = trend.points();
        assert_eq!(points.len(), 2);
        // Acme had no analysis rows in run "a"
        assert_eq!(points[0].share_of_voice, 0.0);
        assert_eq!(points[0].total_score, 0.0);
        assert_close(points[1].share_of_voice, 100.0);
        assert!(points[0].created_at < points[1].created_at);
    }
}
