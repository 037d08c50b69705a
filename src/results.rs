//! Read-side queries: the latest run's results and the cross-run trend.

use crate::analysis::{
    compute_leaderboard, compute_prompt_breakdown, compute_trend, filter_analysis, RunHistory,
};
use crate::models::{Results, RunInfo, Trend};
use crate::store::Store;
use anyhow::{Context, Result};
use tracing::debug;

/// Results for the most recent run.
///
/// Before any run exists, responses recorded without a run are used instead
/// and `run_info` is left unset.
pub fn get_results(store: &Store) -> Result<Results> {
    let latest = store.latest_run().context("Failed to load latest run")?;

    let (responses, run_info) = match latest {
        Some(run) => {
            let responses = store.responses_for_run(&run.id)?;
            let primary_brand = store
                .brands_for_run(&run.id)?
                .into_iter()
                .find(|b| b.is_primary)
                .map(|b| b.brand);
            let prompts = store
                .prompts_for_run(&run.id)?
                .into_iter()
                .map(|p| p.prompt_text)
                .collect();

            let info = RunInfo {
                run_id: run.id,
                created_at: run.created_at,
                runs_per_prompt: run.runs_per_prompt,
                primary_brand,
                prompts,
            };
            (responses, Some(info))
        }
        None => {
            debug!("No runs stored, falling back to legacy responses");
            (store.legacy_responses()?, None)
        }
    };

    let analysis = filter_analysis(&responses, &store.all_analysis()?);
    debug!(
        "Aggregating {} responses with {} analysis rows",
        responses.len(),
        analysis.len()
    );

    Ok(Results {
        leaderboard: compute_leaderboard(&responses, &analysis),
        prompt_breakdown: compute_prompt_breakdown(&responses, &analysis),
        raw_responses: responses,
        run_info,
    })
}

/// Share-of-voice trend of the latest run's primary brand.
pub fn get_trend(store: &Store) -> Result<Trend> {
    let runs = store.all_runs().context("Failed to load runs")?;

    let mut histories = Vec::with_capacity(runs.len());
    for run in runs {
        let brands = store.brands_for_run(&run.id)?;
        let responses = store.responses_for_run(&run.id)?;
        histories.push(RunHistory {
            run,
            brands,
            responses,
        });
    }

    let analysis = store.all_analysis()?;
    Ok(compute_trend(&histories, &analysis))
}
