use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use quarry_core::{QuarryConfig, QueryRequest, ScoredResult};
use quarry_index::CorpusStore;

use crate::orchestrator::SearchEngine;

/// Run the query orchestrator concurrently across many repository corpora
/// and merge the results into one globally ranked sequence.
///
/// One task is spawned per experiment; concurrency is bounded by a
/// semaphore sized `min(available_parallelism, N)`. Each worker loads its
/// own index and constructs its own provider client from configuration and
/// environment; no client or connection state crosses workers, so no
/// synchronization is needed.
///
/// Isolation contract: a worker that fails (corpus unavailable, panic, or
/// an exceeded per-worker deadline when `worker_timeout_secs` is set)
/// contributes an empty result set and never aborts or blocks its siblings.
/// The coordinator waits for every worker, concatenates the non-empty sets,
/// and performs one global sort by descending score. The relative order of
/// equal scores across repositories is unspecified, since worker completion
/// order is non-deterministic.
pub async fn search_many(
    store: &CorpusStore,
    experiments: &[String],
    request: &QueryRequest,
    config: &QuarryConfig,
) -> Vec<ScoredResult> {
    if experiments.is_empty() {
        return Vec::new();
    }

    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let permits = parallelism.min(experiments.len());
    let semaphore = Arc::new(Semaphore::new(permits));

    let mut workers = JoinSet::new();
    for experiment in experiments {
        let store = store.clone();
        let experiment = experiment.clone();
        let request = request.clone();
        let config = config.clone();
        let semaphore = Arc::clone(&semaphore);

        workers.spawn(async move {
            // A closed semaphore is impossible here; treat it as an empty
            // worker rather than panicking.
            let Ok(_permit) = semaphore.acquire().await else {
                return Vec::new();
            };
            let deadline = config.search.worker_timeout_secs;
            let search = search_one(&store, &experiment, &request, &config);
            match deadline {
                Some(secs) => {
                    match tokio::time::timeout(Duration::from_secs(secs), search).await {
                        Ok(results) => results,
                        Err(_) => {
                            warn!(
                                experiment = %experiment,
                                timeout_secs = secs,
                                "search worker exceeded deadline, contributing no results"
                            );
                            Vec::new()
                        }
                    }
                }
                None => search.await,
            }
        });
    }

    let mut merged: Vec<ScoredResult> = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(results) => merged.extend(results),
            Err(err) => warn!(error = %err, "search worker panicked"),
        }
    }

    merged.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged
}

/// One worker: load, search, tag. Failures become an empty result set.
async fn search_one(
    store: &CorpusStore,
    experiment: &str,
    request: &QueryRequest,
    config: &QuarryConfig,
) -> Vec<ScoredResult> {
    let engine = match SearchEngine::load(store, experiment, config) {
        Ok(engine) => engine,
        Err(err) => {
            warn!(
                experiment = %experiment,
                error = %err,
                "skipping repository: corpus could not be loaded"
            );
            return Vec::new();
        }
    };
    engine.search(request).await.results
}
