use tracing::debug;

use quarry_core::{QuarryError, QueryRequest, ScoredResult};
use quarry_index::FunctionIndex;

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::prompt::{self, RankedEntry};

/// Sampling temperature for ranking requests: low, for consistent scoring.
const RANKING_TEMPERATURE: f32 = 0.2;

/// Run the semantic ranking tier for one repository corpus.
///
/// Builds a single prompt over the index's function summaries, requests a
/// JSON-constrained ranking from the provider, resolves each returned entry
/// against the index, and returns the resolved results sorted by descending
/// score. Entries naming a `(function_name, repo_name)` pair that is not in
/// the index are dropped; they are never fabricated into output.
///
/// The tier fails as a unit (no partial merge) on transport errors,
/// non-success status, malformed JSON, or an absent/empty results array.
/// The caller downgrades any failure to the keyword tier; there is no retry
/// here beyond the client's in-tier model fallback.
///
/// # Errors
///
/// Returns [`QuarryError::Provider`] or [`QuarryError::ResponseParse`] on
/// any of the failure conditions above.
pub async fn semantic_search(
    client: &LlmClient,
    request: &QueryRequest,
    index: &FunctionIndex,
    experiment: &str,
    functions_per_repo: usize,
) -> Result<Vec<ScoredResult>, QuarryError> {
    let user_prompt = prompt::build_search_prompt(request, index, functions_per_repo);
    let messages = [
        ChatMessage::system(prompt::build_search_system_prompt()),
        ChatMessage::user(user_prompt),
    ];

    let content = client
        .complete(
            &messages,
            CompletionOptions {
                temperature: RANKING_TEMPERATURE,
                json_response: true,
            },
        )
        .await?;

    let entries = prompt::parse_search_response(&content)?;
    Ok(resolve_entries(entries, index, experiment))
}

/// Resolve model-returned entries against the index, dropping any that do
/// not correspond to a real record, and sort by descending score.
///
/// Ties keep the model's response order (stable sort).
fn resolve_entries(
    entries: Vec<RankedEntry>,
    index: &FunctionIndex,
    experiment: &str,
) -> Vec<ScoredResult> {
    let mut results: Vec<ScoredResult> = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(record) = index.resolve(&entry.function_name, &entry.repo_name) else {
            debug!(
                function = %entry.function_name,
                repo = %entry.repo_name,
                "dropping ranked entry not present in index"
            );
            continue;
        };
        results.push(ScoredResult {
            record: record.clone(),
            relevance_score: entry.relevance_score,
            explanation: entry.explanation,
            experiment: experiment.to_string(),
        });
    }

    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::FunctionRecord;

    fn record(name: &str, repo: &str) -> FunctionRecord {
        FunctionRecord {
            function_name: name.into(),
            repo_name: repo.into(),
            file_path: "mod.py".into(),
            signature: String::new(),
            docstring: String::new(),
            code: "pass".into(),
            source: String::new(),
        }
    }

    fn entry(name: &str, repo: &str, score: f64) -> RankedEntry {
        serde_json::from_value(serde_json::json!({
            "function_name": name,
            "repo_name": repo,
            "relevance_score": score,
            "explanation": "because"
        }))
        .unwrap()
    }

    #[test]
    fn unresolvable_entries_are_dropped() {
        let index = FunctionIndex::new(vec![record("real", "repo")]);
        let entries = vec![
            entry("real", "repo", 8.0),
            entry("hallucinated", "repo", 9.5),
            entry("real", "wrong_repo", 9.0),
        ];

        let results = resolve_entries(entries, &index, "exp");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.function_name, "real");
    }

    #[test]
    fn resolved_results_sorted_descending() {
        let index = FunctionIndex::new(vec![
            record("low", "repo"),
            record("high", "repo"),
            record("mid", "repo"),
        ]);
        let entries = vec![
            entry("low", "repo", 2.0),
            entry("high", "repo", 9.0),
            entry("mid", "repo", 5.0),
        ];

        let results = resolve_entries(entries, &index, "exp");
        let scores: Vec<f64> = results.iter().map(|r| r.relevance_score).collect();
        assert_eq!(scores, vec![9.0, 5.0, 2.0]);
    }

    #[test]
    fn resolution_carries_record_and_explanation() {
        let index = FunctionIndex::new(vec![record("f", "repo")]);
        let results = resolve_entries(vec![entry("f", "repo", 7.0)], &index, "sympy_v1");

        assert_eq!(results[0].experiment, "sympy_v1");
        assert_eq!(results[0].explanation.as_deref(), Some("because"));
        assert_eq!(results[0].record.code, "pass");
    }

    #[test]
    fn all_entries_dropped_yields_empty_ok() {
        let index = FunctionIndex::new(vec![record("f", "repo")]);
        let results = resolve_entries(vec![entry("ghost", "repo", 9.0)], &index, "exp");
        assert!(results.is_empty());
    }
}
