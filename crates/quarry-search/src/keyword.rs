use std::collections::HashSet;

use quarry_core::ScoredResult;
use quarry_index::FunctionIndex;

/// Deterministic fallback ranking: score each function by how many distinct
/// query tokens occur in it.
///
/// The query is lowercased and split on whitespace; a function's score is
/// the number of distinct tokens found as substrings anywhere in the
/// lowercased concatenation of its name and code body. Each token counts at
/// most once no matter how often it repeats. Zero-score functions are
/// excluded, and ties keep the index's extraction order (stable sort).
///
/// Matching is substring containment, not word-boundary: short tokens can
/// match inside longer identifiers (`"sort"` matches `quicksort`). The
/// overmatching is intentional.
///
/// # Examples
///
/// ```
/// use quarry_core::FunctionRecord;
/// use quarry_index::FunctionIndex;
/// use quarry_search::keyword::keyword_search;
///
/// let index = FunctionIndex::new(vec![FunctionRecord {
///     function_name: "diameter".into(),
///     repo_name: "networkx".into(),
///     file_path: "distance.py".into(),
///     signature: String::new(),
///     docstring: String::new(),
///     code: "def diameter(G):\n    # graph algorithm\n    ...".into(),
///     source: String::new(),
/// }]);
///
/// let results = keyword_search("graph algorithm", &index, "nx_v1");
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].relevance_score, 2.0);
/// ```
pub fn keyword_search(query: &str, index: &FunctionIndex, experiment: &str) -> Vec<ScoredResult> {
    let lowered = query.to_lowercase();
    let tokens: HashSet<&str> = lowered.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(u32, &quarry_core::FunctionRecord)> = Vec::new();
    for record in index.records() {
        let text = format!("{} {}", record.function_name, record.code).to_lowercase();
        let score = tokens.iter().filter(|t| text.contains(**t)).count() as u32;
        if score > 0 {
            scored.push((score, record));
        }
    }

    // Stable: equal scores keep extraction order.
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));

    scored
        .into_iter()
        .map(|(score, record)| ScoredResult {
            record: record.clone(),
            relevance_score: f64::from(score),
            explanation: None,
            experiment: experiment.to_string(),
        })
        .collect()
}
