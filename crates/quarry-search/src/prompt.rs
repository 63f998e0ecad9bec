use serde::Deserialize;

use quarry_core::{QuarryError, QueryRequest};
use quarry_index::FunctionIndex;

const SEARCH_SYSTEM_PROMPT: &str = "\
You are a code analysis assistant that helps find relevant functions in \
repositories. You MUST return valid JSON.";

/// Maximum docstring length included per function summary.
const DOCSTRING_PREVIEW: usize = 200;

/// System prompt for the semantic ranking request.
pub fn build_search_system_prompt() -> String {
    SEARCH_SYSTEM_PROMPT.to_string()
}

/// Build the user prompt for ranking one repository batch.
///
/// Contains the query, the optional external context block, and up to
/// `functions_per_repo` function summaries for each repository in the index,
/// bounding request size. The model is constrained to respond with a JSON
/// object holding a `results` array.
///
/// # Examples
///
/// ```
/// use quarry_core::{FunctionRecord, QueryRequest};
/// use quarry_index::FunctionIndex;
/// use quarry_search::prompt::build_search_prompt;
///
/// let index = FunctionIndex::new(vec![FunctionRecord {
///     function_name: "diameter".into(),
///     repo_name: "networkx".into(),
///     file_path: "distance.py".into(),
///     signature: "def diameter(G)".into(),
///     docstring: String::new(),
///     code: String::new(),
///     source: String::new(),
/// }]);
/// let request = QueryRequest::new("graph diameter");
/// let prompt = build_search_prompt(&request, &index, 50);
/// assert!(prompt.contains("QUERY: graph diameter"));
/// assert!(prompt.contains("=== Repository: networkx ==="));
/// ```
pub fn build_search_prompt(
    request: &QueryRequest,
    index: &FunctionIndex,
    functions_per_repo: usize,
) -> String {
    use std::fmt::Write;

    let mut prompt = format!(
        "I will provide you with a list of functions extracted from various \
         repositories. Your task is to find the most relevant ones for the \
         following query:\n\nQUERY: {}\n\nFirst, analyze what the query is \
         asking for, then identify the most relevant functions based on their \
         name, signature, and description.\n",
        request.query
    );

    if let Some(context) = &request.external_context {
        let _ = write!(prompt, "\n{context}\n");
    }

    prompt.push_str("\nREPOSITORIES:\n");

    for repo in index.repos() {
        let _ = write!(prompt, "\n=== Repository: {repo} ===\n");
        for func in index.functions_for_repo(repo).take(functions_per_repo) {
            let _ = write!(prompt, "\nFunction: {}\n", func.function_name);
            let _ = write!(prompt, "Signature: {}\n", func.signature);
            if !func.docstring.is_empty() {
                let _ = write!(prompt, "Description: {}\n", truncate(&func.docstring));
            }
        }
    }

    let _ = write!(
        prompt,
        "\nBased on the information provided, identify the {limit} most \
         relevant functions for the query. Only include functions that are \
         genuinely relevant.\n\n\
         CRITICAL: You MUST respond with valid JSON only. Your response must \
         be a JSON object with a 'results' array containing objects with the \
         fields: function_name, repo_name, relevance_score (0-10), and \
         explanation.\n\n\
         Example response format:\n\
         {{\n  \"results\": [\n    {{\n      \"function_name\": \"example_function\",\n      \
         \"repo_name\": \"example_repo\",\n      \"relevance_score\": 9,\n      \
         \"explanation\": \"This function is relevant because...\"\n    }}\n  ]\n}}\n",
        limit = request.limit
    );

    prompt
}

fn truncate(docstring: &str) -> String {
    if docstring.len() > DOCSTRING_PREVIEW {
        let cut = docstring
            .char_indices()
            .take_while(|(i, _)| *i <= DOCSTRING_PREVIEW)
            .last()
            .map_or(0, |(i, _)| i);
        format!("{}...", &docstring[..cut])
    } else {
        docstring.to_string()
    }
}

/// A single entry from the model's ranking response, prior to index
/// resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct RankedEntry {
    /// Function name as stated by the model.
    pub function_name: String,
    /// Repository name as stated by the model.
    pub repo_name: String,
    /// Relevance score, clamped to 0–10 during parsing.
    #[serde(default)]
    pub relevance_score: f64,
    /// Why the model considers the function relevant.
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<RankedEntry>,
}

/// Parse the ranking response content into entries.
///
/// Handles markdown code fences around the JSON. An absent or empty
/// `results` array is a tier failure, not an empty success: the caller
/// downgrades to the keyword tier.
///
/// # Errors
///
/// Returns [`QuarryError::ResponseParse`] on malformed JSON, a missing
/// `results` field, or an empty results array.
///
/// # Examples
///
/// ```
/// use quarry_search::prompt::parse_search_response;
///
/// let json = r#"{"results":[{"function_name":"f","repo_name":"r","relevance_score":8}]}"#;
/// let entries = parse_search_response(json).unwrap();
/// assert_eq!(entries[0].relevance_score, 8.0);
///
/// assert!(parse_search_response(r#"{"results":[]}"#).is_err());
/// ```
pub fn parse_search_response(content: &str) -> Result<Vec<RankedEntry>, QuarryError> {
    let cleaned = strip_code_fences(content);
    let parsed: SearchResponse = serde_json::from_str(cleaned)
        .map_err(|e| QuarryError::ResponseParse(format!("invalid results payload: {e}")))?;

    if parsed.results.is_empty() {
        return Err(QuarryError::ResponseParse(
            "results array is empty".to_string(),
        ));
    }

    Ok(parsed
        .results
        .into_iter()
        .map(|mut entry| {
            entry.relevance_score = entry.relevance_score.clamp(0.0, 10.0);
            entry
        })
        .collect())
}

/// Strip a surrounding markdown code fence, if present.
///
/// Models sometimes wrap JSON responses in ```` ```json ```` fences even
/// when asked for a bare object.
pub fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::FunctionRecord;

    fn record(name: &str, repo: &str, docstring: &str) -> FunctionRecord {
        FunctionRecord {
            function_name: name.into(),
            repo_name: repo.into(),
            file_path: "mod.py".into(),
            signature: format!("def {name}(...)"),
            docstring: docstring.into(),
            code: "pass".into(),
            source: String::new(),
        }
    }

    #[test]
    fn prompt_groups_by_repository() {
        let index = FunctionIndex::new(vec![
            record("a", "repo_one", ""),
            record("b", "repo_two", ""),
            record("c", "repo_one", ""),
        ]);
        let request = QueryRequest::new("query text");
        let prompt = build_search_prompt(&request, &index, 50);

        assert!(prompt.contains("=== Repository: repo_one ==="));
        assert!(prompt.contains("=== Repository: repo_two ==="));
        let one_pos = prompt.find("repo_one").unwrap();
        let two_pos = prompt.find("repo_two").unwrap();
        assert!(one_pos < two_pos);
    }

    #[test]
    fn prompt_caps_functions_per_repo() {
        let records: Vec<FunctionRecord> = (0..10)
            .map(|i| record(&format!("func_{i}"), "repo", ""))
            .collect();
        let index = FunctionIndex::new(records);
        let request = QueryRequest::new("q");
        let prompt = build_search_prompt(&request, &index, 3);

        assert!(prompt.contains("func_2"));
        assert!(!prompt.contains("func_3"));
    }

    #[test]
    fn prompt_includes_external_context() {
        let index = FunctionIndex::new(vec![record("f", "r", "")]);
        let request =
            QueryRequest::new("q").with_context("ARXIV PAPER CONTEXT:\nAbstract: ...".into());
        let prompt = build_search_prompt(&request, &index, 50);
        assert!(prompt.contains("ARXIV PAPER CONTEXT"));
    }

    #[test]
    fn prompt_truncates_long_docstrings() {
        let long = "x".repeat(500);
        let index = FunctionIndex::new(vec![record("f", "r", &long)]);
        let request = QueryRequest::new("q");
        let prompt = build_search_prompt(&request, &index, 50);
        assert!(!prompt.contains(&long));
        assert!(prompt.contains("..."));
    }

    #[test]
    fn prompt_states_limit() {
        let index = FunctionIndex::new(vec![record("f", "r", "")]);
        let request = QueryRequest::new("q").with_limit(7);
        let prompt = build_search_prompt(&request, &index, 50);
        assert!(prompt.contains("identify the 7 most"));
    }

    #[test]
    fn parse_valid_response() {
        let json = r#"{
            "results": [
                {"function_name": "a", "repo_name": "r1", "relevance_score": 9, "explanation": "direct match"},
                {"function_name": "b", "repo_name": "r2", "relevance_score": 4}
            ]
        }"#;
        let entries = parse_search_response(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].explanation.as_deref(), Some("direct match"));
        assert!(entries[1].explanation.is_none());
    }

    #[test]
    fn parse_with_code_fences() {
        let fenced = "```json\n{\"results\":[{\"function_name\":\"f\",\"repo_name\":\"r\"}]}\n```";
        let entries = parse_search_response(fenced).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn parse_clamps_scores() {
        let json = r#"{"results":[
            {"function_name":"a","repo_name":"r","relevance_score":42},
            {"function_name":"b","repo_name":"r","relevance_score":-3}
        ]}"#;
        let entries = parse_search_response(json).unwrap();
        assert_eq!(entries[0].relevance_score, 10.0);
        assert_eq!(entries[1].relevance_score, 0.0);
    }

    #[test]
    fn parse_rejects_malformed_body() {
        assert!(parse_search_response("not json at all").is_err());
        assert!(parse_search_response(r#"{"other": []}"#).is_err());
    }

    #[test]
    fn parse_rejects_empty_results() {
        let err = parse_search_response(r#"{"results":[]}"#).unwrap_err();
        assert!(matches!(err, QuarryError::ResponseParse(_)));
    }

    #[test]
    fn strip_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }
}
