use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single indexed source-code function with identifying metadata and full text.
///
/// Records are produced by the external extraction pipeline and loaded by the
/// corpus store. They are immutable once loaded: the index owns them for the
/// lifetime of a query session and consumers only read or clone them.
///
/// Field names match the extraction wire format (snake_case), so records
/// serialize back out unchanged in search responses.
///
/// # Examples
///
/// ```
/// use quarry_core::FunctionRecord;
///
/// let record = FunctionRecord {
///     function_name: "diameter".into(),
///     repo_name: "networkx".into(),
///     file_path: "networkx/algorithms/distance_measures.py".into(),
///     signature: String::new(),
///     docstring: String::new(),
///     code: "def diameter(G): ...".into(),
///     source: "networkx_v2".into(),
/// };
/// assert_eq!(record.function_name, "diameter");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Name of the function.
    pub function_name: String,
    /// Name of the repository it was extracted from.
    pub repo_name: String,
    /// Path of the source file within the repository.
    pub file_path: String,
    /// Function signature, when the extractor provides one (may be empty).
    #[serde(default)]
    pub signature: String,
    /// Docstring, when the extractor provides one (may be empty).
    #[serde(default)]
    pub docstring: String,
    /// Full source text of the function body.
    pub code: String,
    /// Source tag identifying the extraction run (repository id).
    #[serde(default)]
    pub source: String,
}

/// A search request against one or more repository corpora.
///
/// # Examples
///
/// ```
/// use quarry_core::QueryRequest;
///
/// let request = QueryRequest::new("graph diameter computation")
///     .with_limit(5)
///     .with_context("ARXIV PAPER CONTEXT: ...".into());
/// assert_eq!(request.limit, 5);
/// assert!(request.external_context.is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Natural-language query text.
    pub query: String,
    /// Optional external context block (e.g. a paper abstract) included in
    /// the semantic ranking prompt.
    pub external_context: Option<String>,
    /// Maximum number of results the semantic tier is asked for.
    pub limit: usize,
}

impl QueryRequest {
    /// Default result limit when none is specified.
    pub const DEFAULT_LIMIT: usize = 10;

    /// Create a request with the default limit and no external context.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            external_context: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Attach an external context block.
    pub fn with_context(mut self, context: String) -> Self {
        self.external_context = Some(context);
        self
    }
}

/// The ranking strategy that produced a result set.
///
/// A result set is always produced by exactly one tier per repository;
/// tiers are never blended within a single repository's results.
///
/// # Examples
///
/// ```
/// use quarry_core::Tier;
///
/// assert_eq!(Tier::Keyword.to_string(), "keyword");
/// assert_eq!(serde_json::to_string(&Tier::Semantic).unwrap(), "\"semantic\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Deterministic token-match scoring; always available.
    Keyword,
    /// LLM-backed relevance ranking.
    Semantic,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Keyword => write!(f, "keyword"),
            Tier::Semantic => write!(f, "semantic"),
        }
    }
}

/// A function record paired with its relevance score for a query.
///
/// Every scored result resolves to a record present in the queried index by
/// `(function_name, repo_name)`; entries a ranking tier returns that do not
/// resolve are discarded before they can appear here.
///
/// # Examples
///
/// ```
/// use quarry_core::{FunctionRecord, ScoredResult};
///
/// let result = ScoredResult {
///     record: FunctionRecord {
///         function_name: "shortest_path".into(),
///         repo_name: "networkx".into(),
///         file_path: "networkx/shortest_paths.py".into(),
///         signature: String::new(),
///         docstring: String::new(),
///         code: "def shortest_path(G, source, target): ...".into(),
///         source: String::new(),
///     },
///     relevance_score: 9.0,
///     explanation: Some("Directly computes shortest paths".into()),
///     experiment: "networkx_v2".into(),
/// };
/// assert!(result.relevance_score > 8.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    /// The matched function record.
    #[serde(flatten)]
    pub record: FunctionRecord,
    /// Numeric relevance score. Semantic tier: 0–10 as rated by the model.
    /// Keyword tier: count of distinct query tokens matched.
    pub relevance_score: f64,
    /// Free-text explanation of why this function is relevant (semantic tier only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Identifier of the experiment (repository corpus) this result came from.
    pub experiment: String,
}

/// The outcome of one per-repository search: which tier produced it and the
/// ranked results, ordered by descending score.
///
/// This is the explicit result type of the orchestrator's two-tier cascade;
/// tier selection is a state transition, not error interception.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResults {
    /// Tier that produced the result set.
    pub tier: Tier,
    /// Results ordered by descending relevance score.
    pub results: Vec<ScoredResult>,
}

impl RankedResults {
    /// An empty result set attributed to `tier`.
    pub fn empty(tier: Tier) -> Self {
        Self {
            tier,
            results: Vec::new(),
        }
    }

    /// Whether the result set contains no entries.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A structured research-direction proposal derived from ranked search results.
///
/// # Examples
///
/// ```
/// use quarry_core::Trajectory;
///
/// let json = r#"{
///     "title": "Streaming graph diameter estimation",
///     "core_question": "Can diameter be approximated incrementally?",
///     "rationale": "Avoids full recomputation on updates",
///     "existing_components": ["diameter", "eccentricity"],
///     "new_components": ["incremental_estimator"],
///     "challenges": ["bounding approximation error"],
///     "evaluation": "Compare against exact diameter on benchmark graphs"
/// }"#;
/// let t: Trajectory = serde_json::from_str(json).unwrap();
/// assert_eq!(t.existing_components.len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Title of the research direction.
    pub title: String,
    /// The specific research question to investigate.
    pub core_question: String,
    /// Why this direction is interesting and impactful.
    pub rationale: String,
    /// Names of available functions the trajectory would build on.
    #[serde(default)]
    pub existing_components: Vec<String>,
    /// Components that would need to be developed.
    #[serde(default)]
    pub new_components: Vec<String>,
    /// Anticipated challenges.
    #[serde(default)]
    pub challenges: Vec<String>,
    /// How success would be evaluated.
    #[serde(default)]
    pub evaluation: String,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use quarry_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
