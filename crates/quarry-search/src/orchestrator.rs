use tracing::warn;

use quarry_core::{QuarryConfig, QuarryError, QueryRequest, RankedResults, Tier};
use quarry_index::{CorpusStore, FunctionIndex};

use crate::keyword::keyword_search;
use crate::llm::LlmClient;
use crate::semantic::semantic_search;

/// Per-repository query orchestrator: a strict two-tier cascade.
///
/// Loading the index is the only fallible step (`CorpusUnavailable` is
/// terminal). From there, a search always produces a result set: if no
/// provider credential is configured the keyword tier runs directly, and
/// any semantic-tier failure downgrades to the keyword tier with a log note
/// rather than an error. The semantic tier is never re-attempted within one
/// search, and tier selection is an explicit match on the tier's `Result`,
/// not error interception.
///
/// # Examples
///
/// ```no_run
/// use quarry_core::{QuarryConfig, QueryRequest};
/// use quarry_index::CorpusStore;
/// use quarry_search::orchestrator::SearchEngine;
///
/// # async fn example() {
/// let config = QuarryConfig::default();
/// let store = CorpusStore::new(&config.corpus.data_dir);
/// let engine = SearchEngine::load(&store, "sympy_v1", &config).unwrap();
/// let ranked = engine.search(&QueryRequest::new("matrix inverse")).await;
/// println!("{} results via {} tier", ranked.results.len(), ranked.tier);
/// # }
/// ```
pub struct SearchEngine {
    experiment: String,
    index: FunctionIndex,
    client: Option<LlmClient>,
    functions_per_repo: usize,
}

impl SearchEngine {
    /// Load the corpus for `experiment` and construct this engine's own
    /// provider client from configuration and environment.
    ///
    /// Each engine owns its client; nothing is shared across engines, which
    /// is what makes concurrent fan-out safe without synchronization.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::CorpusUnavailable`] when no corpus exists for
    /// the identifier, or [`QuarryError::Provider`] if the HTTP client
    /// cannot be constructed.
    pub fn load(
        store: &CorpusStore,
        experiment: &str,
        config: &QuarryConfig,
    ) -> Result<Self, QuarryError> {
        let index = store.load(experiment)?;
        let client = LlmClient::from_config(&config.llm)?;
        Ok(Self {
            experiment: experiment.to_string(),
            index,
            client,
            functions_per_repo: config.search.functions_per_repo,
        })
    }

    /// Construct an engine from already-loaded parts. `client: None` forces
    /// the keyword tier.
    pub fn from_parts(
        experiment: impl Into<String>,
        index: FunctionIndex,
        client: Option<LlmClient>,
        functions_per_repo: usize,
    ) -> Self {
        Self {
            experiment: experiment.into(),
            index,
            client,
            functions_per_repo,
        }
    }

    /// The loaded index.
    pub fn index(&self) -> &FunctionIndex {
        &self.index
    }

    /// The experiment identifier this engine serves.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Whether the semantic tier is available (a credential was resolved).
    pub fn semantic_available(&self) -> bool {
        self.client.is_some()
    }

    /// Run the two-tier cascade for one request.
    ///
    /// Exactly one tier produces the result set; tiers are never blended.
    pub async fn search(&self, request: &QueryRequest) -> RankedResults {
        let Some(client) = &self.client else {
            return self.keyword_tier(request);
        };

        match semantic_search(
            client,
            request,
            &self.index,
            &self.experiment,
            self.functions_per_repo,
        )
        .await
        {
            Ok(results) => RankedResults {
                tier: Tier::Semantic,
                results,
            },
            Err(err) => {
                warn!(
                    experiment = %self.experiment,
                    error = %err,
                    "semantic tier failed, falling back to keyword search"
                );
                self.keyword_tier(request)
            }
        }
    }

    fn keyword_tier(&self, request: &QueryRequest) -> RankedResults {
        RankedResults {
            tier: Tier::Keyword,
            results: keyword_search(&request.query, &self.index, &self.experiment),
        }
    }

    /// The provider client, for downstream consumers (trajectory synthesis)
    /// that share this engine's call path.
    pub fn client(&self) -> Option<&LlmClient> {
        self.client.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::FunctionRecord;

    fn index() -> FunctionIndex {
        FunctionIndex::new(vec![
            FunctionRecord {
                function_name: "diameter".into(),
                repo_name: "networkx".into(),
                file_path: "distance.py".into(),
                signature: String::new(),
                docstring: String::new(),
                code: "def diameter(G):\n    # graph algorithm over all nodes".into(),
                source: String::new(),
            },
            FunctionRecord {
                function_name: "helper".into(),
                repo_name: "networkx".into(),
                file_path: "misc.py".into(),
                signature: String::new(),
                docstring: String::new(),
                code: "def helper():\n    return 1".into(),
                source: String::new(),
            },
        ])
    }

    #[tokio::test]
    async fn no_credential_uses_keyword_tier() {
        let engine = SearchEngine::from_parts("exp", index(), None, 50);
        let ranked = engine.search(&QueryRequest::new("graph algorithm")).await;

        assert_eq!(ranked.tier, Tier::Keyword);
        assert_eq!(ranked.results.len(), 1);
        assert_eq!(ranked.results[0].record.function_name, "diameter");
        assert_eq!(ranked.results[0].relevance_score, 2.0);
    }

    #[tokio::test]
    async fn keyword_tier_is_deterministic() {
        let engine = SearchEngine::from_parts("exp", index(), None, 50);
        let first = engine.search(&QueryRequest::new("graph")).await;
        let second = engine.search(&QueryRequest::new("graph")).await;

        let names = |r: &quarry_core::RankedResults| {
            r.results
                .iter()
                .map(|s| s.record.function_name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[tokio::test]
    async fn unmatched_query_yields_empty_keyword_set() {
        let engine = SearchEngine::from_parts("exp", index(), None, 50);
        let ranked = engine.search(&QueryRequest::new("quantum chromodynamics")).await;
        assert_eq!(ranked.tier, Tier::Keyword);
        assert!(ranked.is_empty());
    }

    #[test]
    fn semantic_availability_reflects_client() {
        let engine = SearchEngine::from_parts("exp", index(), None, 50);
        assert!(!engine.semantic_available());
        assert!(engine.client().is_none());
    }
}
