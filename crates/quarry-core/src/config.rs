use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::QuarryError;

/// Top-level configuration loaded from `.quarry.toml`.
///
/// Every field has a default, so an empty or absent file yields a working
/// configuration. Credentials additionally resolve from environment
/// variables (see [`LlmConfig::resolve_api_key`]).
///
/// # Examples
///
/// ```
/// use quarry_core::QuarryConfig;
///
/// let config = QuarryConfig::default();
/// assert_eq!(config.search.limit, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// LLM provider settings for the semantic tier and trajectory synthesis.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Location of the extracted corpus data.
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Search behavior settings.
    #[serde(default)]
    pub search: SearchConfig,
}

impl QuarryConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Io`] if the file cannot be read, or
    /// [`QuarryError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quarry_core::QuarryConfig;
    /// use std::path::Path;
    ///
    /// let config = QuarryConfig::from_file(Path::new(".quarry.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, QuarryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_core::QuarryConfig;
    ///
    /// let toml = r#"
    /// [search]
    /// limit = 25
    /// "#;
    /// let config = QuarryConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.search.limit, 25);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, QuarryError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use quarry_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.model, "gpt-4-turbo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: `"openai"` or `"openrouter"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Primary model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Secondary model retried once when the primary errors.
    /// Only honored by the OpenRouter gateway backend.
    pub fallback_model: Option<String>,
    /// API key; when absent, resolved from environment variables.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4-turbo".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            fallback_model: None,
            api_key: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    /// Environment variables checked for this provider, in order.
    ///
    /// OpenRouter accepts `OPENROUTER_API_KEY` with `OPENAI_API_KEY` as a
    /// secondary candidate; every other provider uses `OPENAI_API_KEY`.
    pub fn credential_env_vars(&self) -> &'static [&'static str] {
        match self.provider.as_str() {
            "openrouter" => &["OPENROUTER_API_KEY", "OPENAI_API_KEY"],
            _ => &["OPENAI_API_KEY"],
        }
    }

    /// Resolve the API key: explicit config value first, then the named
    /// environment variables for the provider kind.
    ///
    /// Returns `None` when no candidate is set, which disables the semantic
    /// tier without error.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        self.credential_env_vars()
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
    }
}

/// Location of the extracted corpus data.
///
/// The data directory holds one `{experiment_id}_extracted.json` file per
/// repository corpus, produced by the external extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory containing `*_extracted.json` corpus files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("corpus")
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Search behavior configuration.
///
/// # Examples
///
/// ```
/// use quarry_core::SearchConfig;
///
/// let config = SearchConfig::default();
/// assert_eq!(config.functions_per_repo, 50);
/// assert!(config.worker_timeout_secs.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results the semantic tier is asked for (default: 10).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Maximum function summaries per repository in the ranking prompt,
    /// bounding request size (default: 50).
    #[serde(default = "default_functions_per_repo")]
    pub functions_per_repo: usize,
    /// Number of trajectories to request from the synthesizer (default: 3).
    #[serde(default = "default_trajectories")]
    pub trajectories: usize,
    /// Optional per-worker deadline for fan-out searches, in seconds.
    /// A worker exceeding it contributes an empty result set; unset means
    /// the batch waits indefinitely for every worker.
    pub worker_timeout_secs: Option<u64>,
}

fn default_limit() -> usize {
    10
}

fn default_functions_per_repo() -> usize {
    50
}

fn default_trajectories() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            functions_per_repo: default_functions_per_repo(),
            trajectories: default_trajectories(),
            worker_timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = QuarryConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4-turbo");
        assert!(config.llm.fallback_model.is_none());
        assert_eq!(config.corpus.data_dir, PathBuf::from("corpus"));
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.search.functions_per_repo, 50);
        assert_eq!(config.search.trajectories, 3);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[search]
limit = 20
"#;
        let config = QuarryConfig::from_toml(toml).unwrap();
        assert_eq!(config.search.limit, 20);
        assert_eq!(config.search.functions_per_repo, 50);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "openrouter"
model = "google/gemini-pro"
fallback_model = "openai/gpt-3.5-turbo"
base_url = "https://openrouter.ai/api/v1"

[corpus]
data_dir = "/data/extracted"

[search]
limit = 15
functions_per_repo = 30
worker_timeout_secs = 120
"#;
        let config = QuarryConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "openrouter");
        assert_eq!(
            config.llm.fallback_model.as_deref(),
            Some("openai/gpt-3.5-turbo")
        );
        assert_eq!(config.corpus.data_dir, PathBuf::from("/data/extracted"));
        assert_eq!(config.search.worker_timeout_secs, Some(120));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = QuarryConfig::from_toml("").unwrap();
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.llm.model, "gpt-4-turbo");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = QuarryConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn credential_env_vars_per_provider() {
        let openrouter = LlmConfig {
            provider: "openrouter".into(),
            ..LlmConfig::default()
        };
        assert_eq!(
            openrouter.credential_env_vars(),
            &["OPENROUTER_API_KEY", "OPENAI_API_KEY"]
        );
        assert_eq!(
            LlmConfig::default().credential_env_vars(),
            &["OPENAI_API_KEY"]
        );
    }

    #[test]
    fn explicit_api_key_wins() {
        let config = LlmConfig {
            api_key: Some("sk-explicit".into()),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn empty_api_key_treated_as_absent() {
        let config = LlmConfig {
            provider: "nonexistent-provider-for-test".into(),
            api_key: Some(String::new()),
            ..LlmConfig::default()
        };
        // Falls through to env lookup; may still resolve if the variable is
        // set in the test environment, but the empty string never does.
        assert_ne!(config.resolve_api_key().as_deref(), Some(""));
    }
}
