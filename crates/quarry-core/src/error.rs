/// Errors that can occur across the Quarry platform.
///
/// Each variant wraps a specific failure domain. Library crates use this type
/// directly; the binary crate converts to `miette::Report` at the boundary.
///
/// The provider-related variants (`AuthMissing`, `Provider`, `ResponseParse`)
/// are caught at the semantic tier boundary and downgrade the search to the
/// keyword tier; they never reach the caller of a search.
///
/// # Examples
///
/// ```
/// use quarry_core::QuarryError;
///
/// let err = QuarryError::CorpusUnavailable("sympy_01".into());
/// assert!(err.to_string().contains("sympy_01"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No extracted corpus exists for the requested experiment.
    #[error("no extracted corpus for experiment '{0}'")]
    CorpusUnavailable(String),

    /// No API key could be resolved for the configured provider.
    #[error("no API key configured for provider '{0}'")]
    AuthMissing(String),

    /// Provider transport failure or non-success HTTP status.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// Provider returned a malformed or schema-violating response body.
    #[error("response parse error: {0}")]
    ResponseParse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl QuarryError {
    /// Whether this error belongs to the semantic tier's failure set, i.e.
    /// the set of errors that trigger a silent downgrade to keyword search.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_core::QuarryError;
    ///
    /// assert!(QuarryError::Provider("HTTP 500".into()).is_tier_failure());
    /// assert!(!QuarryError::CorpusUnavailable("x".into()).is_tier_failure());
    /// ```
    pub fn is_tier_failure(&self) -> bool {
        matches!(
            self,
            QuarryError::AuthMissing(_)
                | QuarryError::Provider(_)
                | QuarryError::ResponseParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: QuarryError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn corpus_unavailable_names_experiment() {
        let err = QuarryError::CorpusUnavailable("numpy_v1".into());
        assert_eq!(
            err.to_string(),
            "no extracted corpus for experiment 'numpy_v1'"
        );
    }

    #[test]
    fn tier_failures_cover_provider_taxonomy() {
        assert!(QuarryError::AuthMissing("openrouter".into()).is_tier_failure());
        assert!(QuarryError::ResponseParse("not json".into()).is_tier_failure());
        assert!(!QuarryError::Config("bad".into()).is_tier_failure());
        assert!(!QuarryError::Io(std::io::Error::other("x")).is_tier_failure());
    }
}
