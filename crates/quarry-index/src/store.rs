use std::path::{Path, PathBuf};

use serde::Deserialize;

use quarry_core::{FunctionRecord, QuarryError};

/// Handle to a directory of extracted corpus files.
///
/// The extraction pipeline writes one `{experiment_id}_extracted.json` file
/// per repository. The store discovers and loads them; it never writes.
///
/// # Examples
///
/// ```
/// use quarry_index::CorpusStore;
///
/// let store = CorpusStore::new("/data/extracted");
/// assert!(store.corpus_path("sympy_v1").ends_with("sympy_v1_extracted.json"));
/// ```
#[derive(Debug, Clone)]
pub struct CorpusStore {
    data_dir: PathBuf,
}

impl CorpusStore {
    /// Create a store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The directory this store reads from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the corpus file for `experiment`.
    pub fn corpus_path(&self, experiment: &str) -> PathBuf {
        self.data_dir.join(format!("{experiment}_extracted.json"))
    }

    /// Discover all experiment identifiers with a corpus file present,
    /// sorted alphabetically.
    ///
    /// An unreadable or missing data directory yields an empty list.
    pub fn experiments(&self) -> Vec<String> {
        let pattern = self.data_dir.join("*_extracted.json");
        let Some(pattern) = pattern.to_str().map(str::to_owned) else {
            return Vec::new();
        };
        let Ok(paths) = glob::glob(&pattern) else {
            return Vec::new();
        };

        let mut ids: Vec<String> = paths
            .flatten()
            .filter_map(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix("_extracted.json"))
                    .map(str::to_owned)
            })
            .collect();
        ids.sort();
        ids
    }

    /// Load the function index for `experiment`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::CorpusUnavailable`] when no corpus file exists
    /// for the identifier, [`QuarryError::Io`] if it cannot be read, or
    /// [`QuarryError::Serialization`] if it is not the expected JSON shape.
    pub fn load(&self, experiment: &str) -> Result<FunctionIndex, QuarryError> {
        let path = self.corpus_path(experiment);
        if !path.exists() {
            return Err(QuarryError::CorpusUnavailable(experiment.to_string()));
        }

        let content = std::fs::read_to_string(&path)?;
        let raw: Vec<RawFunction> = serde_json::from_str(&content)?;
        let records = raw.into_iter().map(RawFunction::into_record).collect();
        Ok(FunctionIndex::new(records))
    }
}

/// An immutable, ordered collection of function records for one repository
/// corpus.
///
/// Read-only for the lifetime of a query session; ranking tiers resolve
/// model output against it and consumers only clone records out of it.
///
/// # Examples
///
/// ```
/// use quarry_core::FunctionRecord;
/// use quarry_index::FunctionIndex;
///
/// let index = FunctionIndex::new(vec![FunctionRecord {
///     function_name: "diameter".into(),
///     repo_name: "networkx".into(),
///     file_path: "distance.py".into(),
///     signature: String::new(),
///     docstring: String::new(),
///     code: "def diameter(G): ...".into(),
///     source: String::new(),
/// }]);
/// assert!(index.resolve("diameter", "networkx").is_some());
/// assert!(index.resolve("diameter", "scipy").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FunctionIndex {
    records: Vec<FunctionRecord>,
}

impl FunctionIndex {
    /// Build an index from already-flattened records, preserving order.
    pub fn new(records: Vec<FunctionRecord>) -> Self {
        Self { records }
    }

    /// All records in extraction order.
    pub fn records(&self) -> &[FunctionRecord] {
        &self.records
    }

    /// Number of records in the index.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the record identified by `(function_name, repo_name)`, if present.
    ///
    /// This is the resolution step that keeps fabricated ranking entries out
    /// of search output.
    pub fn resolve(&self, function_name: &str, repo_name: &str) -> Option<&FunctionRecord> {
        self.records
            .iter()
            .find(|r| r.function_name == function_name && r.repo_name == repo_name)
    }

    /// Repository names present in the index, deduplicated, in first-seen order.
    pub fn repos(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for record in &self.records {
            let name = record.repo_name.as_str();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// Records belonging to `repo_name`, in extraction order.
    pub fn functions_for_repo<'a>(
        &'a self,
        repo_name: &'a str,
    ) -> impl Iterator<Item = &'a FunctionRecord> {
        self.records.iter().filter(move |r| r.repo_name == repo_name)
    }
}

// Wire format of `*_extracted.json`: each entry nests repository and module
// metadata under `file.file_module`. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawFunction {
    #[serde(default)]
    function_name: String,
    #[serde(default)]
    function_code: String,
    #[serde(default)]
    file: RawFile,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    file_module: RawFileModule,
}

#[derive(Debug, Default, Deserialize)]
struct RawFileModule {
    #[serde(default)]
    repo: RawRepo,
    #[serde(default)]
    module_id: RawModuleId,
}

#[derive(Debug, Default, Deserialize)]
struct RawRepo {
    #[serde(default)]
    repo_name: String,
    #[serde(default)]
    repo_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawModuleId {
    #[serde(default)]
    identifier: String,
}

impl RawFunction {
    fn into_record(self) -> FunctionRecord {
        FunctionRecord {
            function_name: self.function_name,
            repo_name: self.file.file_module.repo.repo_name,
            file_path: self.file.file_module.module_id.identifier,
            // Not present in the current extraction format.
            signature: String::new(),
            docstring: String::new(),
            code: self.function_code,
            source: self.file.file_module.repo.repo_id,
        }
    }
}
