//! Run configuration, loadable from JSON. Every setting has a default, so a
//! config file only needs the keys it changes.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use std::fs;
use std::path::Path;

use crate::analyzer::AnalyzerConfig;
use crate::error::{ConfigError, Result};
use crate::query::{FieldBoosts, DEFAULT_MAX_CLAUSES};
use crate::similarity::Similarity;
use crate::trec::{QueryFormat, DEFAULT_RUN_TAG};

pub const DEFAULT_TOP_K: usize = 1400;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ConfigError::MissingPath(path.to_path_buf()).into());
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn check_threads(threads: Option<usize>) -> std::result::Result<(), ConfigError> {
    match threads {
        Some(0) => Err(ConfigError::invalid("threads", 0, "must be at least 1")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub analyzer: AnalyzerConfig,
    /// Worker threads for document analysis; `None` indexes on the calling thread.
    pub threads: Option<usize>,
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            threads: None,
            batch_size: 512,
        }
    }
}

impl IndexConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        load_json(path)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_threads(self.threads)?;
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", 0, "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub similarity: Similarity,
    pub boosts: FieldBoosts,
    pub top_k: usize,
    pub run_tag: String,
    pub max_clauses: usize,
    pub query_format: QueryFormat,
    /// Use `.I` ids of query records instead of sequential numbers.
    pub record_ids: bool,
    pub threads: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity: Similarity::default(),
            boosts: FieldBoosts::default(),
            top_k: DEFAULT_TOP_K,
            run_tag: DEFAULT_RUN_TAG.to_string(),
            max_clauses: DEFAULT_MAX_CLAUSES,
            query_format: QueryFormat::Lines,
            record_ids: false,
            threads: None,
        }
    }
}

impl SearchConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        load_json(path)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.similarity.validate()?;
        self.boosts.validate()?;
        if self.top_k == 0 {
            return Err(ConfigError::invalid("top_k", 0, "must be at least 1"));
        }
        if self.max_clauses == 0 {
            return Err(ConfigError::invalid("max_clauses", 0, "must be at least 1"));
        }
        if self.run_tag.is_empty() || self.run_tag.contains(char::is_whitespace) {
            return Err(ConfigError::invalid("run_tag", &self.run_tag, "must be one non-empty word"));
        }
        check_threads(self.threads)
    }
}
