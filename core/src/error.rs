//! Error types for the retrieval core.
//!
//! Errors are split by how a caller is expected to react to them:
//! [`ConfigError`] aborts a run before any work starts, [`CorpusRecordError`]
//! skips one record, [`QueryParseError`] empties one query's result list.
//! [`Error`] wraps all of them together with I/O and persistence failures.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Invalid or unsupported configuration. Always fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unsupported similarity model: {0:?}")]
    UnsupportedModel(String),

    #[error("invalid value {value} for {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unknown field: {0:?}")]
    UnknownField(String),

    #[error("unknown stemmer: {0:?}")]
    UnknownStemmer(String),

    #[error("malformed field boost {0:?}, expected <field>=<weight>")]
    MalformedBoost(String),

    #[error("input path does not exist: {}", .0.display())]
    MissingPath(PathBuf),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        ConfigError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// A single corpus record that cannot be indexed. The record is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorpusRecordError {
    #[error("record starting at line {line} has an empty id")]
    EmptyId { line: usize },

    #[error("duplicate document id {id:?}")]
    DuplicateId { id: String },
}

/// A single query that cannot be executed. The query yields no hits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("query expands to {clauses} clauses, limit is {max}")]
    TooManyClauses { clauses: usize, max: usize },
}

/// Error type covering every fallible operation in the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("corpus record error: {0}")]
    CorpusRecord(#[from] CorpusRecordError),

    #[error("query error: {0}")]
    QueryParse(#[from] QueryParseError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("index format version {found} is not supported (expected {expected})")]
    IndexVersion { found: u32, expected: u32 },
}
