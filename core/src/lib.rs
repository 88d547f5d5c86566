//! Fielded document retrieval: analysis, inverted index, ranking.

pub mod analyzer;
pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod similarity;
pub mod stemmer;
pub mod trec;

pub use analyzer::{analyze, Analyzer, AnalyzerConfig, StemmerKind};
pub use config::{IndexConfig, SearchConfig};
pub use corpus::{parse, CorpusReader, Document, Field, ParseError};
pub use error::{ConfigError, CorpusRecordError, Error, QueryParseError, Result};
pub use index::{BuildReport, DocId, IndexBuilder, InvertedIndex, Posting, SkippedRecord, TermEntry, TermId};
pub use query::{escape, execute, FieldBoosts, Query, ScoredHit, Searcher};
pub use similarity::{Similarity, TermStats};
