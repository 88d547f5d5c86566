//! Query files in, TREC run lines out.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::corpus::{CorpusReader, LossyLines, ParseError};
use crate::error::ConfigError;
use crate::query::ScoredHit;

pub const DEFAULT_RUN_TAG: &str = "STANDARD";

/// How a query file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFormat {
    /// One free-text query per line.
    #[default]
    Lines,
    /// `.I` / `.W` records, the corpus format.
    Records,
}

impl FromStr for QueryFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lines" => Ok(QueryFormat::Lines),
            "records" => Ok(QueryFormat::Records),
            other => Err(ConfigError::invalid("query_format", other, "expected lines or records")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub id: String,
    pub text: String,
}

/// Read every query of a query file.
///
/// Ids are sequential from 1 in file order. In `Lines` format a blank line
/// still takes an id. In `Records` format `record_ids` keeps each record's
/// own `.I` id instead, and a malformed record keeps its sequential slot
/// with empty text.
pub fn read_queries<R: BufRead>(reader: R, format: QueryFormat, record_ids: bool) -> io::Result<Vec<QueryRecord>> {
    match format {
        QueryFormat::Lines => LossyLines::new(reader)
            .enumerate()
            .map(|(i, line)| {
                line.map(|text| QueryRecord {
                    id: (i + 1).to_string(),
                    text: text.trim().to_string(),
                })
            })
            .collect(),
        QueryFormat::Records => {
            let mut queries = Vec::new();
            for (i, item) in CorpusReader::new(reader).enumerate() {
                let seq = (i + 1).to_string();
                match item {
                    Ok(doc) => queries.push(QueryRecord {
                        id: if record_ids { doc.id } else { seq },
                        text: doc.contents,
                    }),
                    Err(ParseError::Record(e)) => {
                        tracing::warn!(query = %seq, error = %e, "malformed query record");
                        queries.push(QueryRecord {
                            id: seq,
                            text: String::new(),
                        });
                    }
                    Err(ParseError::Io(e)) => return Err(e),
                }
            }
            Ok(queries)
        }
    }
}

/// One line of a TREC run: `<qid> 0 <docid> <rank> <score> <tag>`.
#[derive(Debug, Clone, Copy)]
pub struct TrecLine<'a> {
    pub query_id: &'a str,
    pub doc_id: &'a str,
    pub rank: usize,
    pub score: f64,
    pub run_tag: &'a str,
}

impl fmt::Display for TrecLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 0 {} {} {} {}",
            self.query_id, self.doc_id, self.rank, self.score, self.run_tag
        )
    }
}

/// Write the ranked hits of one query, ranks starting at 1. Returns the number of lines.
pub fn write_run<W: Write>(out: &mut W, query_id: &str, hits: &[ScoredHit], run_tag: &str) -> io::Result<usize> {
    for (i, hit) in hits.iter().enumerate() {
        let line = TrecLine {
            query_id,
            doc_id: &hit.doc_id,
            rank: i + 1,
            score: hit.score,
            run_tag,
        };
        writeln!(out, "{line}")?;
    }
    Ok(hits.len())
}
