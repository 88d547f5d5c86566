use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::analyzer::Analyzer;
use crate::corpus::Field;
use crate::error::{ConfigError, QueryParseError};
use crate::index::{DocId, InvertedIndex};
use crate::similarity::{Similarity, TermStats};

/// Clause ceiling of the classic boolean query parser.
pub const DEFAULT_MAX_CLAUSES: usize = 1024;

/// Characters the classic query syntax treats as operators.
const OPERATOR_CHARS: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&', '/',
];

/// Backslash-escape every operator character so the text can only be read
/// as a bag of terms.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if OPERATOR_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Per-field boost weights. Fields are always visited in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldBoosts(BTreeMap<Field, f32>);

impl Default for FieldBoosts {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Field::Title, 3.0),
            (Field::Author, 2.0),
            (Field::Contents, 1.0),
        ]))
    }
}

impl FieldBoosts {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, field: Field, boost: f32) -> Result<Self, ConfigError> {
        self.set(field, boost)?;
        Ok(self)
    }

    pub fn set(&mut self, field: Field, boost: f32) -> Result<(), ConfigError> {
        check_boost(boost)?;
        self.0.insert(field, boost);
        Ok(())
    }

    /// Parse a `field=weight` assignment.
    pub fn parse_assignment(s: &str) -> Result<(Field, f32), ConfigError> {
        let (field, weight) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedBoost(s.to_string()))?;
        let field: Field = field.parse()?;
        let boost: f32 = weight
            .trim()
            .parse()
            .map_err(|_| ConfigError::MalformedBoost(s.to_string()))?;
        check_boost(boost)?;
        Ok((field, boost))
    }

    pub fn get(&self, field: Field) -> Option<f32> {
        self.0.get(&field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, f32)> + '_ {
        self.0.iter().map(|(f, b)| (*f, *b))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Boosts loaded from configuration files bypass `set`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::invalid("boosts", "{}", "at least one field is required"));
        }
        self.0.values().try_for_each(|b| check_boost(*b))
    }
}

fn check_boost(boost: f32) -> Result<(), ConfigError> {
    if boost.is_finite() && boost > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid("boost", boost, "must be positive"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub raw_text: String,
    pub field_boosts: FieldBoosts,
}

impl Query {
    pub fn new(raw_text: impl Into<String>, field_boosts: FieldBoosts) -> Self {
        Self {
            raw_text: raw_text.into(),
            field_boosts,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub doc_id: String,
    pub score: f64,
}

/// Runs queries against a built index with one similarity model.
pub struct Searcher<'a> {
    index: &'a InvertedIndex,
    analyzer: Analyzer,
    similarity: Similarity,
    max_clauses: usize,
}

impl<'a> Searcher<'a> {
    /// Queries are analyzed with the analyzer the index was built with.
    pub fn new(index: &'a InvertedIndex, similarity: Similarity) -> Self {
        Self {
            index,
            analyzer: index.analyzer(),
            similarity,
            max_clauses: DEFAULT_MAX_CLAUSES,
        }
    }

    pub fn with_max_clauses(mut self, max_clauses: usize) -> Self {
        self.max_clauses = max_clauses;
        self
    }

    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    /// Escape and analyze a query into its distinct terms.
    pub fn parse(&self, query: &Query) -> Result<Vec<String>, QueryParseError> {
        let escaped = escape(&query.raw_text);
        let mut seen = HashSet::new();
        let terms: Vec<String> = self
            .analyzer
            .analyze(&escaped)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        let clauses = terms.len() * query.field_boosts.len();
        if clauses > self.max_clauses {
            return Err(QueryParseError::TooManyClauses {
                clauses,
                max: self.max_clauses,
            });
        }
        Ok(terms)
    }

    /// Top `k` documents for `query`, best first. Equal scores are ordered
    /// by insertion order of the documents.
    pub fn execute(&self, query: &Query, k: usize) -> Result<Vec<ScoredHit>, QueryParseError> {
        let terms = self.parse(query)?;
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut totals: HashMap<DocId, f64> = HashMap::new();
        for (field, boost) in query.field_boosts.iter() {
            for term in &terms {
                let Some(entry) = self.index.term(field, term) else {
                    continue;
                };
                let stats = TermStats::new(self.index, field, Some(entry));
                for posting in &entry.postings {
                    let dl = self.index.field_length(field, posting.doc_id);
                    let score = self.similarity.score_tf(&stats, posting.term_freq, dl);
                    *totals.entry(posting.doc_id).or_insert(0.0) += boost as f64 * score;
                }
            }
        }

        let mut ranked: Vec<(DocId, f64)> = totals.into_iter().filter(|(_, score)| *score != 0.0).collect();
        ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        Ok(ranked
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.index.external_id(doc_id).map(|id| ScoredHit {
                    doc_id: id.to_string(),
                    score,
                })
            })
            .collect())
    }

    /// Run independent queries, in parallel when a pool is given. Results
    /// are in input order; a query that fails to parse yields no hits.
    pub fn execute_batch(&self, queries: &[Query], k: usize, pool: Option<&ThreadPool>) -> Vec<Vec<ScoredHit>> {
        let run = |(i, query): (usize, &Query)| match self.execute(query, k) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query = i + 1, error = %e, "query skipped");
                Vec::new()
            }
        };
        match pool {
            Some(pool) => pool.install(|| queries.par_iter().enumerate().map(run).collect()),
            None => queries.iter().enumerate().map(run).collect(),
        }
    }
}

/// Execute one query with the given model and default clause limit.
pub fn execute(
    query: &Query,
    index: &InvertedIndex,
    similarity: Similarity,
    k: usize,
) -> Result<Vec<ScoredHit>, QueryParseError> {
    Searcher::new(index, similarity).execute(query, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse;

    fn index() -> InvertedIndex {
        let raw = ".I 1\n.T\ncat dog\n.W\nthe cat sat\n.I 2\n.T\nfish\n.W\na dog barked\n";
        InvertedIndex::build(Analyzer::default(), parse(raw)).0
    }

    #[test]
    fn escapes_operator_characters() {
        assert_eq!(escape("a+b (c)"), "a\\+b \\(c\\)");
        assert_eq!(escape("x && y || !z"), "x \\&\\& y \\|\\| \\!z");
        assert_eq!(escape("plain words"), "plain words");
    }

    #[test]
    fn parse_deduplicates_terms() {
        let index = index();
        let searcher = Searcher::new(&index, Similarity::Boolean);
        let terms = searcher.parse(&Query::new("dogs dog DOG", FieldBoosts::default())).unwrap();
        assert_eq!(terms, vec!["dog"]);
    }

    #[test]
    fn clause_limit() {
        let index = index();
        let searcher = Searcher::new(&index, Similarity::Boolean).with_max_clauses(5);
        let err = searcher
            .execute(&Query::new("cat dog", FieldBoosts::default()), 10)
            .unwrap_err();
        assert_eq!(err, QueryParseError::TooManyClauses { clauses: 6, max: 5 });
    }

    #[test]
    fn stopword_only_query_is_empty() {
        let index = index();
        let hits = execute(&Query::new("the a", FieldBoosts::default()), &index, Similarity::default(), 10);
        assert!(hits.unwrap().is_empty());
    }

    #[test]
    fn k_limits_results() {
        let index = index();
        let query = Query::new("dog", FieldBoosts::default());
        assert_eq!(execute(&query, &index, Similarity::Boolean, 1).unwrap().len(), 1);
        assert!(execute(&query, &index, Similarity::Boolean, 0).unwrap().is_empty());
    }

    #[test]
    fn boosts_parse() {
        assert_eq!(FieldBoosts::parse_assignment("title=2.5").unwrap(), (Field::Title, 2.5));
        assert!(FieldBoosts::parse_assignment("title").is_err());
        assert!(FieldBoosts::parse_assignment("title=0").is_err());
        assert!(FieldBoosts::parse_assignment("summary=1").is_err());
        assert!(FieldBoosts::empty().validate().is_err());
    }

    #[test]
    fn failed_query_does_not_stop_batch() {
        let index = index();
        let searcher = Searcher::new(&index, Similarity::Boolean).with_max_clauses(3);
        let boosts = FieldBoosts::default();
        let queries = vec![
            Query::new("cat dog fish", boosts.clone()),
            Query::new("fish", boosts),
        ];
        let results = searcher.execute_batch(&queries, 10, None);
        assert!(results[0].is_empty());
        assert_eq!(results[1][0].doc_id, "2");
    }
}
