//! Relevance models.
//!
//! Notation: `n` documents, `df` document frequency of the term, `tf` term
//! frequency in the candidate field, `dl` field length, `avgdl` average
//! field length, `p_c` collection probability of the term in the field.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::corpus::Field;
use crate::error::ConfigError;
use crate::index::{DocId, InvertedIndex, TermEntry};

pub const DEFAULT_BM25_K1: f64 = 1.2;
pub const DEFAULT_BM25_B: f64 = 0.75;
pub const DEFAULT_DIRICHLET_MU: f64 = 2000.0;
pub const DEFAULT_JM_LAMBDA: f64 = 0.7;

/// Scoring model, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum Similarity {
    /// Vector-space TF-IDF with length normalization.
    Classic,
    Bm25 {
        k1: f64,
        b: f64,
    },
    LmDirichlet {
        mu: f64,
    },
    LmJelinekMercer {
        lambda: f64,
    },
    /// Presence only.
    Boolean,
}

impl Default for Similarity {
    fn default() -> Self {
        Similarity::Bm25 {
            k1: DEFAULT_BM25_K1,
            b: DEFAULT_BM25_B,
        }
    }
}

/// Collection statistics of one term in one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    pub doc_count: u32,
    pub doc_freq: u32,
    pub collection_freq: u64,
    pub total_terms: u64,
    pub avg_field_length: f64,
}

impl TermStats {
    pub fn new(index: &InvertedIndex, field: Field, entry: Option<&TermEntry>) -> Self {
        Self {
            doc_count: index.field_document_count(field),
            doc_freq: entry.map_or(0, TermEntry::document_frequency),
            collection_freq: entry.map_or(0, |e| e.collection_freq),
            total_terms: index.total_terms(field),
            avg_field_length: index.average_field_length(field),
        }
    }

    fn collection_probability(&self) -> f64 {
        if self.total_terms == 0 {
            return 0.0;
        }
        self.collection_freq as f64 / self.total_terms as f64
    }
}

impl Similarity {
    /// Default model for an identifier such as `bm25` or `lm-dirichlet`.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" | "tfidf" | "tf-idf" => Ok(Similarity::Classic),
            "bm25" => Ok(Similarity::default()),
            "lm-dirichlet" | "dirichlet" => Ok(Similarity::LmDirichlet {
                mu: DEFAULT_DIRICHLET_MU,
            }),
            "lm-jelinek-mercer" | "jelinek-mercer" | "jm" => Ok(Similarity::LmJelinekMercer {
                lambda: DEFAULT_JM_LAMBDA,
            }),
            "boolean" => Ok(Similarity::Boolean),
            _ => Err(ConfigError::UnsupportedModel(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Similarity::Classic => "classic",
            Similarity::Bm25 { .. } => "bm25",
            Similarity::LmDirichlet { .. } => "lm-dirichlet",
            Similarity::LmJelinekMercer { .. } => "lm-jelinek-mercer",
            Similarity::Boolean => "boolean",
        }
    }

    /// Reject parameters outside each model's domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Similarity::Bm25 { k1, b } => {
                if !(k1.is_finite() && k1 > 0.0) {
                    return Err(ConfigError::invalid("k1", k1, "must be positive"));
                }
                if !(0.0..=1.0).contains(&b) {
                    return Err(ConfigError::invalid("b", b, "must be within [0, 1]"));
                }
            }
            Similarity::LmDirichlet { mu } => {
                if !(mu.is_finite() && mu > 0.0) {
                    return Err(ConfigError::invalid("mu", mu, "must be positive"));
                }
            }
            Similarity::LmJelinekMercer { lambda } => {
                if !(lambda > 0.0 && lambda < 1.0) {
                    return Err(ConfigError::invalid("lambda", lambda, "must be within (0, 1)"));
                }
            }
            Similarity::Classic | Similarity::Boolean => {}
        }
        Ok(())
    }

    /// Score of `term` in one document's `field`, looked up from the index.
    pub fn score(&self, field: Field, term: &str, doc_id: DocId, index: &InvertedIndex) -> f64 {
        let entry = index.term(field, term);
        let stats = TermStats::new(index, field, entry);
        let tf = index.term_frequency(field, term, doc_id);
        let dl = index.field_length(field, doc_id);
        self.score_tf(&stats, tf, dl)
    }

    /// Score from precomputed statistics; the hot path of query execution.
    pub fn score_tf(&self, stats: &TermStats, tf: u32, dl: u32) -> f64 {
        if stats.doc_freq == 0 || stats.doc_count == 0 || tf == 0 {
            return 0.0;
        }
        let n = stats.doc_count as f64;
        let df = stats.doc_freq as f64;
        let tf = tf as f64;
        let dl = dl as f64;

        match *self {
            Similarity::Classic => {
                if dl == 0.0 {
                    return 0.0;
                }
                let idf = 1.0 + (n / (df + 1.0)).ln();
                tf.sqrt() * idf / dl.sqrt()
            }
            Similarity::Bm25 { k1, b } => {
                if stats.avg_field_length == 0.0 {
                    return 0.0;
                }
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let norm = 1.0 - b + b * dl / stats.avg_field_length;
                idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
            }
            Similarity::LmDirichlet { mu } => {
                let p_c = stats.collection_probability();
                ((tf + mu * p_c) / (dl + mu)).ln()
            }
            Similarity::LmJelinekMercer { lambda } => {
                if dl == 0.0 {
                    return 0.0;
                }
                let p_c = stats.collection_probability();
                ((1.0 - lambda) * (tf / dl) + lambda * p_c).ln()
            }
            Similarity::Boolean => 1.0,
        }
    }
}

impl FromStr for Similarity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Similarity::from_name(s)
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Bm25 { k1, b } => write!(f, "bm25(k1={k1}, b={b})"),
            Similarity::LmDirichlet { mu } => write!(f, "lm-dirichlet(mu={mu})"),
            Similarity::LmJelinekMercer { lambda } => write!(f, "lm-jelinek-mercer(lambda={lambda})"),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(doc_count: u32, doc_freq: u32) -> TermStats {
        TermStats {
            doc_count,
            doc_freq,
            collection_freq: doc_freq as u64 * 2,
            total_terms: doc_count as u64 * 10,
            avg_field_length: 10.0,
        }
    }

    const ALL: [Similarity; 5] = [
        Similarity::Classic,
        Similarity::Bm25 { k1: 1.2, b: 0.75 },
        Similarity::LmDirichlet { mu: 2000.0 },
        Similarity::LmJelinekMercer { lambda: 0.7 },
        Similarity::Boolean,
    ];

    #[test]
    fn absent_terms_and_empty_collections_score_zero() {
        for model in ALL {
            assert_eq!(model.score_tf(&stats(10, 0), 3, 10), 0.0, "{model}");
            assert_eq!(model.score_tf(&stats(0, 0), 3, 10), 0.0, "{model}");
            assert_eq!(model.score_tf(&stats(10, 2), 0, 10), 0.0, "{model}");
        }
    }

    #[test]
    fn zero_length_fields_never_divide_by_zero() {
        for model in ALL {
            assert!(model.score_tf(&stats(10, 2), 1, 0).is_finite(), "{model}");
        }
        let mut empty = stats(10, 2);
        empty.avg_field_length = 0.0;
        assert_eq!(Similarity::default().score_tf(&empty, 1, 0), 0.0);
    }

    #[test]
    fn classic_formula() {
        let got = Similarity::Classic.score_tf(&stats(10, 1), 4, 16);
        let want = 2.0 * (1.0 + (10.0f64 / 2.0).ln()) / 4.0;
        assert!((got - want).abs() < 1e-12);
    }

    #[test]
    fn bm25_formula() {
        let got = Similarity::Bm25 { k1: 1.2, b: 0.75 }.score_tf(&stats(10, 2), 3, 20);
        let idf = (1.0 + 8.5f64 / 2.5).ln();
        let want = idf * (3.0 * 2.2) / (3.0 + 1.2 * (0.25 + 0.75 * 2.0));
        assert!((got - want).abs() < 1e-12);
    }

    #[test]
    fn bm25_is_monotone_in_tf_and_length() {
        let model = Similarity::Bm25 { k1: 2.0, b: 0.5 };
        let s = stats(100, 7);
        for tf in 1..20 {
            assert!(model.score_tf(&s, tf + 1, 12) >= model.score_tf(&s, tf, 12));
        }
        for dl in 1..50 {
            assert!(model.score_tf(&s, 3, dl + 1) <= model.score_tf(&s, 3, dl));
        }
    }

    #[test]
    fn language_model_formulas() {
        let s = stats(10, 2);
        let p_c = 4.0 / 100.0;
        let d = Similarity::LmDirichlet { mu: 2000.0 }.score_tf(&s, 2, 8);
        assert!((d - ((2.0 + 2000.0 * p_c) / 2008.0f64).ln()).abs() < 1e-12);
        let jm = Similarity::LmJelinekMercer { lambda: 0.7 }.score_tf(&s, 2, 8);
        assert!((jm - (0.3 * 0.25 + 0.7 * p_c).ln()).abs() < 1e-12);
    }

    #[test]
    fn boolean_is_zero_or_one() {
        for tf in 0..5 {
            let score = Similarity::Boolean.score_tf(&stats(10, 3), tf, 7);
            assert!(score == 0.0 || score == 1.0);
        }
    }

    #[test]
    fn model_names() {
        assert_eq!(Similarity::from_name("BM25").unwrap(), Similarity::default());
        assert_eq!(Similarity::from_name("tfidf").unwrap(), Similarity::Classic);
        assert_eq!(
            "jm".parse::<Similarity>().unwrap(),
            Similarity::LmJelinekMercer { lambda: 0.7 }
        );
        assert_eq!(
            Similarity::from_name("dfr"),
            Err(ConfigError::UnsupportedModel("dfr".into()))
        );
    }

    #[test]
    fn parameter_validation() {
        assert!(Similarity::Bm25 { k1: 2.5, b: 0.3 }.validate().is_ok());
        assert!(Similarity::Bm25 { k1: 1.2, b: 0.0 }.validate().is_ok());
        assert!(Similarity::Bm25 { k1: 0.0, b: 0.5 }.validate().is_err());
        assert!(Similarity::Bm25 { k1: 1.2, b: 1.5 }.validate().is_err());
        assert!(Similarity::LmDirichlet { mu: -1.0 }.validate().is_err());
        assert!(Similarity::LmJelinekMercer { lambda: 1.0 }.validate().is_err());
        assert!(Similarity::LmJelinekMercer { lambda: f64::NAN }.validate().is_err());
    }
}
