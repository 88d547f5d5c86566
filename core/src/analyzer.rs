use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::stemmer::porter_stem;

/// Function words dropped by the default analyzer.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "is", "are", "was", "were", "this", "that", "it", "on", "in", "at",
    "by",
];

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref SNOWBALL: Stemmer = Stemmer::create(Algorithm::English);
    static ref DEFAULT_ANALYZER: Analyzer = Analyzer::default();
}

/// Which stemmer runs as the last analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    /// Classical Porter (1980).
    #[default]
    Porter,
    /// Snowball English, also known as Porter2.
    Snowball,
    None,
}

impl FromStr for StemmerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "porter" => Ok(StemmerKind::Porter),
            "snowball" | "porter2" | "english" => Ok(StemmerKind::Snowball),
            "none" | "off" => Ok(StemmerKind::None),
            other => Err(ConfigError::UnknownStemmer(other.to_string())),
        }
    }
}

impl fmt::Display for StemmerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StemmerKind::Porter => "porter",
            StemmerKind::Snowball => "snowball",
            StemmerKind::None => "none",
        };
        f.write_str(name)
    }
}

/// Analyzer settings. Stored in index metadata so queries are analyzed
/// exactly like the documents they are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub stopwords: Vec<String>,
    pub stemmer: StemmerKind,
    /// Apply NFKC normalization before tokenizing.
    pub nfkc: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect(),
            stemmer: StemmerKind::Porter,
            nfkc: false,
        }
    }
}

/// Text analysis pipeline: tokenize, lowercase, drop stopwords, stem.
///
/// An `Analyzer` is immutable; `analyze` is a pure function of the
/// configuration and the input text and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    stopwords: HashSet<String>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let stopwords = config.stopwords.iter().map(|w| w.to_lowercase()).collect();
        Self { config, stopwords }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Turn raw text into normalized terms, in text order.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text: Cow<'_, str> = if self.config.nfkc {
            Cow::Owned(text.nfkc().collect())
        } else {
            Cow::Borrowed(text)
        };

        let mut terms = Vec::new();
        for mat in TOKEN_RE.find_iter(&text) {
            let token = mat.as_str().to_lowercase();
            if self.is_stopword(&token) {
                continue;
            }
            let term = self.stem(&token);
            if !term.is_empty() {
                terms.push(term);
            }
        }
        terms
    }

    fn stem(&self, token: &str) -> String {
        match self.config.stemmer {
            StemmerKind::Porter => porter_stem(token),
            StemmerKind::Snowball => SNOWBALL.stem(token).into_owned(),
            StemmerKind::None => token.to_string(),
        }
    }
}

/// Analyze with the default configuration.
pub fn analyze(text: &str) -> Vec<String> {
    DEFAULT_ANALYZER.analyze(text)
}
