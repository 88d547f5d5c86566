use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use crate::analyzer::{Analyzer, AnalyzerConfig};
use crate::corpus::{Document, Field, ParseError};
use crate::error::{ConfigError, CorpusRecordError};

/// Dense document ordinal, assigned in insertion order.
pub type DocId = u32;
pub type TermId = u32;

const FIELD_COUNT: usize = Field::ALL.len();
const DEFAULT_BATCH_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
}

/// Dictionary entry for one term of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    /// Sorted by doc_id.
    pub postings: Vec<Posting>,
    /// Sum of term frequencies over all postings.
    pub collection_freq: u64,
}

impl TermEntry {
    pub fn document_frequency(&self) -> u32 {
        self.postings.len() as u32
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FieldIndex {
    /// Terms in first-occurrence order; `TermId` indexes this vector.
    terms: Vec<TermEntry>,
    /// Analyzed length of this field, one entry per document.
    lengths: Vec<u32>,
    total_terms: u64,
    #[serde(skip)]
    dictionary: HashMap<String, TermId>,
}

impl FieldIndex {
    fn entry(&self, term: &str) -> Option<&TermEntry> {
        self.dictionary.get(term).map(|&tid| &self.terms[tid as usize])
    }

    fn entry_mut(&mut self, term: String) -> &mut TermEntry {
        let next = self.terms.len() as TermId;
        let tid = *self.dictionary.entry(term).or_insert_with_key(|t| {
            self.terms.push(TermEntry {
                term: t.clone(),
                postings: Vec::new(),
                collection_freq: 0,
            });
            next
        });
        &mut self.terms[tid as usize]
    }
}

/// Per-field postings and statistics for a document collection.
///
/// Built once by [`IndexBuilder`], read-only afterwards. Every indexed
/// document has exactly one length entry in every field, and every posting
/// refers to an indexed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    analyzer: AnalyzerConfig,
    doc_ids: Vec<String>,
    fields: [FieldIndex; FIELD_COUNT],
    #[serde(skip)]
    doc_lookup: HashMap<String, DocId>,
}

impl InvertedIndex {
    /// Index a document stream with a single worker.
    pub fn build<I>(analyzer: Analyzer, documents: I) -> (InvertedIndex, BuildReport)
    where
        I: IntoIterator<Item = Result<Document, ParseError>>,
    {
        let mut builder = IndexBuilder::new(analyzer);
        builder.extend(documents);
        builder.finish()
    }

    /// Analyzer settings the index was built with.
    pub fn analyzer_config(&self) -> &AnalyzerConfig {
        &self.analyzer
    }

    pub fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.analyzer.clone())
    }

    pub fn document_count(&self) -> u32 {
        self.doc_ids.len() as u32
    }

    pub fn external_id(&self, doc_id: DocId) -> Option<&str> {
        self.doc_ids.get(doc_id as usize).map(String::as_str)
    }

    pub fn doc_id(&self, external_id: &str) -> Option<DocId> {
        self.doc_lookup.get(external_id).copied()
    }

    pub fn term(&self, field: Field, term: &str) -> Option<&TermEntry> {
        self.fields[field.slot()].entry(term)
    }

    /// Postings for `term` in `field`; empty when the term never occurred there.
    pub fn postings(&self, field: Field, term: &str) -> &[Posting] {
        self.term(field, term).map(|e| e.postings.as_slice()).unwrap_or(&[])
    }

    pub fn document_frequency(&self, field: Field, term: &str) -> u32 {
        self.term(field, term).map_or(0, TermEntry::document_frequency)
    }

    pub fn collection_frequency(&self, field: Field, term: &str) -> u64 {
        self.term(field, term).map_or(0, |e| e.collection_freq)
    }

    /// Term frequency of `term` in one document's field, 0 if absent.
    pub fn term_frequency(&self, field: Field, term: &str, doc_id: DocId) -> u32 {
        let postings = self.postings(field, term);
        postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .map_or(0, |i| postings[i].term_freq)
    }

    pub fn field_length(&self, field: Field, doc_id: DocId) -> u32 {
        self.fields[field.slot()]
            .lengths
            .get(doc_id as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Number of documents with a length entry for `field`.
    pub fn field_document_count(&self, field: Field) -> u32 {
        self.fields[field.slot()].lengths.len() as u32
    }

    pub fn total_terms(&self, field: Field) -> u64 {
        self.fields[field.slot()].total_terms
    }

    pub fn average_field_length(&self, field: Field) -> f64 {
        let docs = self.field_document_count(field);
        if docs == 0 {
            return 0.0;
        }
        self.total_terms(field) as f64 / docs as f64
    }

    /// Number of distinct terms in `field`.
    pub fn vocabulary_size(&self, field: Field) -> usize {
        self.fields[field.slot()].terms.len()
    }

    /// Dictionary of `field` in first-occurrence order.
    pub fn terms(&self, field: Field) -> impl Iterator<Item = &TermEntry> {
        self.fields[field.slot()].terms.iter()
    }

    /// Rebuild the lookup tables that are not serialized.
    pub(crate) fn restore_lookups(&mut self) {
        self.doc_lookup = self
            .doc_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i as DocId))
            .collect();
        for field in self.fields.iter_mut() {
            field.dictionary = field
                .terms
                .iter()
                .enumerate()
                .map(|(i, e)| (e.term.clone(), i as TermId))
                .collect();
        }
    }
}

/// A skipped record or source, as recorded during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub reason: String,
}

/// Outcome of an index build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: u32,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug, Default)]
struct FieldTerms {
    /// (term, tf) in first-occurrence order.
    counts: Vec<(String, u32)>,
    length: u32,
}

#[derive(Debug)]
struct AnalyzedDocument {
    id: String,
    fields: [FieldTerms; FIELD_COUNT],
}

fn analyze_document(analyzer: &Analyzer, doc: &Document) -> AnalyzedDocument {
    let mut fields: [FieldTerms; FIELD_COUNT] = Default::default();
    for field in Field::ALL {
        let terms = analyzer.analyze(doc.field(field));
        let out = &mut fields[field.slot()];
        out.length = terms.len() as u32;
        let mut seen: HashMap<String, usize> = HashMap::new();
        for term in terms {
            let counts = &mut out.counts;
            let i = *seen.entry(term).or_insert_with_key(|t| {
                counts.push((t.clone(), 0));
                counts.len() - 1
            });
            counts[i].1 += 1;
        }
    }
    AnalyzedDocument {
        id: doc.id.clone(),
        fields,
    }
}

/// Accumulates documents into an [`InvertedIndex`].
///
/// Documents are analyzed in batches, on a rayon pool when one is configured,
/// and merged strictly in arrival order, so the result does not depend on
/// the number of threads.
pub struct IndexBuilder {
    analyzer: Analyzer,
    index: InvertedIndex,
    report: BuildReport,
    pool: Option<ThreadPool>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(analyzer: Analyzer) -> Self {
        let index = InvertedIndex {
            analyzer: analyzer.config().clone(),
            ..InvertedIndex::default()
        };
        Self {
            analyzer,
            index,
            report: BuildReport::default(),
            pool: None,
            batch_size: 1,
        }
    }

    /// Analyze documents on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Result<Self, ConfigError> {
        if threads == 0 {
            return Err(ConfigError::invalid("threads", threads, "must be at least 1"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|_| ConfigError::invalid("threads", threads, "thread pool could not start"))?;
        self.pool = Some(pool);
        if self.batch_size == 1 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", batch_size, "must be at least 1"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Add one document. Fails only on a duplicate id; the index is unchanged then.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId, CorpusRecordError> {
        let analyzed = analyze_document(&self.analyzer, doc);
        self.merge(analyzed)
    }

    /// Record a skipped record or source without aborting the build.
    pub fn skip(&mut self, reason: impl ToString) {
        let reason = reason.to_string();
        tracing::warn!(%reason, "skipping record");
        self.report.skipped.push(SkippedRecord { reason });
    }

    /// Index every document of a parsed stream. Record errors are skipped;
    /// a read error ends the stream and is recorded as a skip.
    pub fn extend<I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = Result<Document, ParseError>>,
    {
        let mut batch = Vec::with_capacity(self.batch_size);
        for item in documents {
            match item {
                Ok(doc) => {
                    batch.push(doc);
                    if batch.len() >= self.batch_size {
                        self.index_batch(&batch);
                        batch.clear();
                    }
                }
                Err(e) => self.skip(e),
            }
        }
        self.index_batch(&batch);
    }

    fn index_batch(&mut self, batch: &[Document]) {
        if batch.is_empty() {
            return;
        }
        let analyzer = &self.analyzer;
        let analyzed: Vec<AnalyzedDocument> = match &self.pool {
            Some(pool) => pool.install(|| {
                batch
                    .par_iter()
                    .map(|doc| analyze_document(analyzer, doc))
                    .collect()
            }),
            None => batch.iter().map(|doc| analyze_document(analyzer, doc)).collect(),
        };
        for doc in analyzed {
            if let Err(e) = self.merge(doc) {
                self.skip(e);
            }
        }
    }

    fn merge(&mut self, doc: AnalyzedDocument) -> Result<DocId, CorpusRecordError> {
        if self.index.doc_lookup.contains_key(&doc.id) {
            return Err(CorpusRecordError::DuplicateId { id: doc.id });
        }
        let doc_id = self.index.doc_ids.len() as DocId;
        self.index.doc_lookup.insert(doc.id.clone(), doc_id);
        self.index.doc_ids.push(doc.id);

        for (field_index, terms) in self.index.fields.iter_mut().zip(doc.fields) {
            field_index.lengths.push(terms.length);
            field_index.total_terms += terms.length as u64;
            for (term, term_freq) in terms.counts {
                let entry = field_index.entry_mut(term);
                entry.postings.push(Posting { doc_id, term_freq });
                entry.collection_freq += term_freq as u64;
            }
        }
        self.report.indexed += 1;
        Ok(doc_id)
    }

    pub fn document_count(&self) -> u32 {
        self.index.document_count()
    }

    pub fn finish(self) -> (InvertedIndex, BuildReport) {
        tracing::info!(
            num_docs = self.report.indexed,
            skipped = self.report.skipped.len(),
            "index build finished"
        );
        (self.index, self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse;

    fn sample() -> InvertedIndex {
        let raw = ".I 1\n.T\ncat dog\n.W\nthe cat sat\n.I 2\n.T\nfish\n.W\na dog barked\n";
        InvertedIndex::build(Analyzer::default(), parse(raw)).0
    }

    #[test]
    fn postings_and_lengths() {
        let index = sample();
        assert_eq!(index.document_count(), 2);
        assert_eq!(
            index.postings(Field::Contents, "cat"),
            &[Posting { doc_id: 0, term_freq: 1 }]
        );
        assert_eq!(index.field_length(Field::Contents, 0), 2);
        assert_eq!(index.field_length(Field::Title, 1), 1);
        assert_eq!(index.field_length(Field::Author, 0), 0);
        assert_eq!(index.average_field_length(Field::Title), 1.5);
    }

    #[test]
    fn unknown_terms_have_no_postings() {
        let index = sample();
        assert!(index.postings(Field::Title, "zebra").is_empty());
        assert_eq!(index.document_frequency(Field::Title, "zebra"), 0);
        assert_eq!(index.term_frequency(Field::Title, "zebra", 0), 0);
    }

    #[test]
    fn term_frequency_and_collection_frequency() {
        let doc = Document::new("x").with_field(Field::Contents, "wing wing tail wing");
        let mut builder = IndexBuilder::new(Analyzer::default());
        builder.add_document(&doc).unwrap();
        let (index, _) = builder.finish();
        assert_eq!(index.term_frequency(Field::Contents, "wing", 0), 3);
        assert_eq!(index.collection_frequency(Field::Contents, "wing"), 3);
        assert_eq!(index.total_terms(Field::Contents), 4);
        let terms: Vec<_> = index.terms(Field::Contents).map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["wing", "tail"]);
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let raw = ".I 1\n.W\nfirst\n.I 1\n.W\nsecond\n.I 2\n.W\nthird\n";
        let (index, report) = InvertedIndex::build(Analyzer::default(), parse(raw));
        assert_eq!(index.document_count(), 2);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(index.doc_id("2"), Some(1));
        assert!(index.postings(Field::Contents, "second").is_empty());
    }

    #[test]
    fn empty_index_statistics() {
        let (index, report) = InvertedIndex::build(Analyzer::default(), parse(""));
        assert_eq!(index.document_count(), 0);
        assert_eq!(index.average_field_length(Field::Contents), 0.0);
        assert_eq!(report, BuildReport::default());
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(IndexBuilder::new(Analyzer::default()).with_threads(0).is_err());
    }
}
