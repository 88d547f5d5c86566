use fieldwise_core::persist::{load_index, load_meta, save_index, save_meta, IndexPaths, FORMAT_VERSION};
use fieldwise_core::{
    parse, Analyzer, AnalyzerConfig, Error, Field, FieldBoosts, InvertedIndex, Query, Searcher, Similarity,
    StemmerKind,
};
use tempfile::tempdir;

const CORPUS: &str = ".I 10\n.T\nheat transfer\n.W\nheat transfer in hypersonic flow\n.I 20\n.T\nbuckling\n.W\nbuckling of thin cylinders\n";

#[test]
fn saved_index_loads_back_equivalent() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (index, _) = InvertedIndex::build(Analyzer::default(), parse(CORPUS));
    let meta = save_index(&paths, &index).unwrap();
    assert_eq!(meta.num_docs, 2);
    assert_eq!(meta.num_terms[&Field::Title], 3);

    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded.document_count(), 2);
    assert_eq!(loaded.doc_id("20"), Some(1));
    assert_eq!(loaded.postings(Field::Contents, "heat"), index.postings(Field::Contents, "heat"));
    assert_eq!(bincode::serialize(&loaded).unwrap(), bincode::serialize(&index).unwrap());

    let query = Query::new("hypersonic heat", FieldBoosts::default());
    let before = Searcher::new(&index, Similarity::default()).execute(&query, 10).unwrap();
    let after = Searcher::new(&loaded, Similarity::default()).execute(&query, 10).unwrap();
    assert_eq!(before, after);
}

#[test]
fn analyzer_settings_travel_with_the_index() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let config = AnalyzerConfig {
        stemmer: StemmerKind::None,
        ..AnalyzerConfig::default()
    };
    let (index, _) = InvertedIndex::build(Analyzer::new(config.clone()), parse(CORPUS));
    save_index(&paths, &index).unwrap();

    assert_eq!(load_meta(&paths).unwrap().analyzer, config);
    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded.analyzer_config(), &config);
    assert_eq!(loaded.postings(Field::Contents, "cylinders").len(), 1);
}

#[test]
fn rebuilding_overwrites_previous_index() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (first, _) = InvertedIndex::build(Analyzer::default(), parse(CORPUS));
    save_index(&paths, &first).unwrap();
    let (second, _) = InvertedIndex::build(Analyzer::default(), parse(".I 1\n.W\nflutter\n"));
    save_index(&paths, &second).unwrap();

    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded.document_count(), 1);
    assert!(loaded.postings(Field::Contents, "heat").is_empty());
}

#[test]
fn unknown_format_version_is_rejected() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (index, _) = InvertedIndex::build(Analyzer::default(), parse(CORPUS));
    let mut meta = save_index(&paths, &index).unwrap();
    meta.version = FORMAT_VERSION + 1;
    save_meta(&paths, &meta).unwrap();

    assert!(matches!(load_index(&paths), Err(Error::IndexVersion { .. })));
}

#[test]
fn missing_index_is_an_io_error() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("absent"));
    assert!(matches!(load_index(&paths), Err(Error::Io(_))));
}

#[test]
fn metadata_round_trips_and_rejects_garbage() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (index, _) = InvertedIndex::build(Analyzer::default(), parse(CORPUS));
    let meta = save_index(&paths, &index).unwrap();
    assert_eq!(load_meta(&paths).unwrap(), meta);

    std::fs::write(dir.path().join("meta.json"), "{ not json").unwrap();
    assert!(matches!(load_meta(&paths), Err(Error::Metadata(_))));
}
