use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::analyzer::AnalyzerConfig;
use crate::corpus::Field;
use crate::error::{Error, Result};
use crate::index::InvertedIndex;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    /// Distinct terms per field.
    pub num_terms: BTreeMap<Field, usize>,
    pub created_at: String,
    pub version: u32,
    pub analyzer: AnalyzerConfig,
}

impl MetaFile {
    pub fn describe(index: &InvertedIndex) -> Self {
        Self {
            num_docs: index.document_count(),
            num_terms: Field::ALL
                .iter()
                .map(|&f| (f, index.vocabulary_size(f)))
                .collect(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
            analyzer: index.analyzer_config().clone(),
        }
    }
}

/// Files of an index directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Write the index and its metadata, replacing whatever the directory held.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.index())?);
    bincode::serialize_into(&mut w, index)?;
    w.flush()?;

    let meta = MetaFile::describe(index);
    save_meta(paths, &meta)?;
    tracing::debug!(root = %paths.root.display(), num_docs = meta.num_docs, "index saved");
    Ok(meta)
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::IndexVersion { found: meta.version, expected: FORMAT_VERSION });
    }
    let r = BufReader::new(File::open(paths.index())?);
    let mut index: InvertedIndex = bincode::deserialize_from(r)?;
    index.restore_lookups();
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.meta())?);
    serde_json::to_writer_pretty(&mut w, meta)?;
    w.flush()?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let r = BufReader::new(File::open(paths.meta())?);
    Ok(serde_json::from_reader(r)?)
}
