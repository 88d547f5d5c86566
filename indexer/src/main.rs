use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldwise_core::persist::{load_meta, save_index, IndexPaths};
use fieldwise_core::{Analyzer, ConfigError, CorpusReader, IndexBuilder, IndexConfig, StemmerKind};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect fielded inverted indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus file or a directory of corpus files
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory; an existing index there is replaced
        #[arg(long)]
        output: PathBuf,
        /// JSON index configuration; the flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Comma-separated stopwords replacing the default list
        #[arg(long, value_delimiter = ',')]
        stopwords: Option<Vec<String>>,
        /// Keep every token
        #[arg(long, default_value_t = false, conflicts_with = "stopwords")]
        no_stopwords: bool,
        /// porter, snowball or none
        #[arg(long)]
        stemmer: Option<StemmerKind>,
        /// Apply NFKC normalization before tokenizing
        #[arg(long, default_value_t = false)]
        nfkc: bool,
        /// Worker threads for document analysis
        #[arg(long)]
        threads: Option<usize>,
        /// Documents analyzed per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Print the metadata of an existing index
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, stopwords, no_stopwords, stemmer, nfkc, threads, batch_size } => {
            let mut config = match config {
                Some(path) => IndexConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => IndexConfig::default(),
            };
            if let Some(words) = stopwords {
                config.analyzer.stopwords = words.into_iter().map(|w| w.trim().to_string()).collect();
            }
            if no_stopwords {
                config.analyzer.stopwords.clear();
            }
            if let Some(stemmer) = stemmer {
                config.analyzer.stemmer = stemmer;
            }
            config.analyzer.nfkc |= nfkc;
            if threads.is_some() {
                config.threads = threads;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            build_index(&input, &output, &config)
        }
        Commands::Stats { index } => {
            let meta = load_meta(&IndexPaths::new(&index))
                .with_context(|| format!("reading index metadata in {}", index.display()))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
    }
}

fn build_index(input: &Path, output: &Path, config: &IndexConfig) -> Result<()> {
    config.validate()?;
    if !input.exists() {
        return Err(ConfigError::MissingPath(input.to_path_buf()).into());
    }

    let mut builder = IndexBuilder::new(Analyzer::new(config.analyzer.clone())).with_batch_size(config.batch_size)?;
    if let Some(threads) = config.threads {
        builder = builder.with_threads(threads)?;
    }

    let files = corpus_files(input);
    if files.is_empty() {
        tracing::warn!(input = %input.display(), "no corpus files found");
    }
    for file in &files {
        tracing::info!(file = %file.display(), "processing file");
        let reader = match File::open(file) {
            Ok(f) => BufReader::new(f),
            Err(e) => {
                builder.skip(format!("{}: {e}", file.display()));
                continue;
            }
        };
        let before = builder.document_count();
        builder.extend(CorpusReader::new(reader));
        tracing::debug!(file = %file.display(), docs = builder.document_count() - before, "file indexed");
    }

    let (index, report) = builder.finish();
    let meta = save_index(&IndexPaths::new(output), &index)
        .with_context(|| format!("writing index to {}", output.display()))?;
    tracing::info!(
        output = %output.display(),
        num_docs = meta.num_docs,
        skipped = report.skipped.len(),
        "index build complete"
    );
    Ok(())
}

/// Every regular file under `input`, in path order.
fn corpus_files(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "skipping unreadable entry"),
        }
    }
    files
}
