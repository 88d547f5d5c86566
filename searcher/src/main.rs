use anyhow::{Context, Result};
use clap::Parser;
use fieldwise_core::trec::QueryFormat;
use fieldwise_core::{SearchConfig, Similarity};
use searcher::{boosts_from_assignments, run, ModelParams, SearchRun};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "searcher")]
#[command(about = "Run a query file against an index and write a TREC run", long_about = None)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Query file
    #[arg(long)]
    queries: PathBuf,
    /// Run file to write
    #[arg(long)]
    output: PathBuf,
    /// JSON search configuration; the flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// lines (one query per line) or records (.I/.W blocks)
    #[arg(long)]
    query_format: Option<QueryFormat>,
    /// Use the .I ids of query records instead of sequential numbers
    #[arg(long, default_value_t = false)]
    record_ids: bool,
    /// classic, bm25, lm-dirichlet, lm-jelinek-mercer or boolean
    #[arg(long)]
    model: Option<Similarity>,
    #[arg(long)]
    k1: Option<f64>,
    #[arg(long)]
    b: Option<f64>,
    #[arg(long)]
    mu: Option<f64>,
    #[arg(long)]
    lambda: Option<f64>,
    /// Field boost as field=weight; repeat per field
    #[arg(long = "boost")]
    boosts: Vec<String>,
    /// Hits written per query
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    run_tag: Option<String>,
    #[arg(long)]
    max_clauses: Option<usize>,
    /// Worker threads for running queries
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SearchConfig::from_json_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => SearchConfig::default(),
    };
    if let Some(model) = args.model {
        config.similarity = model;
    }
    let params = ModelParams { k1: args.k1, b: args.b, mu: args.mu, lambda: args.lambda };
    config.similarity = params.apply(config.similarity)?;
    if let Some(boosts) = boosts_from_assignments(&args.boosts)? {
        config.boosts = boosts;
    }
    if let Some(format) = args.query_format {
        config.query_format = format;
    }
    config.record_ids |= args.record_ids;
    if let Some(k) = args.top_k {
        config.top_k = k;
    }
    if let Some(tag) = args.run_tag {
        config.run_tag = tag;
    }
    if let Some(max) = args.max_clauses {
        config.max_clauses = max;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }

    let summary = run(&SearchRun {
        index_dir: args.index,
        queries: args.queries,
        output: args.output,
        config,
    })?;
    tracing::info!(queries = summary.queries, lines = summary.lines, "search complete");
    Ok(())
}
