use anyhow::{Context, Result};
use fieldwise_core::persist::{load_index, IndexPaths};
use fieldwise_core::trec::{read_queries, write_run};
use fieldwise_core::{ConfigError, FieldBoosts, Query, SearchConfig, Searcher, Similarity};
use rayon::ThreadPoolBuilder;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Inputs of one batch search.
#[derive(Debug, Clone)]
pub struct SearchRun {
    pub index_dir: PathBuf,
    pub queries: PathBuf,
    pub output: PathBuf,
    pub config: SearchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub queries: usize,
    pub lines: usize,
}

/// Model parameters given on the command line, applied over a base model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelParams {
    pub k1: Option<f64>,
    pub b: Option<f64>,
    pub mu: Option<f64>,
    pub lambda: Option<f64>,
}

impl ModelParams {
    pub fn apply(&self, model: Similarity) -> Result<Similarity, ConfigError> {
        let model = match model {
            Similarity::Bm25 { k1, b } => Similarity::Bm25 {
                k1: self.k1.unwrap_or(k1),
                b: self.b.unwrap_or(b),
            },
            Similarity::LmDirichlet { mu } => Similarity::LmDirichlet { mu: self.mu.unwrap_or(mu) },
            Similarity::LmJelinekMercer { lambda } => Similarity::LmJelinekMercer {
                lambda: self.lambda.unwrap_or(lambda),
            },
            other => other,
        };
        let accepts = |name: &str| match model {
            Similarity::Bm25 { .. } => name == "k1" || name == "b",
            Similarity::LmDirichlet { .. } => name == "mu",
            Similarity::LmJelinekMercer { .. } => name == "lambda",
            Similarity::Classic | Similarity::Boolean => false,
        };
        for (name, value) in [("k1", self.k1), ("b", self.b), ("mu", self.mu), ("lambda", self.lambda)] {
            if let Some(v) = value.filter(|_| !accepts(name)) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    value: v.to_string(),
                    reason: "does not apply to the selected model",
                });
            }
        }
        Ok(model)
    }
}

/// Replace the configured boosts with `field=weight` assignments, if any.
pub fn boosts_from_assignments(assignments: &[String]) -> Result<Option<FieldBoosts>, ConfigError> {
    if assignments.is_empty() {
        return Ok(None);
    }
    let mut boosts = FieldBoosts::empty();
    for a in assignments {
        let (field, weight) = FieldBoosts::parse_assignment(a)?;
        boosts.set(field, weight)?;
    }
    Ok(Some(boosts))
}

/// Run every query of the query file and write a TREC run.
pub fn run(job: &SearchRun) -> Result<RunSummary> {
    let config = &job.config;
    config.validate()?;
    for path in [&job.index_dir, &job.queries] {
        if !path.exists() {
            return Err(ConfigError::MissingPath(path.clone()).into());
        }
    }

    let index = load_index(&IndexPaths::new(&job.index_dir))
        .with_context(|| format!("loading index from {}", job.index_dir.display()))?;
    let file = File::open(&job.queries).with_context(|| format!("opening {}", job.queries.display()))?;
    let records = read_queries(BufReader::new(file), config.query_format, config.record_ids)
        .with_context(|| format!("reading {}", job.queries.display()))?;
    tracing::info!(
        num_docs = index.document_count(),
        queries = records.len(),
        model = %config.similarity,
        "running queries"
    );

    let queries: Vec<Query> = records
        .iter()
        .map(|r| Query::new(r.text.clone(), config.boosts.clone()))
        .collect();
    let pool = match config.threads {
        Some(n) => Some(ThreadPoolBuilder::new().num_threads(n).build()?),
        None => None,
    };
    let searcher = Searcher::new(&index, config.similarity).with_max_clauses(config.max_clauses);
    let results = searcher.execute_batch(&queries, config.top_k, pool.as_ref());

    let out = File::create(&job.output).with_context(|| format!("creating {}", job.output.display()))?;
    let mut out = BufWriter::new(out);
    let mut lines = 0;
    for (record, hits) in records.iter().zip(&results) {
        lines += write_run(&mut out, &record.id, hits, &config.run_tag)?;
        tracing::debug!(query = %record.id, hits = hits.len(), "query done");
    }
    out.flush()?;

    tracing::info!(output = %job.output.display(), lines, "run written");
    Ok(RunSummary {
        queries: records.len(),
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_override_defaults() {
        let params = ModelParams {
            k1: Some(2.0),
            ..ModelParams::default()
        };
        assert_eq!(
            params.apply(Similarity::default()).unwrap(),
            Similarity::Bm25 { k1: 2.0, b: 0.75 }
        );
    }

    #[test]
    fn params_for_another_model_are_rejected() {
        let params = ModelParams {
            mu: Some(1000.0),
            ..ModelParams::default()
        };
        assert!(params.apply(Similarity::Boolean).is_err());
        assert!(params.apply(Similarity::default()).is_err());
        assert_eq!(
            params.apply(Similarity::LmDirichlet { mu: 2000.0 }).unwrap(),
            Similarity::LmDirichlet { mu: 1000.0 }
        );
    }

    #[test]
    fn boost_assignments() {
        assert_eq!(boosts_from_assignments(&[]).unwrap(), None);
        let boosts = boosts_from_assignments(&["title=2".into(), "contents=1".into()])
            .unwrap()
            .unwrap();
        assert_eq!(boosts.len(), 2);
        assert!(boosts_from_assignments(&["title:2".into()]).is_err());
    }
}
