//! Retrieval effectiveness metrics over binary relevance judgments.

use crate::bsbi::Searcher;
use crate::error::{IndexError, Result};
use crate::ranker::Scoring;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Rank-biased precision with persistence `p`.
pub fn rbp(ranking: &[u8], p: f64) -> f64 {
    let score: f64 = ranking
        .iter()
        .enumerate()
        .map(|(i, &rel)| rel as f64 * p.powi(i as i32))
        .sum();
    (1.0 - p) * score
}

/// Discounted cumulative gain with a `log2(rank + 1)` discount.
pub fn dcg(ranking: &[u8]) -> f64 {
    ranking
        .iter()
        .enumerate()
        .map(|(i, &rel)| rel as f64 / ((i + 2) as f64).log2())
        .sum()
}

/// Fraction of relevant documents in the first `k` positions.
pub fn precision_at(ranking: &[u8], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits: u32 = ranking.iter().take(k).map(|&r| r as u32).sum();
    hits as f64 / k as f64
}

/// Average precision; 0 when nothing in the ranking is relevant.
pub fn average_precision(ranking: &[u8]) -> f64 {
    let relevant: u32 = ranking.iter().map(|&r| r as u32).sum();
    if relevant == 0 {
        return 0.0;
    }
    let total: f64 = ranking
        .iter()
        .enumerate()
        .filter(|(_, rel)| **rel > 0)
        .map(|(i, _)| precision_at(ranking, i + 1))
        .sum();
    total / relevant as f64
}

/// Relevance judgments: query id -> relevant document numbers.
#[derive(Debug, Default, Clone)]
pub struct Qrels {
    relevant: HashMap<String, HashSet<u32>>,
}

impl Qrels {
    /// Parse `query_id doc_number` lines; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut relevant: HashMap<String, HashSet<u32>> = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let (Some(qid), Some(doc)) = (parts.next(), parts.next()) else {
                if line.trim().is_empty() {
                    continue;
                }
                return Err(IndexError::InvalidArgument(format!("qrels line {}: expected 'qid doc'", lineno + 1)));
            };
            let doc: u32 = doc
                .parse()
                .map_err(|_| IndexError::InvalidArgument(format!("qrels line {}: bad doc number '{doc}'", lineno + 1)))?;
            relevant.entry(qid.to_string()).or_default().insert(doc);
        }
        Ok(Self { relevant })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn is_relevant(&self, qid: &str, doc: u32) -> bool {
        self.relevant.get(qid).is_some_and(|docs| docs.contains(&doc))
    }

    pub fn query_count(&self) -> usize { self.relevant.len() }
}

/// Parse `query_id query text...` lines.
pub fn parse_queries(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let qid = parts.next()?;
            Some((qid.to_string(), parts.collect::<Vec<_>>().join(" ")))
        })
        .collect()
}

/// Numeric document id of a key such as `"3/166.txt"`: its file stem.
pub fn doc_number(key: &str) -> Option<u32> {
    Path::new(key).file_stem()?.to_str()?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalSummary {
    pub queries: usize,
    pub rbp: f64,
    pub dcg: f64,
    pub ap: f64,
}

/// Run every query and average RBP (p = 0.8), DCG and AP over them.
pub fn evaluate(
    searcher: &Searcher,
    queries: &[(String, String)],
    qrels: &Qrels,
    k: usize,
    mode: Scoring,
) -> Result<EvalSummary> {
    let mut summary = EvalSummary { queries: queries.len(), rbp: 0.0, dcg: 0.0, ap: 0.0 };
    if queries.is_empty() {
        return Ok(summary);
    }
    for (qid, query) in queries {
        let ranking: Vec<u8> = searcher
            .retrieve(query, k, mode)?
            .iter()
            .map(|(_, key)| doc_number(key).is_some_and(|d| qrels.is_relevant(qid, d)) as u8)
            .collect();
        summary.rbp += rbp(&ranking, 0.8);
        summary.dcg += dcg(&ranking);
        summary.ap += average_precision(&ranking);
    }
    let n = queries.len() as f64;
    summary.rbp /= n;
    summary.dcg /= n;
    summary.ap /= n;
    Ok(summary)
}
