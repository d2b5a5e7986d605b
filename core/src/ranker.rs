//! Term-at-a-time scoring over a merged index.

use crate::error::{IndexError, Result};
use crate::index::{DocId, TermId};
use crate::reader::IndexReader;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const BM25_K1: f64 = 1.6;
pub const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    TfIdf,
    #[default]
    Bm25,
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scoring::TfIdf => f.write_str("tfidf"),
            Scoring::Bm25 => f.write_str("bm25"),
        }
    }
}

impl FromStr for Scoring {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tfidf" | "tf-idf" => Ok(Scoring::TfIdf),
            "bm25" => Ok(Scoring::Bm25),
            other => Err(IndexError::InvalidArgument(format!("unknown scoring '{other}'"))),
        }
    }
}

/// `log10(N / df)`
pub fn idf(n: u32, df: u32) -> f64 {
    (n as f64 / df as f64).log10()
}

/// `1 + log10(tf)`, or 0 for an absent term.
pub fn tf_weight(tf: u32) -> f64 {
    if tf > 0 { 1.0 + (tf as f64).log10() } else { 0.0 }
}

/// Okapi BM25 contribution of one term to one document.
pub fn bm25_weight(idf: f64, tf: u32, doc_len: f64, avg_doc_len: f64) -> f64 {
    let norm = if avg_doc_len > 0.0 {
        (1.0 - BM25_B) + BM25_B * (doc_len / avg_doc_len)
    } else {
        1.0
    };
    let tf = tf as f64;
    idf * (BM25_K1 + 1.0) * tf / (BM25_K1 * norm + tf)
}

/// Scores documents against already-resolved query term ids.
pub struct Ranker<'r> {
    reader: &'r IndexReader,
}

impl<'r> Ranker<'r> {
    pub fn new(reader: &'r IndexReader) -> Self {
        Self { reader }
    }

    /// Accumulate per-document scores. Terms without postings in the index
    /// contribute nothing; every other error is returned.
    pub fn score(&self, term_ids: &[TermId], mode: Scoring) -> Result<HashMap<DocId, f64>> {
        let n = self.reader.document_count();
        let avg_doc_len = self.reader.average_document_length();
        let mut scores: HashMap<DocId, f64> = HashMap::new();
        if n == 0 {
            return Ok(scores);
        }

        for &term_id in term_ids {
            let (doc_ids, tfs) = match self.reader.get_postings_list(term_id) {
                Ok(postings) => postings,
                Err(IndexError::UnknownTerm(_)) => continue,
                Err(err) => return Err(err),
            };
            let idf = idf(n, doc_ids.len() as u32);
            for (&doc_id, &tf) in doc_ids.iter().zip(&tfs) {
                let contribution = match mode {
                    Scoring::TfIdf => tf_weight(tf) * idf,
                    Scoring::Bm25 => {
                        let doc_len = self.reader.document_length(doc_id).unwrap_or(0) as f64;
                        bm25_weight(idf, tf, doc_len, avg_doc_len)
                    }
                };
                *scores.entry(doc_id).or_insert(0.0) += contribution;
            }
        }
        Ok(scores)
    }

    /// Score and keep the best `k`, highest score first.
    pub fn rank(&self, term_ids: &[TermId], k: usize, mode: Scoring) -> Result<Vec<(f64, DocId)>> {
        Ok(top_k(self.score(term_ids, mode)?, k))
    }
}

/// Best `k` documents by descending score; ties go to the lower doc id.
pub fn top_k(scores: HashMap<DocId, f64>, k: usize) -> Vec<(f64, DocId)> {
    let mut scored: Vec<(f64, DocId)> = scores.into_iter().map(|(doc_id, s)| (s, doc_id)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
    scored.truncate(k);
    scored
}
