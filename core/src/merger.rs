use crate::error::Result;
use crate::index::{DocId, TermId, TermPostings};
use crate::reader::IndexReader;
use crate::writer::IndexWriter;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub terms: usize,
    /// Postings whose (term, doc) pair appeared in more than one input.
    pub collisions: usize,
}

/// External k-way merge of intermediate indices into `merged`.
///
/// Each reader is consumed once, forward only, and only the current term
/// of every reader is held in memory.
pub fn merge_indices(readers: &[IndexReader], merged: &mut IndexWriter) -> Result<MergeStats> {
    let streams = readers.iter().map(IndexReader::iter_terms).collect::<Result<Vec<_>>>()?;
    let stats = merge_term_streams(streams, merged)?;
    tracing::info!(inputs = readers.len(), terms = stats.terms, path = %merged.path().display(), "merge finished");
    Ok(stats)
}

/// Merge ascending term streams, appending each distinct term exactly once.
pub fn merge_term_streams<I>(streams: Vec<I>, merged: &mut IndexWriter) -> Result<MergeStats>
where
    I: Iterator<Item = Result<TermPostings>>,
{
    let mut cursors = streams;
    let mut heads: Vec<Option<(Vec<DocId>, Vec<u32>)>> = (0..cursors.len()).map(|_| None).collect();
    let mut heap: BinaryHeap<Reverse<(TermId, usize)>> = BinaryHeap::with_capacity(cursors.len());
    for idx in 0..cursors.len() {
        advance(&mut cursors, &mut heads, &mut heap, idx)?;
    }

    let mut stats = MergeStats::default();
    while let Some(Reverse((term_id, idx))) = heap.pop() {
        let Some((mut doc_ids, mut tfs)) = heads[idx].take() else { continue };
        advance(&mut cursors, &mut heads, &mut heap, idx)?;

        while let Some(&Reverse((next_term, next_idx))) = heap.peek() {
            if next_term != term_id {
                break;
            }
            heap.pop();
            if let Some((other_docs, other_tfs)) = heads[next_idx].take() {
                let (d, t, collisions) = union_postings(&doc_ids, &tfs, &other_docs, &other_tfs);
                if collisions > 0 {
                    tracing::warn!(term_id, collisions, "doc ids shared between blocks; summing frequencies");
                }
                stats.collisions += collisions;
                doc_ids = d;
                tfs = t;
            }
            advance(&mut cursors, &mut heads, &mut heap, next_idx)?;
        }

        merged.append(term_id, &doc_ids, &tfs)?;
        stats.terms += 1;
    }
    Ok(stats)
}

fn advance<I>(
    cursors: &mut [I],
    heads: &mut [Option<(Vec<DocId>, Vec<u32>)>],
    heap: &mut BinaryHeap<Reverse<(TermId, usize)>>,
    idx: usize,
) -> Result<()>
where
    I: Iterator<Item = Result<TermPostings>>,
{
    if let Some(item) = cursors[idx].next() {
        let (term_id, doc_ids, tfs) = item?;
        heads[idx] = Some((doc_ids, tfs));
        heap.push(Reverse((term_id, idx)));
    }
    Ok(())
}

/// Two-pointer union of two sorted postings lists.
///
/// Blocks own disjoint doc id ranges, so equal doc ids only occur in a
/// mis-partitioned collection; their frequencies are summed and counted.
pub fn union_postings(
    a_docs: &[DocId],
    a_tfs: &[u32],
    b_docs: &[DocId],
    b_tfs: &[u32],
) -> (Vec<DocId>, Vec<u32>, usize) {
    let mut docs = Vec::with_capacity(a_docs.len() + b_docs.len());
    let mut tfs = Vec::with_capacity(a_docs.len() + b_docs.len());
    let mut collisions = 0;
    let (mut i, mut j) = (0, 0);
    while i < a_docs.len() && j < b_docs.len() {
        if a_docs[i] < b_docs[j] {
            docs.push(a_docs[i]);
            tfs.push(a_tfs[i]);
            i += 1;
        } else if b_docs[j] < a_docs[i] {
            docs.push(b_docs[j]);
            tfs.push(b_tfs[j]);
            j += 1;
        } else {
            docs.push(a_docs[i]);
            tfs.push(a_tfs[i] + b_tfs[j]);
            collisions += 1;
            i += 1;
            j += 1;
        }
    }
    docs.extend_from_slice(&a_docs[i..]);
    tfs.extend_from_slice(&a_tfs[i..]);
    docs.extend_from_slice(&b_docs[j..]);
    tfs.extend_from_slice(&b_tfs[j..]);
    (docs, tfs, collisions)
}
