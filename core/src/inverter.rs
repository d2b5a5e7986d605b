use crate::error::Result;
use crate::index::{unzip_postings, DocId, Posting, TermId};
use crate::writer::IndexWriter;
use std::collections::HashMap;

/// Invert the (term, doc) pairs of one block into `index`.
///
/// Pairs are aggregated in a per-block hash table (`term -> doc -> tf`), so
/// memory is bounded by the block's vocabulary, not the collection's. Terms
/// are then written in ascending id order with doc ids ascending inside each
/// term, which is the order [`IndexWriter::append`] requires.
pub fn invert_block<I>(pairs: I, index: &mut IndexWriter) -> Result<usize>
where
    I: IntoIterator<Item = (TermId, DocId)>,
{
    let mut table: HashMap<TermId, HashMap<DocId, u32>> = HashMap::new();
    for (term_id, doc_id) in pairs {
        *table.entry(term_id).or_default().entry(doc_id).or_insert(0) += 1;
    }

    let mut terms: Vec<TermId> = table.keys().copied().collect();
    terms.sort_unstable();
    for term_id in &terms {
        let Some(docs) = table.remove(term_id) else { continue };
        let mut postings: Vec<Posting> = docs
            .into_iter()
            .map(|(doc_id, term_frequency)| Posting { doc_id, term_frequency })
            .collect();
        postings.sort_unstable_by_key(|p| p.doc_id);
        let (doc_ids, tfs) = unzip_postings(&postings);
        index.append(*term_id, &doc_ids, &tfs)?;
    }
    Ok(terms.len())
}
