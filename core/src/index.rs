use serde::{Deserialize, Serialize};

pub type TermId = u32;
pub type DocId = u32;

/// Leading and trailing magic of every index file.
pub const MAGIC: &[u8; 4] = b"BSBI";
pub const FORMAT_VERSION: u8 = 1;
/// magic, version, encoding tag, two reserved bytes
pub const HEADER_LEN: u64 = 8;
/// dictionary offset, document-length offset, magic
pub const FOOTER_LEN: u64 = 20;

/// One decoded term: id, postings list and parallel tf list.
pub type TermPostings = (TermId, Vec<DocId>, Vec<u32>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_frequency: u32,
}

/// Location and size of one term's postings inside an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Absolute byte offset of the postings blob from the start of the file.
    pub offset: u64,
    pub postings_len: u32,
    pub tf_len: u32,
    /// Number of documents in the postings list.
    pub doc_freq: u32,
}

impl DictionaryEntry {
    pub fn byte_len(&self) -> u64 {
        self.postings_len as u64 + self.tf_len as u64
    }
}

/// Zip a postings list and its parallel tf list into `Posting`s.
pub fn zip_postings(doc_ids: &[DocId], tfs: &[u32]) -> Vec<Posting> {
    doc_ids
        .iter()
        .zip(tfs)
        .map(|(&doc_id, &term_frequency)| Posting { doc_id, term_frequency })
        .collect()
}

/// Split `Posting`s back into the parallel postings and tf lists.
pub fn unzip_postings(postings: &[Posting]) -> (Vec<DocId>, Vec<u32>) {
    postings.iter().map(|p| (p.doc_id, p.term_frequency)).unzip()
}
