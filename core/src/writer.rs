use crate::codec::{Encoding, PostingsCodec};
use crate::error::{IndexError, Result};
use crate::index::{DictionaryEntry, DocId, TermId, FORMAT_VERSION, MAGIC};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Streams postings to an index file one term at a time.
///
/// Postings are written as soon as they are appended; the dictionary and
/// the document-length table stay in memory and are written by [`close`].
/// A writer that is dropped without being closed closes itself, so the file
/// is complete on every exit path.
///
/// [`close`]: IndexWriter::close
pub struct IndexWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    encoding: Encoding,
    offset: u64,
    dictionary: Vec<(TermId, DictionaryEntry)>,
    doc_lengths: BTreeMap<DocId, u32>,
    scratch: Vec<u8>,
}

impl IndexWriter {
    /// Create (or truncate) the index file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, encoding: Encoding) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(MAGIC)?;
        out.write_all(&[FORMAT_VERSION, encoding.tag(), 0, 0])?;
        Ok(Self {
            path,
            out: Some(out),
            encoding,
            offset: crate::index::HEADER_LEN,
            dictionary: Vec::new(),
            doc_lengths: BTreeMap::new(),
            scratch: Vec::new(),
        })
    }

    /// Append the postings of one term.
    ///
    /// # Panics
    ///
    /// Term ids must be strictly increasing across calls, `doc_ids` must be
    /// non-empty and strictly increasing, and `tfs` must be the same length
    /// with every frequency at least 1.
    pub fn append(&mut self, term_id: TermId, doc_ids: &[DocId], tfs: &[u32]) -> Result<()> {
        if let Some(&(last, _)) = self.dictionary.last() {
            assert!(term_id > last, "term {term_id} appended after term {last}");
        }
        assert!(!doc_ids.is_empty(), "term {term_id} appended with an empty postings list");
        assert_eq!(doc_ids.len(), tfs.len(), "term {term_id}: postings and tf lists differ in length");
        assert!(
            doc_ids.windows(2).all(|w| w[0] < w[1]),
            "term {term_id}: postings list is not strictly increasing"
        );
        assert!(tfs.iter().all(|&tf| tf >= 1), "term {term_id}: zero term frequency");
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| IndexError::InvalidArgument(format!("{} is already closed", self.path.display())))?;

        self.scratch.clear();
        self.encoding.encode_postings(doc_ids, &mut self.scratch);
        let postings_len = self.scratch.len();
        self.encoding.encode_tf(tfs, &mut self.scratch);
        let tf_len = self.scratch.len() - postings_len;
        out.write_all(&self.scratch)?;

        self.dictionary.push((
            term_id,
            DictionaryEntry {
                offset: self.offset,
                postings_len: postings_len as u32,
                tf_len: tf_len as u32,
                doc_freq: doc_ids.len() as u32,
            },
        ));
        self.offset += self.scratch.len() as u64;
        for (&doc_id, &tf) in doc_ids.iter().zip(tfs) {
            *self.doc_lengths.entry(doc_id).or_insert(0) += tf;
        }
        Ok(())
    }

    /// Write the dictionary, the document-length table and the footer.
    /// Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        let dict_offset = self.offset;
        let dict_bytes = bincode::serialize(&self.dictionary)?;
        out.write_all(&dict_bytes)?;
        let lengths_offset = dict_offset + dict_bytes.len() as u64;
        let length_bytes = bincode::serialize(&self.doc_lengths)?;
        out.write_all(&length_bytes)?;
        out.write_all(&dict_offset.to_le_bytes())?;
        out.write_all(&lengths_offset.to_le_bytes())?;
        out.write_all(MAGIC)?;
        out.flush()?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        tracing::debug!(
            path = %self.path.display(),
            terms = self.dictionary.len(),
            docs = self.doc_lengths.len(),
            "index closed"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn encoding(&self) -> Encoding { self.encoding }

    pub fn term_count(&self) -> usize { self.dictionary.len() }

    pub fn document_count(&self) -> usize { self.doc_lengths.len() }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if self.out.is_some() {
            if let Err(err) = self.close() {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to close index on drop");
            }
        }
    }
}
