use crate::codec::{Encoding, PostingsCodec};
use crate::error::{IndexError, Result};
use crate::index::{zip_postings, DictionaryEntry, DocId, Posting, TermId, TermPostings, FOOTER_LEN, FORMAT_VERSION, HEADER_LEN, MAGIC};
use parking_lot::Mutex;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Read-only view of an index file written by [`crate::IndexWriter`].
///
/// The dictionary and document-length table are loaded at open time;
/// postings are read from disk on demand. Lookups take `&self`, so one
/// reader can be shared between concurrent queries.
pub struct IndexReader {
    path: PathBuf,
    file: Mutex<File>,
    encoding: Encoding,
    dictionary: BTreeMap<TermId, DictionaryEntry>,
    doc_lengths: HashMap<DocId, u32>,
    avg_doc_length: f64,
}

impl IndexReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_LEN + FOOTER_LEN {
            return Err(IndexError::InvalidFormat(format!(
                "{} is too short ({file_len} bytes)",
                path.display()
            )));
        }

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if &header[..4] != MAGIC {
            return Err(IndexError::InvalidFormat(format!("{} has no index header", path.display())));
        }
        if header[4] != FORMAT_VERSION {
            return Err(IndexError::InvalidFormat(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                header[4]
            )));
        }
        let encoding = Encoding::from_tag(header[5])?;

        let footer_start = file_len - FOOTER_LEN;
        file.seek(SeekFrom::Start(footer_start))?;
        let mut footer = [0u8; FOOTER_LEN as usize];
        file.read_exact(&mut footer)?;
        if &footer[16..] != MAGIC {
            return Err(IndexError::InvalidFormat(format!(
                "{} has no footer; the writer was not closed",
                path.display()
            )));
        }
        let dict_offset = read_u64(&footer[..8]);
        let lengths_offset = read_u64(&footer[8..16]);
        if !(HEADER_LEN <= dict_offset && dict_offset <= lengths_offset && lengths_offset <= footer_start) {
            return Err(IndexError::InvalidFormat(format!(
                "footer offsets {dict_offset}/{lengths_offset} out of range"
            )));
        }

        let dict_bytes = read_region(&mut file, dict_offset, lengths_offset)?;
        let entries: Vec<(TermId, DictionaryEntry)> = bincode::deserialize(&dict_bytes)?;
        let mut dictionary = BTreeMap::new();
        for (term_id, entry) in entries {
            let in_region = entry.offset >= HEADER_LEN
                && entry.offset.checked_add(entry.byte_len()).is_some_and(|end| end <= dict_offset);
            if !in_region {
                return Err(IndexError::InvalidFormat(format!(
                    "postings of term {term_id} lie outside the postings region"
                )));
            }
            if dictionary.insert(term_id, entry).is_some() {
                return Err(IndexError::InvalidFormat(format!("term {term_id} listed twice")));
            }
        }

        let length_bytes = read_region(&mut file, lengths_offset, footer_start)?;
        let doc_lengths: HashMap<DocId, u32> = bincode::deserialize(&length_bytes)?;
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.values().map(|&l| l as f64).sum::<f64>() / doc_lengths.len() as f64
        };

        tracing::debug!(path = %path.display(), %encoding, terms = dictionary.len(), docs = doc_lengths.len(), "index opened");
        Ok(Self { path, file: Mutex::new(file), encoding, dictionary, doc_lengths, avg_doc_length })
    }

    /// Postings and tf lists of `term_id`, or [`IndexError::UnknownTerm`].
    pub fn get_postings_list(&self, term_id: TermId) -> Result<(Vec<DocId>, Vec<u32>)> {
        let entry = self.dictionary.get(&term_id).ok_or(IndexError::UnknownTerm(term_id))?;
        let blob = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(entry.offset))?;
            let mut blob = vec![0u8; entry.byte_len() as usize];
            file.read_exact(&mut blob)?;
            blob
        };
        self.decode_entry(entry, &blob)
    }

    /// Same as [`get_postings_list`](Self::get_postings_list), as `Posting`s.
    pub fn get_postings(&self, term_id: TermId) -> Result<Vec<Posting>> {
        let (doc_ids, tfs) = self.get_postings_list(term_id)?;
        Ok(zip_postings(&doc_ids, &tfs))
    }

    fn decode_entry(&self, entry: &DictionaryEntry, blob: &[u8]) -> Result<(Vec<DocId>, Vec<u32>)> {
        let (postings, tfs) = blob.split_at(entry.postings_len as usize);
        let count = entry.doc_freq as usize;
        Ok((self.encoding.decode_postings(postings, count)?, self.encoding.decode_tf(tfs, count)?))
    }

    /// Every term in ascending id order, read lazily with its own file
    /// handle so it does not disturb concurrent lookups.
    pub fn iter_terms(&self) -> Result<TermIter<'_>> {
        let mut input = BufReader::new(File::open(&self.path)?);
        input.seek(SeekFrom::Start(HEADER_LEN))?;
        Ok(TermIter { reader: self, entries: self.dictionary.iter(), input, pos: HEADER_LEN })
    }

    pub fn document_frequency(&self, term_id: TermId) -> Option<u32> {
        self.dictionary.get(&term_id).map(|e| e.doc_freq)
    }

    pub fn document_length(&self, doc_id: DocId) -> Option<u32> {
        self.doc_lengths.get(&doc_id).copied()
    }

    /// Number of documents in the length table, i.e. the collection size N.
    pub fn document_count(&self) -> u32 { self.doc_lengths.len() as u32 }

    /// Mean document length, 0 for an index without documents.
    pub fn average_document_length(&self) -> f64 { self.avg_doc_length }

    pub fn term_count(&self) -> usize { self.dictionary.len() }

    pub fn encoding(&self) -> Encoding { self.encoding }

    pub fn path(&self) -> &Path { &self.path }
}

/// Forward-only cursor returned by [`IndexReader::iter_terms`].
pub struct TermIter<'a> {
    reader: &'a IndexReader,
    entries: btree_map::Iter<'a, TermId, DictionaryEntry>,
    input: BufReader<File>,
    pos: u64,
}

impl TermIter<'_> {
    fn read_next(&mut self, term_id: TermId, entry: &DictionaryEntry) -> Result<TermPostings> {
        if entry.offset != self.pos {
            self.input.seek(SeekFrom::Start(entry.offset))?;
        }
        let mut blob = vec![0u8; entry.byte_len() as usize];
        self.input.read_exact(&mut blob)?;
        self.pos = entry.offset + entry.byte_len();
        let (doc_ids, tfs) = self.reader.decode_entry(entry, &blob)?;
        Ok((term_id, doc_ids, tfs))
    }
}

impl Iterator for TermIter<'_> {
    type Item = Result<TermPostings>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&term_id, entry) = self.entries.next()?;
        Some(self.read_next(term_id, entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn read_region(file: &mut File, start: u64, end: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; (end - start) as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
