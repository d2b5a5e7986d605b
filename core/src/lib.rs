//! Blocked sort-based indexing over a directory-per-block text collection.
//!
//! Each block is inverted in memory and written to an intermediate index
//! file, the intermediate indices are merged with an external k-way merge,
//! and the merged index is queried term-at-a-time with TF-IDF or BM25.

pub mod bsbi;
pub mod codec;
pub mod error;
pub mod eval;
pub mod id_map;
pub mod index;
pub mod inverter;
pub mod merger;
pub mod persist;
pub mod ranker;
pub mod reader;
pub mod tokenizer;
pub mod writer;

pub use bsbi::{BsbiIndex, IndexConfig, Reranker, Searcher};
pub use codec::{Encoding, PostingsCodec, StandardPostings, VbePostings};
pub use error::{IndexError, Result};
pub use id_map::IdMap;
pub use index::{DictionaryEntry, DocId, Posting, TermId, TermPostings};
pub use reader::IndexReader;
pub use ranker::{Ranker, Scoring};
pub use tokenizer::{EnglishNormalizer, Normalizer};
pub use writer::IndexWriter;
