use crate::codec::Encoding;
use crate::error::{IndexError, Result};
use crate::id_map::IdMap;
use crate::index::{DocId, TermId};
use crate::inverter::invert_block;
use crate::merger::merge_indices;
use crate::persist::{load_id_maps, now_rfc3339, save_id_maps, save_meta, IndexPaths, MetaFile, META_VERSION};
use crate::ranker::{Ranker, Scoring};
use crate::reader::IndexReader;
use crate::tokenizer::{EnglishNormalizer, Normalizer};
use crate::writer::IndexWriter;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Collection root; every subdirectory is one block.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub index_name: String,
    pub encoding: Encoding,
    /// Keep the per-block index files after a successful merge.
    pub keep_intermediate: bool,
}

impl IndexConfig {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, output_dir: Q) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            index_name: "main_index".to_string(),
            encoding: Encoding::default(),
            keep_intermediate: false,
        }
    }
}

/// Entries directly inside `dir`, sorted by name.
fn sorted_entries(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.map_err(|e| IndexError::Io(io::Error::from(e))))
        .collect()
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Blocked sort-based indexer over a directory-per-block collection.
pub struct BsbiIndex {
    config: IndexConfig,
    paths: IndexPaths,
    term_id_map: IdMap,
    doc_id_map: IdMap,
    intermediate_indices: Vec<String>,
    normalizer: Arc<dyn Normalizer>,
    searcher: OnceLock<Searcher>,
}

impl BsbiIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_normalizer(config, Arc::new(EnglishNormalizer))
    }

    pub fn with_normalizer(config: IndexConfig, normalizer: Arc<dyn Normalizer>) -> Self {
        let paths = IndexPaths::new(&config.output_dir);
        Self {
            config,
            paths,
            term_id_map: IdMap::new(),
            doc_id_map: IdMap::new(),
            intermediate_indices: Vec::new(),
            normalizer,
            searcher: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn paths(&self) -> &IndexPaths { &self.paths }

    pub fn term_id_map(&self) -> &IdMap { &self.term_id_map }

    pub fn doc_id_map(&self) -> &IdMap { &self.doc_id_map }

    /// Block names: the subdirectories of the collection, in name order.
    pub fn blocks(&self) -> Result<Vec<String>> {
        Ok(sorted_entries(&self.config.data_dir)?
            .into_iter()
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect())
    }

    /// Normalize every file of `block` into (term id, doc id) pairs. The
    /// document key is `"<block>/<file name>"`.
    pub fn parse_block(&mut self, block: &str) -> Result<Vec<(TermId, DocId)>> {
        let mut pairs = Vec::new();
        for entry in sorted_entries(&self.config.data_dir.join(block))? {
            if !entry.file_type().is_file() {
                continue;
            }
            let key = format!("{block}/{}", entry.file_name().to_string_lossy());
            let doc_id = self.doc_id_map.id_of(&key);
            let text = read_lossy(entry.path())?;
            for term in self.normalizer.normalize(&text) {
                pairs.push((self.term_id_map.id_of(&term), doc_id));
            }
        }
        Ok(pairs)
    }

    /// Invert every block into an intermediate index, persist the id maps,
    /// then merge the intermediate indices into the main index.
    pub fn index(&mut self) -> Result<MetaFile> {
        fs::create_dir_all(&self.paths.root)?;
        self.searcher = OnceLock::new();
        self.intermediate_indices.clear();

        let blocks = self.blocks()?;
        for block in &blocks {
            let pairs = self.parse_block(block)?;
            let path = self.paths.intermediate(block);
            let mut writer = IndexWriter::create(&path, self.config.encoding)?;
            let terms = invert_block(pairs, &mut writer)?;
            writer.close()?;
            tracing::info!(block = %block, terms, docs = writer.document_count(), "block inverted");
            self.intermediate_indices.push(block.clone());
        }

        save_id_maps(&self.paths, &self.term_id_map, &self.doc_id_map)?;

        let merged_path = self.paths.index(&self.config.index_name);
        let mut merged = IndexWriter::create(&merged_path, self.config.encoding)?;
        {
            let readers = self
                .intermediate_indices
                .iter()
                .map(|block| IndexReader::open(self.paths.intermediate(block)))
                .collect::<Result<Vec<_>>>()?;
            merge_indices(&readers, &mut merged)?;
        }
        merged.close()?;

        let meta = MetaFile {
            num_docs: merged.document_count() as u32,
            num_terms: merged.term_count() as u32,
            num_blocks: blocks.len() as u32,
            encoding: self.config.encoding,
            index_name: self.config.index_name.clone(),
            created_at: now_rfc3339(),
            version: META_VERSION,
        };
        save_meta(&self.paths, &meta)?;

        if !self.config.keep_intermediate {
            for block in &self.intermediate_indices {
                fs::remove_file(self.paths.intermediate(block))?;
            }
        }
        tracing::info!(
            output = %self.paths.root.display(),
            blocks = meta.num_blocks,
            docs = meta.num_docs,
            terms = meta.num_terms,
            "index build complete"
        );
        Ok(meta)
    }

    /// The query-time view of the merged index, created on first use.
    ///
    /// Id maps still resident from an indexing pass are reused; otherwise
    /// the persisted ones are loaded.
    pub fn searcher(&self) -> Result<&Searcher> {
        if let Some(searcher) = self.searcher.get() {
            return Ok(searcher);
        }
        let (terms, docs) = if self.term_id_map.is_empty() || self.doc_id_map.is_empty() {
            load_id_maps(&self.paths)?
        } else {
            (self.term_id_map.clone(), self.doc_id_map.clone())
        };
        let reader = IndexReader::open(self.paths.index(&self.config.index_name))?;
        let searcher = Searcher::new(reader, terms, docs, &self.config.data_dir, self.normalizer.clone());
        Ok(self.searcher.get_or_init(|| searcher))
    }

    pub fn retrieve(&self, query: &str, k: usize, mode: Scoring) -> Result<Vec<(f64, String)>> {
        self.searcher()?.retrieve(query, k, mode)
    }

    pub fn retrieve_tfidf(&self, query: &str, k: usize) -> Result<Vec<(f64, String)>> {
        self.retrieve(query, k, Scoring::TfIdf)
    }

    pub fn retrieve_bm25(&self, query: &str, k: usize) -> Result<Vec<(f64, String)>> {
        self.retrieve(query, k, Scoring::Bm25)
    }
}

/// Reorders a top-K result list, e.g. with a learned ranking model.
pub trait Reranker {
    /// `contents[i]` is the text of `hits[i]`. Must return the same hits.
    fn rerank(&self, query: &str, hits: Vec<(f64, String)>, contents: &[String]) -> Result<Vec<(f64, String)>>;
}

/// Long-lived, shareable query handle over a merged index.
pub struct Searcher {
    reader: IndexReader,
    term_id_map: IdMap,
    doc_id_map: IdMap,
    data_dir: PathBuf,
    normalizer: Arc<dyn Normalizer>,
}

impl Searcher {
    pub fn new<P: AsRef<Path>>(
        reader: IndexReader,
        term_id_map: IdMap,
        doc_id_map: IdMap,
        data_dir: P,
        normalizer: Arc<dyn Normalizer>,
    ) -> Self {
        Self { reader, term_id_map, doc_id_map, data_dir: data_dir.as_ref().to_path_buf(), normalizer }
    }

    /// Load the persisted id maps and open `<index_name>.index` in `output_dir`.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        output_dir: P,
        index_name: &str,
        data_dir: Q,
        normalizer: Arc<dyn Normalizer>,
    ) -> Result<Self> {
        let paths = IndexPaths::new(output_dir);
        let (terms, docs) = load_id_maps(&paths)?;
        let reader = IndexReader::open(paths.index(index_name))?;
        Ok(Self::new(reader, terms, docs, data_dir, normalizer))
    }

    /// Top `k` documents for `query` as `(score, document key)`, best first.
    /// Query terms outside the vocabulary are ignored.
    pub fn retrieve(&self, query: &str, k: usize, mode: Scoring) -> Result<Vec<(f64, String)>> {
        let term_ids: Vec<TermId> = self
            .normalizer
            .normalize(query)
            .iter()
            .filter_map(|term| self.term_id_map.get(term))
            .collect();
        if term_ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let ranked = Ranker::new(&self.reader).rank(&term_ids, k, mode)?;
        tracing::debug!(query, %mode, terms = term_ids.len(), hits = ranked.len(), "query ranked");
        ranked
            .into_iter()
            .map(|(score, doc_id)| Ok((score, self.doc_id_map.key_of(doc_id)?.to_string())))
            .collect()
    }

    pub fn retrieve_then_rerank(
        &self,
        query: &str,
        k: usize,
        mode: Scoring,
        reranker: &dyn Reranker,
    ) -> Result<Vec<(f64, String)>> {
        let hits = self.retrieve(query, k, mode)?;
        let contents = hits
            .iter()
            .map(|(_, key)| self.document_content(key))
            .collect::<Result<Vec<_>>>()?;
        reranker.rerank(query, hits, &contents)
    }

    /// Location of a document inside the collection. Keys must be relative
    /// paths without `..` components.
    pub fn document_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(IndexError::InvalidArgument(format!("invalid document key '{key}'")));
        }
        Ok(self.data_dir.join(rel))
    }

    pub fn document_content(&self, key: &str) -> Result<String> {
        read_lossy(&self.document_path(key)?)
    }

    pub fn reader(&self) -> &IndexReader { &self.reader }

    pub fn term_id_map(&self) -> &IdMap { &self.term_id_map }

    pub fn doc_id_map(&self) -> &IdMap { &self.doc_id_map }

    pub fn document_count(&self) -> u32 { self.reader.document_count() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn whitespace() -> Arc<dyn Normalizer> {
        Arc::new(|text: &str| text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
    }

    #[test]
    fn blocks_are_sorted_directories() {
        let dir = tempdir().unwrap();
        for b in ["2", "0", "1"] {
            fs::create_dir_all(dir.path().join(b)).unwrap();
        }
        fs::write(dir.path().join("README"), "not a block").unwrap();
        let idx = BsbiIndex::new(IndexConfig::new(dir.path(), dir.path().join("out")));
        assert_eq!(idx.blocks().unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn parse_block_assigns_ids_in_file_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/2.txt"), "gamma alpha").unwrap();
        fs::write(dir.path().join("b/1.txt"), "alpha beta alpha").unwrap();
        let mut idx = BsbiIndex::with_normalizer(IndexConfig::new(dir.path(), dir.path().join("out")), whitespace());
        let pairs = idx.parse_block("b").unwrap();
        assert_eq!(pairs, vec![(0, 0), (1, 0), (0, 0), (2, 1), (0, 1)]);
        assert_eq!(idx.doc_id_map().key_of(0).unwrap(), "b/1.txt");
        assert_eq!(idx.term_id_map().get("gamma"), Some(2));
    }

    #[test]
    fn missing_collection_is_an_io_error() {
        let dir = tempdir().unwrap();
        let mut idx = BsbiIndex::new(IndexConfig::new(dir.path().join("nope"), dir.path().join("out")));
        assert!(matches!(idx.index(), Err(IndexError::Io(_))));
    }

    #[test]
    fn document_keys_cannot_escape_the_collection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.index");
        IndexWriter::create(&path, Encoding::VariableByte).unwrap().close().unwrap();
        let searcher = Searcher::new(IndexReader::open(&path).unwrap(), IdMap::new(), IdMap::new(), dir.path(), whitespace());
        assert!(searcher.document_path("../etc/passwd").is_err());
        assert!(searcher.document_path("/etc/passwd").is_err());
        assert!(searcher.document_path("").is_err());
        assert_eq!(searcher.document_path("1/2.txt").unwrap(), dir.path().join("1/2.txt"));
        assert!(searcher.retrieve("anything", 5, Scoring::Bm25).unwrap().is_empty());
    }
}
