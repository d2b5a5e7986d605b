use bsbi_core::{BsbiIndex, IndexConfig, IndexReader, Reranker, Scoring, Searcher};
use bsbi_core::{Encoding, EnglishNormalizer, IndexError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn write_collection(root: &Path) {
    let docs: &[(&str, &str, &str)] = &[
        ("1", "1.txt", "Lipid metabolism in toxemia and normal pregnancy."),
        ("1", "2.txt", "Radioactive iodoacetate was used to alkylate the protein."),
        ("1", "3.txt", "Psychodrama for disturbed children in a clinic."),
        ("2", "4.txt", "Pregnancy toxemia: lipid levels, lipid transport and lipid storage."),
        ("2", "5.txt", "Children with disturbed sleep; children and parents."),
        ("3", "6.txt", "Metabolism of iodoacetate in rat liver."),
        ("3", "7.txt", "The the the and of."),
    ];
    for (block, name, text) in docs {
        let dir = root.join(block);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), text).unwrap();
    }
}

fn build(encoding: Encoding, keep_intermediate: bool) -> (tempfile::TempDir, BsbiIndex) {
    let dir = tempdir().unwrap();
    let data = dir.path().join("collection");
    write_collection(&data);
    let mut config = IndexConfig::new(&data, dir.path().join("index"));
    config.encoding = encoding;
    config.keep_intermediate = keep_intermediate;
    let mut index = BsbiIndex::new(config);
    index.index().unwrap();
    (dir, index)
}

#[test]
fn builds_and_merges_all_blocks() {
    let (_dir, index) = build(Encoding::VariableByte, true);
    let paths = index.paths().clone();
    for block in ["1", "2", "3"] {
        assert!(paths.intermediate(block).exists());
    }
    let reader = IndexReader::open(paths.index("main_index")).unwrap();
    // the all-stopword document has no length entry
    assert_eq!(reader.document_count(), 6);
    assert_eq!(index.doc_id_map().len(), 7);
    assert_eq!(reader.term_count(), index.term_id_map().len());

    let lipid = index.term_id_map().get("lipid").unwrap();
    let (docs, tfs) = reader.get_postings_list(lipid).unwrap();
    let keys: Vec<&str> = docs.iter().map(|&d| index.doc_id_map().key_of(d).unwrap()).collect();
    assert_eq!(keys, vec!["1/1.txt", "2/4.txt"]);
    assert_eq!(tfs, vec![1, 3]);

    let meta = bsbi_core::persist::load_meta(&paths).unwrap();
    assert_eq!(meta.num_blocks, 3);
    assert_eq!(meta.num_docs, 6);
    assert_eq!(meta.encoding, Encoding::VariableByte);
}

#[test]
fn intermediate_indices_are_removed_by_default() {
    let (_dir, index) = build(Encoding::Standard, false);
    assert!(!index.paths().intermediate("1").exists());
    assert!(index.paths().index("main_index").exists());
}

#[test]
fn both_encodings_rank_identically() {
    let (_a, vbe) = build(Encoding::VariableByte, false);
    let (_b, fixed) = build(Encoding::Standard, false);
    for mode in [Scoring::TfIdf, Scoring::Bm25] {
        let q = "lipid pregnancy children";
        assert_eq!(vbe.retrieve(q, 10, mode).unwrap(), fixed.retrieve(q, 10, mode).unwrap());
    }
}

#[test]
fn retrieval_ranks_the_obvious_document_first() {
    let (_dir, index) = build(Encoding::VariableByte, false);
    let top = index.retrieve_bm25("lipid toxemia", 3).unwrap();
    assert_eq!(top[0].1, "2/4.txt");
    assert!(top.len() <= 3);
    assert!(top.windows(2).all(|w| w[0].0 >= w[1].0));

    let top = index.retrieve_tfidf("disturbed children", 10).unwrap();
    assert_eq!(top[0].1, "2/5.txt");
    assert_eq!(top.len(), 2);
}

#[test]
fn unknown_and_empty_queries() {
    let (_dir, index) = build(Encoding::VariableByte, false);
    let base = index.retrieve_bm25("iodoacetate metabolism", 10).unwrap();
    let noisy = index.retrieve_bm25("iodoacetate zyzzyva metabolism", 10).unwrap();
    assert_eq!(base, noisy);
    assert!(index.retrieve_bm25("", 10).unwrap().is_empty());
    assert!(index.retrieve_tfidf("the and of", 10).unwrap().is_empty());
    assert!(index.retrieve_tfidf("qwertyuiop", 10).unwrap().is_empty());
    assert!(index.retrieve_bm25("lipid", 0).unwrap().is_empty());
}

#[test]
fn fresh_process_loads_persisted_maps() {
    let (dir, built) = build(Encoding::VariableByte, false);
    let expected = built.retrieve_bm25("iodoacetate", 5).unwrap();

    let fresh = BsbiIndex::new(built.config().clone());
    assert!(fresh.term_id_map().is_empty());
    assert_eq!(fresh.retrieve_bm25("iodoacetate", 5).unwrap(), expected);
    // second call reuses the same searcher
    let first: *const Searcher = fresh.searcher().unwrap();
    let second: *const Searcher = fresh.searcher().unwrap();
    assert_eq!(first, second);

    let searcher = Searcher::open(
        dir.path().join("index"),
        "main_index",
        dir.path().join("collection"),
        Arc::new(EnglishNormalizer),
    )
    .unwrap();
    assert_eq!(searcher.retrieve("iodoacetate", 5, Scoring::Bm25).unwrap(), expected);
    assert!(searcher.document_content(&expected[0].1).unwrap().contains("odoacetate"));
}

struct ShortestFirst;

impl Reranker for ShortestFirst {
    fn rerank(&self, _query: &str, hits: Vec<(f64, String)>, contents: &[String]) -> bsbi_core::Result<Vec<(f64, String)>> {
        let mut paired: Vec<_> = hits.into_iter().zip(contents.iter().map(String::len)).collect();
        paired.sort_by_key(|(_, len)| *len);
        Ok(paired.into_iter().map(|(hit, _)| hit).collect())
    }
}

#[test]
fn reranker_sees_document_contents() {
    let (_dir, index) = build(Encoding::VariableByte, false);
    let searcher = index.searcher().unwrap();
    let hits = searcher.retrieve("iodoacetate", 10, Scoring::Bm25).unwrap();
    let reranked = searcher.retrieve_then_rerank("iodoacetate", 10, Scoring::Bm25, &ShortestFirst).unwrap();
    assert_eq!(reranked.len(), hits.len());
    assert_eq!(reranked[0].1, "3/6.txt");
    assert!(matches!(searcher.document_content("../secret"), Err(IndexError::InvalidArgument(_))));
}

#[test]
fn concurrent_queries_share_one_searcher() {
    let (_dir, index) = build(Encoding::VariableByte, false);
    let searcher = index.searcher().unwrap();
    let queries = ["lipid toxemia", "disturbed children", "iodoacetate metabolism", "pregnancy"];
    let expected: Vec<_> = queries.iter().map(|q| searcher.retrieve(q, 10, Scoring::Bm25).unwrap()).collect();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..25 {
                    for (q, want) in queries.iter().zip(&expected) {
                        assert_eq!(&searcher.retrieve(q, 10, Scoring::Bm25).unwrap(), want);
                    }
                }
            });
        }
    });
}

#[cfg(unix)]
#[test]
fn symlinked_blocks_and_documents_are_indexed() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let outside = dir.path().join("outside");
    fs::create_dir_all(outside.join("linked_block")).unwrap();
    fs::write(outside.join("linked_block/8.txt"), "Zebra migration patterns.").unwrap();
    fs::write(outside.join("9.txt"), "Zebra stripes.").unwrap();

    let data = dir.path().join("collection");
    fs::create_dir_all(data.join("1")).unwrap();
    fs::write(data.join("1/1.txt"), "Lipid metabolism.").unwrap();
    symlink(outside.join("9.txt"), data.join("1/9.txt")).unwrap();
    symlink(outside.join("linked_block"), data.join("2")).unwrap();

    let mut index = BsbiIndex::new(IndexConfig::new(&data, dir.path().join("index")));
    assert_eq!(index.blocks().unwrap(), vec!["1", "2"]);
    index.index().unwrap();
    let mut keys: Vec<String> = index.retrieve_tfidf("zebra", 10).unwrap().into_iter().map(|(_, k)| k).collect();
    keys.sort();
    assert_eq!(keys, vec!["1/9.txt", "2/8.txt"]);
}
