use crate::codec::Encoding;
use crate::error::Result;
use crate::id_map::IdMap;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const META_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub num_blocks: u32,
    pub encoding: Encoding,
    pub index_name: String,
    pub created_at: String,
    pub version: u32,
}

/// File layout of an index output directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn terms(&self) -> PathBuf { self.root.join("terms.dict") }
    pub fn docs(&self) -> PathBuf { self.root.join("docs.dict") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn index(&self, name: &str) -> PathBuf { self.root.join(format!("{name}.index")) }
    pub fn intermediate(&self, block: &str) -> PathBuf {
        self.index(&format!("intermediate_index_{block}"))
    }
}

fn save_id_map(path: &Path, map: &IdMap) -> Result<()> {
    let mut f = File::create(path)?;
    let bytes = bincode::serialize(map)?;
    f.write_all(&bytes)?;
    Ok(())
}

fn load_id_map(path: &Path) -> Result<IdMap> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let map = bincode::deserialize(&buf)?;
    Ok(map)
}

/// Persist the term and document id maps.
pub fn save_id_maps(paths: &IndexPaths, terms: &IdMap, docs: &IdMap) -> Result<()> {
    create_dir_all(&paths.root)?;
    save_id_map(&paths.terms(), terms)?;
    save_id_map(&paths.docs(), docs)?;
    Ok(())
}

/// Load the (term, document) id maps.
pub fn load_id_maps(paths: &IndexPaths) -> Result<(IdMap, IdMap)> {
    Ok((load_id_map(&paths.terms())?, load_id_map(&paths.docs())?))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
