use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dense bidirectional mapping between strings and `u32` ids.
///
/// Ids are handed out in first-seen order starting at 0 and are never
/// reused. Only the id-ordered key list is serialized; the reverse map is
/// rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct IdMap {
    keys: Vec<String>,
    ids: HashMap<String, u32>,
}

impl IdMap {
    pub fn new() -> Self { Self::default() }

    /// Id for `key`, assigning the next free id when the key is new.
    pub fn id_of(&mut self, key: &str) -> u32 {
        if let Some(&id) = self.ids.get(key) {
            return id;
        }
        let id = self.keys.len() as u32;
        self.keys.push(key.to_string());
        self.ids.insert(key.to_string(), id);
        id
    }

    /// Id for `key` without assigning one.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn key_of(&self, id: u32) -> Result<&str> {
        self.keys
            .get(id as usize)
            .map(String::as_str)
            .ok_or(IndexError::UnknownId(id))
    }

    pub fn len(&self) -> usize { self.keys.len() }

    pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    /// Keys in id order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for IdMap {
    fn from(keys: Vec<String>) -> Self {
        let ids = keys
            .iter()
            .enumerate()
            .map(|(id, key)| (key.clone(), id as u32))
            .collect();
        Self { keys, ids }
    }
}

impl From<IdMap> for Vec<String> {
    fn from(map: IdMap) -> Self {
        map.keys
    }
}
