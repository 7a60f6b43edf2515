//! In-memory [`DocumentStore`] implementation for testing and ephemeral runs.
//!
//! Uses a `BTreeMap` keyed by the full document path behind
//! `std::sync::RwLock`.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{apply_array_union, compare_doc_ids, DocPath, DocumentStore};

/// In-memory document store.
pub struct InMemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored documents across all collections.
    pub fn len(&self) -> usize {
        self.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Value>>> {
        self.docs
            .read()
            .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Value>>> {
        self.docs
            .write()
            .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        Ok(self.read()?.get(&path.to_string()).cloned())
    }

    async fn set(&self, path: &DocPath, body: Value) -> Result<()> {
        self.write()?.insert(path.to_string(), body);
        Ok(())
    }

    async fn array_union(&self, path: &DocPath, field: &str, value: Value) -> Result<()> {
        let mut docs = self.write()?;
        let body = docs
            .get_mut(&path.to_string())
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        apply_array_union(path, body, field, value)
    }

    async fn list(&self, collection: &DocPath) -> Result<Vec<(String, Value)>> {
        let prefix = format!("{}/", collection);
        let docs = self.read()?;
        let mut out: Vec<(String, Value)> = docs
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, v)| {
                let rest = &k[prefix.len()..];
                (!rest.contains('/')).then(|| (rest.to_string(), v.clone()))
            })
            .collect();
        out.sort_by(|a, b| compare_doc_ids(&a.0, &b.0));
        Ok(out)
    }
}
