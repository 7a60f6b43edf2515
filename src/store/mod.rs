//! Document store abstraction.
//!
//! The [`DocumentStore`] trait models a hierarchical document database:
//! documents live at slash-separated paths that alternate collection and
//! document ids (`image-data/cloth/casual/3`). Bodies are JSON objects.
//!
//! Two backends are provided:
//! - [`memory::InMemoryStore`] for tests and throwaway runs.
//! - [`sqlite::SqliteStore`] for persistent local storage.
//!
//! # Layout
//!
//! | Path | Body |
//! |------|------|
//! | `image-data/cloth/{style}/count` | `{max_size}` |
//! | `image-data/cloth/{style}/{n}` | `{img_url, web_url}` |
//! | `prototype-data/{user}` | `{musicId[], styleTag[], gender, cloth[]}` |
//! | `prototype-data/{user}/{style}/{index}` | `{img_id, img_url, web_url}` |
//! | `music-data/{index}` | `{number, title, singer, url}` |

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// A validated document or collection path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Build a path from segments. Each segment must be non-empty and
    /// must not contain `/`.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(Error::InvalidData("empty document path".to_string()));
        }
        for s in &segments {
            if s.is_empty() || s.contains('/') {
                return Err(Error::InvalidData(format!(
                    "invalid path segment '{}' in {:?}",
                    s, segments
                )));
            }
        }
        Ok(Self { segments })
    }

    /// Append one segment.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// The last segment: the document id, or the collection id.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Everything before the last segment, slash-joined. Empty for
    /// top-level collections.
    pub fn parent(&self) -> String {
        self.segments[..self.segments.len() - 1].join("/")
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Path builders for the documents this crate reads and writes.
pub mod paths {
    use super::DocPath;
    use crate::error::Result;

    pub const CATALOG_ROOT: &str = "image-data";
    pub const CATALOG_KIND: &str = "cloth";
    pub const USER_ROOT: &str = "prototype-data";
    pub const MUSIC_ROOT: &str = "music-data";
    pub const COUNT_DOC: &str = "count";

    pub fn style_count(style: &str) -> Result<DocPath> {
        DocPath::new([CATALOG_ROOT, CATALOG_KIND, style, COUNT_DOC])
    }

    pub fn catalog_item(style: &str, n: u32) -> Result<DocPath> {
        DocPath::new([CATALOG_ROOT, CATALOG_KIND, style, n.to_string().as_str()])
    }

    pub fn catalog_item_named(style: &str, number: &str) -> Result<DocPath> {
        DocPath::new([CATALOG_ROOT, CATALOG_KIND, style, number])
    }

    pub fn user_doc(user: &str) -> Result<DocPath> {
        DocPath::new([USER_ROOT, user])
    }

    pub fn user_style_collection(user: &str, style: &str) -> Result<DocPath> {
        DocPath::new([USER_ROOT, user, style])
    }

    pub fn user_style_sample(user: &str, style: &str, index: usize) -> Result<DocPath> {
        DocPath::new([USER_ROOT, user, style, index.to_string().as_str()])
    }

    pub fn music_collection() -> Result<DocPath> {
        DocPath::new([MUSIC_ROOT])
    }

    pub fn music_track(index: usize) -> Result<DocPath> {
        DocPath::new([MUSIC_ROOT, index.to_string().as_str()])
    }
}

/// Abstract hierarchical document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](DocumentStore::get) | Read one document |
/// | [`set`](DocumentStore::set) | Create or overwrite one document |
/// | [`array_union`](DocumentStore::array_union) | Append to an array field without duplicates |
/// | [`list`](DocumentStore::list) | Read the direct children of a collection |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. `None` if it does not exist.
    async fn get(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Write a document, replacing any existing body wholesale.
    async fn set(&self, path: &DocPath, body: Value) -> Result<()>;

    /// Append `value` to the array at `field` unless an equal element is
    /// already present. The document must exist; a missing field is
    /// created, a non-array field is rejected.
    async fn array_union(&self, path: &DocPath, field: &str, value: Value) -> Result<()>;

    /// List direct child documents of a collection as `(id, body)`,
    /// ordered by [`compare_doc_ids`].
    async fn list(&self, collection: &DocPath) -> Result<Vec<(String, Value)>>;
}

/// Read a document and decode it into `T`.
///
/// Shape mismatches are reported as [`Error::InvalidData`] naming the path.
pub async fn get_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &DocPath,
) -> Result<Option<T>> {
    match store.get(path).await? {
        Some(body) => serde_json::from_value(body)
            .map(Some)
            .map_err(|e| Error::InvalidData(format!("{}: {}", path, e))),
        None => Ok(None),
    }
}

/// Numeric ids sort numerically and before non-numeric ids, which sort
/// lexicographically.
pub fn compare_doc_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Shared array-union rule for backends that hold whole JSON bodies.
pub(crate) fn apply_array_union(
    path: &DocPath,
    body: &mut Value,
    field: &str,
    value: Value,
) -> Result<()> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| Error::InvalidData(format!("{} is not an object", path)))?;
    let entry = obj
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let arr = entry.as_array_mut().ok_or_else(|| {
        Error::InvalidData(format!("{}.{} is not an array", path, field))
    })?;
    if !arr.contains(&value) {
        arr.push(value);
    }
    Ok(())
}
