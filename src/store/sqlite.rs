//! SQLite-backed [`DocumentStore`].
//!
//! Every document is one row of the `documents` table (see
//! [`migrate`](crate::migrate)). Bodies are stored as JSON text; `parent`
//! holds the collection path so [`list`](DocumentStore::list) is a single
//! indexed lookup.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::{db, migrate};

use super::{apply_array_union, compare_doc_ids, DocPath, DocumentStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. The schema must already exist.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_body(path: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| Error::InvalidData(format!("corrupt body at {}: {}", path, e)))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        let key = path.to_string();
        let row: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE path = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|raw| parse_body(&key, &raw)).transpose()
    }

    async fn set(&self, path: &DocPath, body: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (path, parent, doc_id, body, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(path.to_string())
        .bind(path.parent())
        .bind(path.id())
        .bind(body.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn array_union(&self, path: &DocPath, field: &str, value: Value) -> Result<()> {
        let key = path.to_string();
        let mut tx = self.pool.begin().await?;

        let raw: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE path = ?")
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await?;
        let raw = raw.ok_or_else(|| Error::NotFound(key.clone()))?;

        let mut body = parse_body(&key, &raw)?;
        apply_array_union(path, &mut body, field, value)?;

        sqlx::query("UPDATE documents SET body = ?, updated_at = ? WHERE path = ?")
            .bind(body.to_string())
            .bind(chrono::Utc::now().timestamp())
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, collection: &DocPath) -> Result<Vec<(String, Value)>> {
        let parent = collection.to_string();
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT doc_id, body FROM documents WHERE parent = ?")
                .bind(&parent)
                .fetch_all(&self.pool)
                .await?;

        let mut out = rows
            .into_iter()
            .map(|(id, raw)| {
                let body = parse_body(&format!("{}/{}", parent, id), &raw)?;
                Ok((id, body))
            })
            .collect::<Result<Vec<_>>>()?;
        out.sort_by(|a, b| compare_doc_ids(&a.0, &b.0));
        Ok(out)
    }
}
