//! SQLite-backed [`SchemaIndex`] implementation.
//!
//! Catalog records live in `schema_records`; their embeddings live in
//! `record_vectors` as little-endian `f32` BLOBs. Nearest-neighbour search is
//! a brute-force cosine scan, which is fine for catalogs of a few thousand
//! tables.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use query_harness_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use query_harness_core::index::{IndexRecord, SchemaIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a catalog record. `kind` is `table` or `document`.
    pub async fn upsert_record(
        &self,
        id: &str,
        kind: &str,
        text: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let metadata_json = serde_json::to_string(metadata)?;

        sqlx::query(
            r#"
            INSERT INTO schema_records (id, kind, text, metadata_json, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(text)
        .bind(&metadata_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert record {id}"))?;

        Ok(())
    }

    pub async fn upsert_vector(&self, id: &str, model: &str, vector: &[f32]) -> Result<()> {
        let blob = vec_to_blob(vector);

        sqlx::query(
            r#"
            INSERT INTO record_vectors (id, model, dims, embedding)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                embedding = excluded.embedding
            "#,
        )
        .bind(id)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(&blob)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_records(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_vectors(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM record_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn parse_metadata(id: &str, raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(id, "stored metadata is not valid JSON: {e}");
        serde_json::json!({})
    })
}

#[async_trait]
impl SchemaIndex for SqliteIndex {
    async fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        let row = sqlx::query("SELECT id, text, metadata_json FROM schema_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let id: String = r.get("id");
            let metadata_json: String = r.get("metadata_json");
            IndexRecord {
                metadata: parse_metadata(&id, &metadata_json),
                text: r.get("text"),
                distance: 0.0,
                id,
            }
        }))
    }

    async fn nearest(&self, query_vec: &[f32], limit: usize) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT rv.id, rv.embedding, sr.text, sr.metadata_json
            FROM record_vectors rv
            JOIN schema_records sr ON sr.id = rv.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<IndexRecord> = rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                IndexRecord {
                    distance: cosine_distance(query_vec, &blob_to_vec(&blob)),
                    metadata: parse_metadata(&id, &metadata_json),
                    text: row.get("text"),
                    id,
                }
            })
            .collect();

        records.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        records.truncate(limit);

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use serde_json::json;

    async fn open(dir: &tempfile::TempDir) -> SqliteIndex {
        let toml = format!("[db]\npath = \"{}\"\n", dir.path().join("qh.sqlite").display());
        let config: Config = toml::from_str(&toml).unwrap();
        migrate::run_migrations(&config).await.unwrap();
        SqliteIndex::new(db::connect(&config).await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;

        index
            .upsert_record("sisplan.clientes", "table", "Clientes", &json!({"domain": "vendas"}))
            .await
            .unwrap();
        index
            .upsert_record("sisplan.clientes", "table", "Cadastro de clientes", &json!({}))
            .await
            .unwrap();

        let record = index.get("sisplan.clientes").await.unwrap().unwrap();
        assert_eq!(record.text, "Cadastro de clientes");
        assert_eq!(record.distance, 0.0);
        assert_eq!(index.count_records().await.unwrap(), 1);
        assert!(index.get("sisplan.ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;

        for (id, vec) in [
            ("sisplan.clientes", vec![1.0, 0.0]),
            ("sisplan.pedidos", vec![0.6, 0.8]),
            ("sisplan.produtos", vec![0.0, 1.0]),
        ] {
            index.upsert_record(id, "table", id, &json!({})).await.unwrap();
            index.upsert_vector(id, "test-model", &vec).await.unwrap();
        }
        index
            .upsert_record("sisplan.sem_vetor", "table", "x", &json!({}))
            .await
            .unwrap();

        let hits = index.nearest(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "sisplan.clientes");
        assert_eq!(hits[1].id, "sisplan.pedidos");
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(index.count_vectors().await.unwrap(), 3);
    }
}
