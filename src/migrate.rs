use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the index tables. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // One row per catalog entry (table or document).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_records (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_vectors (
            id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (id) REFERENCES schema_records(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_schema_records_kind ON schema_records(kind)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
