//! Catalog import and statistics.
//!
//! `qh catalog import` loads already-extracted schema records from a JSON
//! array into the index and embeds them. Embedding is non-fatal: a record
//! whose batch fails to embed is still stored and reachable by id.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

use query_harness_core::metadata::{decode_columns, decode_string_set};
use query_harness_core::models::{split_table_id, DOCUMENT_ID_PREFIX};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_index::SqliteIndex;

/// One record ready for the index.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub id: String,
    /// `table` or `document`.
    pub kind: &'static str,
    pub text: String,
    pub metadata: Value,
}

/// Parse a catalog file body. Every entry needs a non-empty string `id`;
/// `text` (or `description`) is optional and synthesized when missing.
/// Remaining fields become metadata untouched, JSON-encoded strings included.
pub fn parse_catalog(json: &str) -> Result<Vec<CatalogRecord>> {
    let entries: Vec<Value> = serde_json::from_str(json).context("Catalog must be a JSON array")?;

    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let Value::Object(mut fields) = entry else {
                bail!("catalog entry {} is not an object", position);
            };
            let id = match fields.remove("id") {
                Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
                _ => bail!("catalog entry {} has no id", position),
            };

            // Older extracts call the glossary `glossary`.
            if !fields.contains_key("glossary_terms") {
                if let Some(glossary) = fields.remove("glossary") {
                    fields.insert("glossary_terms".to_string(), glossary);
                }
            }

            let text = take_text(&mut fields, "text")
                .or_else(|| take_text(&mut fields, "description"))
                .unwrap_or_else(|| describe(&id, &fields));

            let kind = if id.starts_with(DOCUMENT_ID_PREFIX) {
                "document"
            } else {
                "table"
            };

            Ok(CatalogRecord {
                id,
                kind,
                text,
                metadata: Value::Object(fields),
            })
        })
        .collect()
}

fn take_text(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

/// Descriptive text for a record that ships without one.
pub fn describe(id: &str, metadata: &Map<String, Value>) -> String {
    let (id_schema, id_table) = split_table_id(id);
    let schema = metadata
        .get("schema")
        .and_then(Value::as_str)
        .unwrap_or(id_schema);
    let table = metadata
        .get("table")
        .and_then(Value::as_str)
        .unwrap_or(id_table);

    let mut text = if schema.is_empty() {
        format!("Table {table}.")
    } else {
        format!("Table {table} in schema {schema}.")
    };

    let columns: Vec<String> = decode_columns(metadata.get("columns"))
        .into_iter()
        .map(|c| c.name)
        .collect();
    if !columns.is_empty() {
        text.push_str(&format!(" Columns: {}.", columns.join(", ")));
    }

    let tags = decode_string_set(metadata.get("tags"));
    if !tags.is_empty() {
        text.push_str(&format!(" Tags: {}.", tags.into_iter().collect::<Vec<_>>().join(", ")));
    }

    let glossary = decode_string_set(metadata.get("glossary_terms"));
    if !glossary.is_empty() {
        text.push_str(&format!(
            " Glossary: {}.",
            glossary.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    text
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let records = parse_catalog(&json)?;

    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool.clone());

    for record in &records {
        index
            .upsert_record(&record.id, record.kind, &record.text, &record.metadata)
            .await?;
    }

    let embedded = if config.embedding.is_enabled() {
        embed_records(config, &index, &records).await
    } else {
        0
    };

    println!("imported records: {}", records.len());
    println!("embedded: {}", embedded);

    pool.close().await;
    Ok(())
}

/// Embed and store vectors batch by batch. Returns how many were written.
async fn embed_records(config: &Config, index: &SqliteIndex, records: &[CatalogRecord]) -> u64 {
    let provider = match embedding::create_provider(&config.embedding) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("embedding provider unavailable, vectors skipped: {e:#}");
            return 0;
        }
    };

    let mut written = 0u64;
    for batch in records.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = match embedding::embed_texts(&config.embedding, &texts).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(batch = batch.len(), "embedding batch failed: {e:#}");
                continue;
            }
        };

        for (record, vector) in batch.iter().zip(vectors) {
            match index
                .upsert_vector(&record.id, provider.model_name(), &vector)
                .await
            {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(id = %record.id, "failed to store vector: {e:#}"),
            }
        }
    }
    written
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool.clone());

    println!("records: {}", index.count_records().await?);
    println!("vectors: {}", index.count_vectors().await?);

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_metadata_and_text() {
        let records = parse_catalog(
            r#"[
                {"id": "sisplan.clientes", "text": "Cadastro de clientes",
                 "columns": "[{\"name\": \"status\", \"type\": \"varchar\"}]", "domain": "vendas"},
                {"id": "doc:manual", "text": "Manual do sistema"}
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, "table");
        assert_eq!(records[0].text, "Cadastro de clientes");
        assert_eq!(records[0].metadata["domain"], "vendas");
        assert!(records[0].metadata.get("id").is_none());
        assert!(records[0].metadata["columns"].is_string());
        assert_eq!(records[1].kind, "document");
    }

    #[test]
    fn test_missing_text_is_synthesized() {
        let records = parse_catalog(
            r#"[{"id": "sisplan.pedidos",
                 "columns": [{"name": "valor", "type": "numeric"}, "codcli"],
                 "tags": ["vendas"], "glossary": "[\"pedido\"]"}]"#,
        )
        .unwrap();

        assert_eq!(
            records[0].text,
            "Table pedidos in schema sisplan. Columns: valor, codcli. Tags: vendas. Glossary: pedido."
        );
        assert_eq!(records[0].metadata["glossary_terms"], json!("[\"pedido\"]"));
    }

    #[test]
    fn test_rejects_entries_without_id() {
        assert!(parse_catalog(r#"[{"text": "x"}]"#).is_err());
        assert!(parse_catalog(r#"[{"id": "  "}]"#).is_err());
        assert!(parse_catalog(r#"["sisplan.x"]"#).is_err());
        assert!(parse_catalog(r#"{"id": "x"}"#).is_err());
    }

    #[test]
    fn test_describe_unqualified_table() {
        assert_eq!(describe("clientes", &Map::new()), "Table clientes.");
    }
}
