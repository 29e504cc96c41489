//! In-memory [`SchemaIndex`] for tests and embedding in other programs.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Nearest-neighbour
//! search is brute-force cosine distance over every record that has a vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{IndexRecord, SchemaIndex};
use crate::embedding::cosine_distance;

struct StoredRecord {
    text: String,
    metadata: serde_json::Value,
    vector: Option<Vec<f32>>,
}

#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(
        &self,
        id: &str,
        text: &str,
        metadata: serde_json::Value,
        vector: Option<Vec<f32>>,
    ) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        records.insert(
            id.to_string(),
            StoredRecord {
                text: text.to_string(),
                metadata,
                vector,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SchemaIndex for InMemoryIndex {
    async fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        Ok(records.get(id).map(|r| IndexRecord {
            id: id.to_string(),
            text: r.text.clone(),
            distance: 0.0,
            metadata: r.metadata.clone(),
        }))
    }

    async fn nearest(&self, query_vec: &[f32], limit: usize) -> Result<Vec<IndexRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;

        let mut scored: Vec<IndexRecord> = records
            .iter()
            .filter_map(|(id, r)| {
                let vector = r.vector.as_ref()?;
                Some(IndexRecord {
                    id: id.clone(),
                    text: r.text.clone(),
                    distance: cosine_distance(query_vec, vector),
                    metadata: r.metadata.clone(),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}
