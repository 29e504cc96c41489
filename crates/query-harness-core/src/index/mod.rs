//! Schema index abstraction.
//!
//! The [`SchemaIndex`] trait is the only thing retrieval knows about the
//! vector store: an exact lookup by record id, and a nearest-neighbour query
//! over the whole corpus. Records carry schemaless JSON metadata which is
//! normalized later by [`crate::metadata`].
//!
//! | Implementation | Where | Search |
//! |----------------|-------|--------|
//! | [`memory::InMemoryIndex`] | this crate | brute-force cosine |
//! | `SqliteIndex` | `query-harness` app | brute-force cosine over BLOBs |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A record as returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRecord {
    pub id: String,
    /// Indexed descriptive text.
    pub text: String,
    /// Cosine distance to the query (`0.0` for exact lookups).
    pub distance: f64,
    pub metadata: serde_json::Value,
}

/// Read access to indexed table and document records.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// request in a process.
#[async_trait]
pub trait SchemaIndex: Send + Sync {
    /// Exact lookup by record id.
    async fn get(&self, id: &str) -> Result<Option<IndexRecord>>;

    /// Up to `limit` records closest to `query_vec`, ascending by distance.
    async fn nearest(&self, query_vec: &[f32], limit: usize) -> Result<Vec<IndexRecord>>;
}
