//! # Query Harness Core
//!
//! Grounding and repair for generated SQL: table-context retrieval over a
//! pluggable [`index::SchemaIndex`], tolerant metadata decoding, and the
//! [`sql`] correction pipeline.
//!
//! This crate has no tokio, sqlx, or network dependencies. Every correction
//! stage is a synchronous function over immutable inputs; retrieval is
//! async only because the index trait is.

pub mod embedding;
pub mod error;
pub mod index;
pub mod metadata;
pub mod models;
pub mod retrieval;
pub mod sql;

pub use error::CorrectionError;
pub use models::{ColumnSpec, DocumentHit, Prediction, RetrievalResult, TableContext};
pub use sql::pipeline::{correct, CorrectionOptions};
