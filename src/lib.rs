//! # Query Harness
//!
//! Turns a natural-language question into a schema-qualified, type-consistent
//! SQL statement. An external language model writes the SQL; this crate
//! grounds and repairs whatever comes back so it only references real tables
//! and columns and is safe to execute.
//!
//! ```text
//! question ─▶ retrieval ─▶ contexts ─▶ LLM ─▶ clean ─▶ qualify ─▶ filter
//!              (classifier │                              │
//!               + vectors) ▼                              ▼
//!                      documents ─▶ grounded answer    coerce ─▶ validate ─▶ safety
//! ```
//!
//! The correction pipeline and retrieval logic live in
//! `query-harness-core`; this crate adds the SQLite index, embedding and
//! LLM clients, the classifier, configuration, and the `qh` CLI.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] / [`migrate`] | Index database connection and schema |
//! | [`sqlite_index`] | SQLite implementation of `SchemaIndex` |
//! | [`embedding`] | Embedding providers |
//! | [`classifier`] | Softmax table classifier |
//! | [`llm`] | Text-completion client and prompts |
//! | [`catalog`] | `catalog import` / `catalog stats` |
//! | [`retrieve`] | `retrieve` |
//! | [`correct`] | `correct` / `check` |
//! | [`ask`] | `ask` |

pub mod ask;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod correct;
pub mod db;
pub mod embedding;
pub mod http;
pub mod llm;
pub mod migrate;
pub mod retrieve;
pub mod sqlite_index;
