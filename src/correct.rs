//! `qh correct` and `qh check`: the correction pipeline and safety gate
//! driven directly from the command line.

use anyhow::Result;

use query_harness_core::index::SchemaIndex;
use query_harness_core::metadata::context_from_record;
use query_harness_core::sql::safety::ensure_read_only;
use query_harness_core::{correct, TableContext};

use crate::config::Config;
use crate::db;
use crate::sqlite_index::SqliteIndex;

/// Look up contexts by id, in the order given. Unknown ids are skipped.
pub async fn fetch_contexts(index: &dyn SchemaIndex, ids: &[String]) -> Result<Vec<TableContext>> {
    let mut contexts = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        match index.get(id).await? {
            Some(record) => contexts.push(context_from_record(&record, 1.0)),
            None => tracing::warn!(id, "table not in index; ignored"),
        }
    }
    Ok(contexts)
}

pub async fn run_correct(config: &Config, sql: &str, tables: &[String], validate: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool.clone());
    let contexts = fetch_contexts(&index, tables).await?;
    pool.close().await;

    let mut options = config.correction_options();
    options.validate_columns |= validate;

    let corrected = correct(sql, &contexts, &options)?;
    println!("{}", corrected);
    Ok(())
}

pub fn run_check(sql: &str) -> Result<()> {
    ensure_read_only(sql)?;
    println!("read-only");
    Ok(())
}
