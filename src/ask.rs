//! `qh ask`: question → retrieval → model → corrected SQL, or a
//! document-grounded answer when retrieval lands on documents.

use anyhow::{bail, Result};

use query_harness_core::{correct, RetrievalResult};

use crate::config::Config;
use crate::db;
use crate::llm::{self, LlmClient};
use crate::retrieve::retrieve;
use crate::sqlite_index::SqliteIndex;

pub async fn run_ask(config: &Config, question: &str, explain: bool) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }

    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool.clone());
    let result = retrieve(config, &index, question, config.retrieval.top_k).await;
    pool.close().await;

    if result.is_empty() {
        bail!("No tables or documents found for the question");
    }

    let client = LlmClient::new(&config.llm)?;

    match result {
        RetrievalResult::Document(documents) => {
            tracing::debug!(documents = documents.len(), "answering from documents");
            let answer = client
                .complete_or_fallback(&llm::document_prompt(question, &documents))
                .await;
            println!("{}", answer);
        }
        RetrievalResult::Table(tables) => {
            let contexts = &tables[..tables.len().min(config.retrieval.max_contexts)];
            let raw = client.generate(&llm::sql_prompt(question, contexts)).await?;
            tracing::debug!(raw = %raw, "model reply");

            let sql = correct(&raw, contexts, &config.correction_options())?;
            println!("{}", sql);

            if explain {
                let explanation = client
                    .complete_or_fallback(&llm::explain_prompt(question, &sql))
                    .await;
                println!();
                println!("{}", explanation);
            }
        }
    }

    Ok(())
}
