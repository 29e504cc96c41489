//! Question → ranked table or document contexts.

use anyhow::Result;

use query_harness_core::index::SchemaIndex;
use query_harness_core::retrieval::TableRetriever;
use query_harness_core::RetrievalResult;

use crate::classifier;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_index::SqliteIndex;

const EXCERPT_CHARS: usize = 240;

/// Resolve `question` against `index` with the configured embedding
/// provider and classifier. Never fails; see [`TableRetriever::resolve`].
pub async fn retrieve(
    config: &Config,
    index: &dyn SchemaIndex,
    question: &str,
    top_k: usize,
) -> RetrievalResult {
    let query_vec = embedding::try_embed_question(&config.embedding, question).await;
    let classifier = classifier::load(config.classifier.path.as_deref());

    TableRetriever::new(index)
        .with_classifier(classifier)
        .with_min_confidence(config.retrieval.min_confidence)
        .resolve(question, query_vec.as_deref(), top_k)
        .await
}

pub async fn run_retrieve(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    if question.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool.clone());
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let result = retrieve(config, &index, question, top_k).await;
    print_result(&result);

    pool.close().await;
    Ok(())
}

fn print_result(result: &RetrievalResult) {
    if result.is_empty() {
        println!("No results.");
        return;
    }

    match result {
        RetrievalResult::Table(tables) => {
            for (i, ctx) in tables.iter().enumerate() {
                println!("{}. [{:.4}] {} (table)", i + 1, ctx.relevance_score, ctx.id);
                let columns: Vec<String> = ctx
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.declared_type))
                    .collect();
                println!("    columns: {}", columns.join(", "));
                if !ctx.domain.is_empty() {
                    println!("    domain: {}", ctx.domain);
                }
                if !ctx.tags.is_empty() {
                    let tags: Vec<&str> = ctx.tags.iter().map(String::as_str).collect();
                    println!("    tags: {}", tags.join(", "));
                }
                println!();
            }
        }
        RetrievalResult::Document(documents) => {
            for (i, doc) in documents.iter().enumerate() {
                println!("{}. [{:.4}] {} (document)", i + 1, doc.score, doc.id);
                println!("    excerpt: \"{}\"", excerpt(&doc.text));
                println!();
            }
        }
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat.to_string(),
    }
}
