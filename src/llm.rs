//! Text-completion client and prompt builders.
//!
//! The model is reached through Ollama's `/api/generate` contract:
//! `{model, prompt, stream: false}` in, `{response}` out. Every call is
//! bounded by `llm.timeout_secs` overall, retries included.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::time::Duration;

use query_harness_core::{DocumentHit, TableContext};

use crate::config::LlmConfig;
use crate::http::{build_client, JsonEndpoint};

/// Document texts included in a document-grounded prompt.
pub const MAX_PROMPT_DOCUMENTS: usize = 3;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config: config.clone(),
        })
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        if !self.config.is_enabled() {
            bail!("LLM provider is disabled");
        }

        let endpoint = JsonEndpoint {
            client: &self.client,
            url: format!("{}/api/generate", self.config.url.trim_end_matches('/')),
            service: "Ollama",
            bearer_token: None,
            max_retries: self.config.max_retries,
        };
        let json = endpoint
            .post(&serde_json::json!({
                "model": self.config.model,
                "prompt": prompt,
                "stream": false,
            }))
            .await?;

        let reply: GenerateResponse = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid LLM response: {}", e))?;
        let text = reply.response.trim();
        if text.is_empty() {
            bail!("LLM returned an empty response");
        }
        Ok(text.to_string())
    }

    /// Complete `prompt`, failing on timeout or any model error.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        match tokio::time::timeout(self.budget(), self.request(prompt)).await {
            Ok(result) => result,
            Err(_) => bail!("LLM call timed out after {}s", self.config.timeout_secs),
        }
    }

    /// Complete `prompt`, substituting the configured fallback messages on
    /// timeout or failure.
    pub async fn complete_or_fallback(&self, prompt: &str) -> String {
        match tokio::time::timeout(self.budget(), self.request(prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("LLM call failed: {e:#}");
                self.config.error_message.clone()
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.config.timeout_secs, "LLM call timed out");
                self.config.fallback_message.clone()
            }
        }
    }
}

/// Render retrieved tables for the SQL prompt, one block per context.
pub fn format_context(contexts: &[TableContext]) -> String {
    if contexts.is_empty() {
        return "No tables found.".to_string();
    }

    contexts
        .iter()
        .map(|ctx| {
            let columns: Vec<&str> = ctx.columns.iter().map(|c| c.name.as_str()).collect();
            format!(
                "Table {} (relevance {:.4})\n  Columns: {}",
                ctx.id,
                ctx.relevance_score,
                columns.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn sql_prompt(question: &str, contexts: &[TableContext]) -> String {
    format!(
        "You are a careful SQL generator.\n\
         Do NOT invent tables or columns.\n\
         Use ONLY the tables listed below by id and ONLY the columns listed for them.\n\n\
         {}\n\n\
         Return ONLY one valid SQL statement terminated by \";\".\n\
         No explanations.\n\n\
         Question:\n{}\n",
        format_context(contexts),
        question
    )
}

pub fn document_prompt(question: &str, documents: &[DocumentHit]) -> String {
    let context = documents
        .iter()
        .take(MAX_PROMPT_DOCUMENTS)
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Answer the question using ONLY the context below.\n\
         If the answer is not there, say that you did not find it.\n\n\
         Question:\n{question}\n\n\
         Context:\n{context}\n\n\
         Answer:\n"
    )
}

pub fn explain_prompt(question: &str, sql: &str) -> String {
    format!(
        "You are a data analyst explaining a SQL query.\n\
         Explain, directly and without inventing anything, what the query below \
         returns and how it answers the question.\n\n\
         Question:\n\"\"\"{question}\"\"\"\n\n\
         SQL:\n{sql}\n\n\
         Explanation:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_harness_core::ColumnSpec;

    fn disabled_config() -> LlmConfig {
        LlmConfig {
            provider: "disabled".to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_format_context_lists_columns() {
        let mut ctx = TableContext::new(
            "sisplan.clientes",
            vec![
                ColumnSpec::new("status", "varchar"),
                ColumnSpec::new("nome", "text"),
            ],
        );
        ctx.relevance_score = 0.8312;

        assert_eq!(
            format_context(&[ctx]),
            "Table sisplan.clientes (relevance 0.8312)\n  Columns: status, nome"
        );
        assert_eq!(format_context(&[]), "No tables found.");
    }

    #[test]
    fn test_document_prompt_uses_top_three() {
        let docs: Vec<DocumentHit> = (0..5)
            .map(|i| DocumentHit {
                id: format!("doc:{i}"),
                text: format!("texto {i}"),
                score: 0.1,
            })
            .collect();
        let prompt = document_prompt("Como emitir nota?", &docs);
        assert!(prompt.contains("Question:\nComo emitir nota?"));
        assert!(prompt.contains("texto 0\n\ntexto 1\n\ntexto 2"));
        assert!(!prompt.contains("texto 3"));
        assert!(prompt.ends_with("Answer:\n"));
    }

    #[test]
    fn test_sql_prompt_embeds_question_and_tables() {
        let ctx = TableContext::new("sisplan.pedidos", vec![ColumnSpec::new("valor", "numeric")]);
        let prompt = sql_prompt("total de pedidos", &[ctx]);
        assert!(prompt.contains("Table sisplan.pedidos"));
        assert!(prompt.contains("terminated by \";\""));
        assert!(prompt.trim_end().ends_with("total de pedidos"));
    }

    #[tokio::test]
    async fn test_disabled_provider_falls_back() {
        let config = disabled_config();
        let client = LlmClient::new(&config).unwrap();
        assert!(client.generate("hi").await.is_err());
        assert_eq!(client.complete_or_fallback("hi").await, config.error_message);
    }

    #[tokio::test]
    async fn test_unreachable_server_falls_back() {
        let config = LlmConfig {
            url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let answer = client.complete_or_fallback("hi").await;
        assert!(answer == config.error_message || answer == config.fallback_message);
    }
}
