//! JSON-over-HTTP calls with exponential backoff.
//!
//! Shared by the embedding providers and the LLM client. Transient failures
//! (network errors, HTTP 429, HTTP 5xx) are retried with delays of 1s, 2s,
//! 4s, ... capped at 32s. Any other 4xx fails immediately.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// One endpoint plus the retry budget for calls to it.
pub struct JsonEndpoint<'a> {
    pub client: &'a reqwest::Client,
    pub url: String,
    /// Label used in error messages, e.g. `"Ollama"`.
    pub service: &'a str,
    pub bearer_token: Option<String>,
    pub max_retries: u32,
}

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

impl JsonEndpoint<'_> {
    /// POST `body` and decode the JSON reply, retrying transient failures.
    pub async fn post(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let mut request = self.client.post(&self.url).json(body);
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json::<serde_json::Value>().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(attempt, %status, "{} call failed; retrying", self.service);
                        last_err = Some(anyhow!("{} API error {}: {}", self.service, status, body_text));
                        continue;
                    }

                    bail!("{} API error {}: {}", self.service, status, body_text);
                }
                Err(e) => {
                    tracing::debug!(attempt, "{} connection error: {e}", self.service);
                    last_err = Some(anyhow!(
                        "{} connection error (is it reachable at {}?): {}",
                        self.service,
                        self.url,
                        e
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} call failed after retries", self.service)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(20), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_service() {
        let client = build_client(1).unwrap();
        let endpoint = JsonEndpoint {
            client: &client,
            url: "http://127.0.0.1:9/api/generate".to_string(),
            service: "Ollama",
            bearer_token: None,
            max_retries: 0,
        };
        let err = endpoint.post(&serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Ollama connection error"));
    }
}
