//! Embedding providers for catalog records and questions.
//!
//! | `embedding.provider` | Backend |
//! |----------------------|---------|
//! | `disabled` | [`DisabledProvider`]: every call fails |
//! | `openai` | `POST /v1/embeddings`, key from `OPENAI_API_KEY` |
//! | `ollama` | `POST {url}/api/embed` |
//! | `local` | fastembed, behind `--features local-embeddings-fastembed` |
//!
//! Provider instances only carry metadata; [`embed_texts`] dispatches on the
//! config so every call shares the retry behaviour in [`crate::http`].

use anyhow::{anyhow, bail, Result};

use crate::config::EmbeddingConfig;
use crate::http::{build_client, JsonEndpoint};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

/// A remote provider (OpenAI or Ollama) identified by model and width.
pub struct RemoteProvider {
    model: String,
    dims: usize,
}

impl RemoteProvider {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            anyhow!("embedding.model required for {} provider", config.provider)
        })?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for {} provider", config.provider))?;
        if config.provider == "openai" && std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" | "ollama" => Ok(Box::new(RemoteProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(local::LocalProvider::new(config))),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed `texts`, returning one vector per input in input order.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await?,
        "ollama" => embed_ollama(config, texts).await?,
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => local::embed(config, texts).await?,
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    };

    if vectors.len() != texts.len() {
        bail!(
            "Embedding provider returned {} vectors for {} inputs",
            vectors.len(),
            texts.len()
        );
    }
    Ok(vectors)
}

pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    embed_texts(config, &[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

/// Embed the question for retrieval. Embeddings being disabled or failing
/// is not an error here; retrieval simply has no vector to work with.
pub async fn try_embed_question(config: &EmbeddingConfig, question: &str) -> Option<Vec<f32>> {
    if !config.is_enabled() {
        tracing::debug!("embeddings disabled; question not embedded");
        return None;
    }
    match embed_query(config, question).await {
        Ok(vec) => Some(vec),
        Err(e) => {
            tracing::warn!("question embedding failed: {e:#}");
            None
        }
    }
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow!("embedding.model required"))?;

    let client = build_client(config.timeout_secs)?;
    let endpoint = JsonEndpoint {
        client: &client,
        url: OPENAI_EMBEDDINGS_URL.to_string(),
        service: "OpenAI",
        bearer_token: Some(api_key),
        max_retries: config.max_retries,
    };
    let json = endpoint
        .post(&serde_json::json!({ "model": model, "input": texts }))
        .await?;
    parse_openai_response(&json)
}

async fn embed_ollama(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow!("embedding.model required"))?;
    let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);

    let client = build_client(config.timeout_secs)?;
    let endpoint = JsonEndpoint {
        client: &client,
        url: format!("{}/api/embed", base.trim_end_matches('/')),
        service: "Ollama",
        bearer_token: None,
        max_retries: config.max_retries,
    };
    let json = endpoint
        .post(&serde_json::json!({ "model": model, "input": texts }))
        .await?;
    parse_ollama_response(&json)
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    Ok(value
        .as_array()
        .ok_or_else(|| anyhow!("embedding is not an array"))?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// `{"data": [{"index": i, "embedding": [...]}, ...]}`, reordered by `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_vector(embedding)?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// `{"embeddings": [[...], ...]}`
fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(parse_vector)
        .collect()
}

#[cfg(feature = "local-embeddings-fastembed")]
mod local {
    use anyhow::{anyhow, bail, Result};

    use super::EmbeddingProvider;
    use crate::config::EmbeddingConfig;

    const DEFAULT_LOCAL_MODEL: &str = "multilingual-e5-small";

    pub struct LocalProvider {
        model_name: String,
        dims: usize,
    }

    impl LocalProvider {
        pub fn new(config: &EmbeddingConfig) -> Self {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
            let dims = config.dims.unwrap_or(match model_name.as_str() {
                "bge-base-en-v1.5" | "multilingual-e5-base" | "nomic-embed-text-v1.5" => 768,
                "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
                _ => 384,
            });
            Self { model_name, dims }
        }
    }

    impl EmbeddingProvider for LocalProvider {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }
    }

    fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
        use fastembed::EmbeddingModel::*;
        Ok(match name {
            "all-minilm-l6-v2" => AllMiniLML6V2,
            "bge-small-en-v1.5" => BGESmallENV15,
            "bge-base-en-v1.5" => BGEBaseENV15,
            "bge-large-en-v1.5" => BGELargeENV15,
            "nomic-embed-text-v1.5" => NomicEmbedTextV15,
            "multilingual-e5-small" => MultilingualE5Small,
            "multilingual-e5-base" => MultilingualE5Base,
            "multilingual-e5-large" => MultilingualE5Large,
            other => bail!("Unknown local embedding model: '{}'", other),
        })
    }

    pub async fn embed(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        let model = fastembed_model(&model_name)?;
        let batch_size = config.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut embedder = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
            embedder
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}
