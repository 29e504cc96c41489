//! TOML configuration for the `qh` binary.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] parses and validates in one step; a config that
//! loads is safe to hand to every command.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use query_harness_core::sql::coerce::DomainValueTable;
use query_harness_core::CorrectionOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Classifier confidence and vector-similarity threshold.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Contexts forwarded to correction and prompt building.
    #[serde(default = "default_max_contexts")]
    pub max_contexts: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_confidence: default_min_confidence(),
            max_contexts: default_max_contexts(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_min_confidence() -> f64 {
    0.05
}
fn default_max_contexts() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    /// JSON weights file; retrieval runs on vector search alone without it.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    /// Returned in place of an answer when the model times out.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    /// Returned in place of an answer when the model call fails outright.
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            url: default_llm_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            fallback_message: default_fallback_message(),
            error_message: default_error_message(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3.1".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    300
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_fallback_message() -> String {
    "The detailed analysis took longer than expected. Please try again in a moment.".to_string()
}
fn default_error_message() -> String {
    "A detailed explanation could not be generated right now.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrectionConfig {
    #[serde(default)]
    pub validate_columns: bool,
    /// column → (loose value → stored code).
    #[serde(default = "default_domain_values")]
    pub domain_values: HashMap<String, HashMap<String, String>>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            validate_columns: false,
            domain_values: default_domain_values(),
        }
    }
}

fn default_domain_values() -> HashMap<String, HashMap<String, String>> {
    let ativo = [("1", "S"), ("true", "S"), ("0", "N"), ("false", "N")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    HashMap::from([("ativo".to_string(), ativo)])
}

impl Config {
    /// Pipeline options derived from `[retrieval]` and `[correction]`.
    pub fn correction_options(&self) -> CorrectionOptions {
        CorrectionOptions {
            max_contexts: self.retrieval.max_contexts,
            validate_columns: self.correction.validate_columns,
            domain_values: DomainValueTable::from(self.correction.domain_values.clone()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_contexts < 1 {
        bail!("retrieval.max_contexts must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.min_confidence) {
        bail!("retrieval.min_confidence must be in [0.0, 1.0]");
    }

    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if embedding.dims.unwrap_or(0) == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                );
            }
            if embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if embedding.is_enabled() && embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.llm.provider.as_str() {
        "ollama" | "disabled" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be ollama or disabled.",
            other
        ),
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(toml: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = load_str("[db]\npath = \"./data/qh.sqlite\"\n").unwrap();
        assert_eq!(cfg.retrieval.top_k, 10);
        assert_eq!(cfg.retrieval.max_contexts, 3);
        assert!((cfg.retrieval.min_confidence - 0.05).abs() < f64::EPSILON);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.llm.model, "llama3.1");
        assert_eq!(cfg.llm.timeout_secs, 300);
        assert!(!cfg.correction.validate_columns);
        assert_eq!(cfg.correction.domain_values["ativo"]["true"], "S");
    }

    #[test]
    fn test_correction_options_follow_config() {
        let cfg = load_str(
            r#"
[db]
path = "x.sqlite"

[retrieval]
max_contexts = 2

[correction]
validate_columns = true

[correction.domain_values.situacao]
"aberto" = "A"
"#,
        )
        .unwrap();
        let options = cfg.correction_options();
        assert_eq!(options.max_contexts, 2);
        assert!(options.validate_columns);
        assert_eq!(options.domain_values.translate("situacao", "ABERTO"), Some("A"));
        assert_eq!(options.domain_values.translate("ativo", "1"), None);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let base = "[db]\npath = \"x\"\n";
        assert!(load_str(&format!("{base}[retrieval]\ntop_k = 0\n")).is_err());
        assert!(load_str(&format!("{base}[retrieval]\nmax_contexts = 0\n")).is_err());
        assert!(load_str(&format!("{base}[retrieval]\nmin_confidence = 1.5\n")).is_err());
        assert!(load_str(&format!("{base}[llm]\ntimeout_secs = 0\n")).is_err());
        assert!(load_str(&format!("{base}[llm]\nprovider = \"gpt\"\n")).is_err());
    }

    #[test]
    fn test_embedding_provider_validation() {
        let base = "[db]\npath = \"x\"\n";
        assert!(load_str(&format!("{base}[embedding]\nprovider = \"bogus\"\n")).is_err());
        assert!(load_str(&format!("{base}[embedding]\nprovider = \"ollama\"\ndims = 768\n")).is_err());
        assert!(load_str(&format!(
            "{base}[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n"
        ))
        .is_ok());
        assert!(load_str(&format!("{base}[embedding]\nprovider = \"local\"\n")).is_ok());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/qh.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
