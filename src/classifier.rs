//! Softmax table classifier loaded from a JSON weights file.
//!
//! The file holds a linear model trained elsewhere on (question embedding,
//! table id) pairs:
//!
//! ```json
//! {"labels": ["sisplan.clientes", ...], "coef": [[...], ...], "intercept": [...]}
//! ```
//!
//! `coef` has one row per label, each as wide as the question embedding.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use query_harness_core::retrieval::TableClassifier;
use query_harness_core::Prediction;

#[derive(Debug, Deserialize)]
pub struct SoftmaxClassifier {
    labels: Vec<String>,
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
}

impl SoftmaxClassifier {
    pub fn from_json(json: &str) -> Result<Self> {
        let model: SoftmaxClassifier =
            serde_json::from_str(json).context("Failed to parse classifier weights")?;
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<()> {
        if self.labels.len() != self.coef.len() || self.labels.len() != self.intercept.len() {
            bail!(
                "classifier has {} labels, {} coefficient rows and {} intercepts",
                self.labels.len(),
                self.coef.len(),
                self.intercept.len()
            );
        }
        if let Some(width) = self.coef.first().map(Vec::len) {
            if self.coef.iter().any(|row| row.len() != width) {
                bail!("classifier coefficient rows have differing widths");
            }
        }
        Ok(())
    }

    fn input_dims(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }
}

/// Load the classifier named by `[classifier] path`.
///
/// A missing file means no classifier. A malformed one is logged and also
/// treated as absent, so retrieval falls back to vector search.
pub fn load(path: Option<&Path>) -> Option<Arc<dyn TableClassifier>> {
    let path = path?;
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no classifier weights; skipping");
        return None;
    }

    let loaded = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read classifier weights: {}", path.display()))
        .and_then(|json| SoftmaxClassifier::from_json(&json));

    match loaded {
        Ok(model) => Some(Arc::new(model) as Arc<dyn TableClassifier>),
        Err(e) => {
            tracing::warn!("classifier unavailable: {e:#}");
            None
        }
    }
}

impl TableClassifier for SoftmaxClassifier {
    fn predict(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<Prediction>> {
        if self.labels.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query_vec.len() != self.input_dims() {
            bail!(
                "question embedding has {} dims, classifier expects {}",
                query_vec.len(),
                self.input_dims()
            );
        }

        let logits: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| {
                row.iter()
                    .zip(query_vec)
                    .map(|(w, x)| (*w as f64) * (*x as f64))
                    .sum::<f64>()
                    + *bias as f64
            })
            .collect();

        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();

        let mut predictions: Vec<Prediction> = self
            .labels
            .iter()
            .zip(exps)
            .map(|(label, e)| Prediction {
                id: label.clone(),
                score: e / total,
            })
            .collect();
        predictions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions.truncate(top_k);
        Ok(predictions)
    }
}
