//! Hybrid table/document retrieval.
//!
//! [`TableRetriever::resolve`] maps a question to ranked candidate contexts:
//!
//! 1. Ask the [`TableClassifier`] (if any) for up to `top_k` table ids and
//!    keep those at or above `min_confidence`.
//! 2. Enrich each surviving id with an exact [`SchemaIndex::get`] lookup.
//! 3. If that yields nothing, fall back to [`SchemaIndex::nearest`] over the
//!    question embedding, keeping records whose similarity
//!    (`1 - distance`) reaches the same threshold.
//! 4. Deduplicate by id, normalize metadata, and wrap as
//!    [`RetrievalResult::Document`] when the first id carries the
//!    [`DOCUMENT_ID_PREFIX`], [`RetrievalResult::Table`] otherwise.
//!
//! Retrieval never fails. Classifier and index errors are logged and the
//! worst case is an empty `Table` result.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::index::{IndexRecord, SchemaIndex};
use crate::metadata::context_from_record;
use crate::models::{DocumentHit, Prediction, RetrievalResult, DOCUMENT_ID_PREFIX};

/// Default confidence / similarity threshold.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.05;

/// A learned question-embedding → table-id model.
///
/// Returns predictions ordered by descending score. An untrained model
/// returns an empty list.
pub trait TableClassifier: Send + Sync {
    fn predict(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<Prediction>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub min_confidence: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

pub struct TableRetriever<'a> {
    index: &'a dyn SchemaIndex,
    classifier: Option<Arc<dyn TableClassifier>>,
    min_confidence: f64,
}

/// A record paired with the score reported for it downstream.
struct Scored {
    record: IndexRecord,
    score: f64,
}

impl<'a> TableRetriever<'a> {
    pub fn new(index: &'a dyn SchemaIndex) -> Self {
        Self {
            index,
            classifier: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_classifier(mut self, classifier: Option<Arc<dyn TableClassifier>>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Resolve `question` to ranked contexts. `query_vec` is the question
    /// embedding; without it neither the classifier nor vector search can
    /// run and the result is empty.
    pub async fn resolve(
        &self,
        question: &str,
        query_vec: Option<&[f32]>,
        top_k: usize,
    ) -> RetrievalResult {
        let Some(query_vec) = query_vec else {
            debug!(question, "no question embedding; retrieval skipped");
            return RetrievalResult::empty();
        };
        if top_k == 0 {
            return RetrievalResult::empty();
        }

        let mut hits = self.classified(query_vec, top_k).await;
        if hits.is_empty() {
            debug!(question, "classifier produced nothing; using vector search");
            hits = self.vector_fallback(query_vec, top_k).await;
        }

        wrap(dedupe(hits))
    }

    async fn classified(&self, query_vec: &[f32], top_k: usize) -> Vec<Scored> {
        let Some(classifier) = &self.classifier else {
            return Vec::new();
        };

        let predictions = match classifier.predict(query_vec, top_k) {
            Ok(p) => p,
            Err(e) => {
                warn!("classifier prediction failed: {e:#}");
                return Vec::new();
            }
        };

        let mut hits = Vec::new();
        for prediction in predictions.into_iter().take(top_k) {
            if prediction.score < self.min_confidence {
                continue;
            }
            match self.index.get(&prediction.id).await {
                Ok(Some(record)) => hits.push(Scored {
                    record,
                    score: prediction.score,
                }),
                Ok(None) => debug!(id = %prediction.id, "predicted id not in index"),
                Err(e) => warn!(id = %prediction.id, "index lookup failed: {e:#}"),
            }
        }
        hits
    }

    async fn vector_fallback(&self, query_vec: &[f32], top_k: usize) -> Vec<Scored> {
        let mut records = match self.index.nearest(query_vec, top_k).await {
            Ok(r) => r,
            Err(e) => {
                warn!("vector search failed: {e:#}");
                return Vec::new();
            }
        };

        records.retain(|r| 1.0 - r.distance >= self.min_confidence);
        records.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records
            .into_iter()
            .map(|record| Scored {
                score: record.distance,
                record,
            })
            .collect()
    }
}

fn dedupe(hits: Vec<Scored>) -> Vec<Scored> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| seen.insert(h.record.id.clone()))
        .collect()
}

fn wrap(hits: Vec<Scored>) -> RetrievalResult {
    let is_document = hits
        .first()
        .is_some_and(|h| h.record.id.starts_with(DOCUMENT_ID_PREFIX));

    if is_document {
        RetrievalResult::Document(
            hits.into_iter()
                .map(|h| DocumentHit {
                    id: h.record.id,
                    text: h.record.text,
                    score: h.score,
                })
                .collect(),
        )
    } else {
        RetrievalResult::Table(
            hits.iter()
                .map(|h| context_from_record(&h.record, h.score))
                .collect(),
        )
    }
}
