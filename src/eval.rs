//! Recommendation quality metrics.
//!
//! Compares recommended question texts against a hand-picked set of
//! relevant ones. Matching is exact string equality.

use serde::Serialize;
use tracing::info;

use crate::embedding::{cosine_similarity, embed_texts, EmbeddingProvider};
use crate::error::Result;

/// Fraction of the first `k` recommendations that are relevant.
///
/// `0.0` when there is nothing to score.
pub fn precision_at_k(recommended: &[String], relevant: &[String], k: usize) -> f32 {
    let top = &recommended[..k.min(recommended.len())];
    if top.is_empty() {
        return 0.0;
    }
    hits(top, relevant) as f32 / top.len() as f32
}

/// Fraction of the relevant questions found in the first `k`
/// recommendations.
///
/// `0.0` when `relevant` is empty.
pub fn recall_at_k(recommended: &[String], relevant: &[String], k: usize) -> f32 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top = &recommended[..k.min(recommended.len())];
    hits(top, relevant) as f32 / relevant.len() as f32
}

fn hits(top: &[String], relevant: &[String]) -> usize {
    top.iter().filter(|q| relevant.contains(q)).count()
}

/// Mean cosine similarity between the top recommendation and each relevant
/// question, using `provider` embeddings.
///
/// `0.0` when either list is empty.
pub fn embedding_similarity(
    provider: &dyn EmbeddingProvider,
    recommended: &[String],
    relevant: &[String],
) -> Result<f32> {
    let Some(top) = recommended.first() else {
        return Ok(0.0);
    };
    if relevant.is_empty() {
        return Ok(0.0);
    }

    let mut texts = Vec::with_capacity(relevant.len() + 1);
    texts.push(top.clone());
    texts.extend(relevant.iter().cloned());
    let vectors = embed_texts(provider, &texts)?;

    let (top_vec, rest) = vectors.split_at(1);
    let total: f32 = rest
        .iter()
        .map(|v| cosine_similarity(&top_vec[0], v))
        .sum();
    Ok(total / rest.len() as f32)
}

/// All metrics for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub k: usize,
    pub precision: f32,
    pub recall: f32,
    pub similarity: f32,
}

pub fn evaluate(
    provider: &dyn EmbeddingProvider,
    recommended: &[String],
    relevant: &[String],
    k: usize,
) -> Result<EvalReport> {
    let report = EvalReport {
        k,
        precision: precision_at_k(recommended, relevant, k),
        recall: recall_at_k(recommended, relevant, k),
        similarity: embedding_similarity(provider, recommended, relevant)?,
    };
    info!(
        k,
        precision = report.precision,
        recall = report.recall,
        similarity = report.similarity,
        "evaluated recommendations"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_precision_and_recall() {
        let recommended = strings(&["a", "b", "c", "d"]);
        let relevant = strings(&["b", "d", "z"]);
        assert_eq!(precision_at_k(&recommended, &relevant, 2), 0.5);
        assert_eq!(precision_at_k(&recommended, &relevant, 4), 0.5);
        assert!((recall_at_k(&recommended, &relevant, 4) - 2.0 / 3.0).abs() < 1e-6);
        assert!((recall_at_k(&recommended, &relevant, 2) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_beyond_list() {
        let recommended = strings(&["a"]);
        let relevant = strings(&["a"]);
        assert_eq!(precision_at_k(&recommended, &relevant, 5), 1.0);
        assert_eq!(recall_at_k(&recommended, &relevant, 5), 1.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(precision_at_k(&[], &strings(&["a"]), 5), 0.0);
        assert_eq!(recall_at_k(&strings(&["a"]), &[], 5), 0.0);
        let provider = HashProvider::new(32);
        assert_eq!(embedding_similarity(&provider, &[], &strings(&["a"])).unwrap(), 0.0);
    }

    #[test]
    fn test_embedding_similarity_identical() {
        let provider = HashProvider::new(128);
        let q = strings(&["What is the unit of force?"]);
        let score = embedding_similarity(&provider, &q, &q).unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_evaluate_report() {
        let provider = HashProvider::new(128);
        let recommended = strings(&["What is the unit of force?", "What is a cell?"]);
        let relevant = strings(&["What is the unit of force?"]);
        let report = evaluate(&provider, &recommended, &relevant, 5).unwrap();
        assert_eq!(report.precision, 0.5);
        assert_eq!(report.recall, 1.0);
        assert!((report.similarity - 1.0).abs() < 1e-5);
    }
}
