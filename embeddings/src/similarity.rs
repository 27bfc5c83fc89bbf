//! Similarity computation and ranking over the embedding store.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::store::EmbeddingRecord;

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors, or either vector has zero magnitude
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    // Rounding can push parallel vectors a hair past 1.0.
    Ok((dot / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0))
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// A ranked section of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredText {
    /// Identifier of the matched section.
    pub embedding_uuid: String,

    /// Article the section belongs to.
    pub article_uuid: String,

    /// Section text.
    pub text: String,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Score every record against `query` and return the best `n`, best first.
///
/// All records are sorted, not just the top `n`. The sort is stable, so
/// records with equal scores keep their store order. When the store holds
/// fewer than `n` records, all of them are returned.
pub fn rank_scored(records: &[EmbeddingRecord], query: &[f32], n: usize) -> Result<Vec<ScoredText>> {
    let mut scores: Vec<(OrderedFloat<f32>, &EmbeddingRecord)> = Vec::with_capacity(records.len());

    for record in records {
        let score = cosine_similarity(query, &record.embedding)?;
        scores.push((OrderedFloat(score), record));
    }

    // Stable, so equal scores keep store order.
    scores.sort_by_key(|(score, _)| Reverse(*score));

    let results: Vec<ScoredText> = scores
        .into_iter()
        .take(n)
        .map(|(score, record)| ScoredText {
            embedding_uuid: record.embedding_uuid.clone(),
            article_uuid: record.article_uuid.clone(),
            text: record.text.clone(),
            score: score.0,
        })
        .collect();

    debug!(
        "Ranked {} records, returning {}",
        records.len(),
        results.len()
    );
    Ok(results)
}

/// Return the text of the `n` records most similar to `query`.
pub fn rank(records: &[EmbeddingRecord], query: &[f32], n: usize) -> Result<Vec<String>> {
    Ok(rank_scored(records, query, n)?
        .into_iter()
        .map(|scored| scored.text)
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude = magnitude(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Weighted average of several embeddings, normalized to unit length.
///
/// Used to collapse the embeddings of consecutive windows of a long text
/// into one vector, weighting each window by its length.
pub fn weighted_average(embeddings: &[Embedding], weights: &[f32]) -> Result<Embedding> {
    if embeddings.len() != weights.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: embeddings.len(),
            actual: weights.len(),
        });
    }
    let Some(first) = embeddings.first() else {
        return Ok(Vec::new());
    };

    let dim = first.len();
    let total: f32 = weights.iter().sum();
    let mut result = vec![0.0f32; dim];

    for (embedding, weight) in embeddings.iter().zip(weights) {
        if embedding.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: embedding.len(),
            });
        }
        for (acc, val) in result.iter_mut().zip(embedding) {
            *acc += val * weight;
        }
    }

    if total > 0.0 {
        for x in result.iter_mut() {
            *x /= total;
        }
    }
    normalize(&mut result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(text: &str, embedding: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord::new("article", format!("{text}-id"), text, embedding)
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_bounded() {
        let vectors = [
            vec![0.1, 0.9, -0.4],
            vec![-3.0, 2.5, 0.0],
            vec![7.0, 7.0, 7.0],
            vec![1e-3, -1e-3, 5.0],
        ];
        for a in &vectors {
            for b in &vectors {
                let sim = cosine_similarity(a, b).unwrap();
                assert!((-1.0..=1.0).contains(&sim), "{sim} out of range");
            }
        }
    }

    #[test]
    fn test_zero_magnitude_scores_zero() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_rank_picks_closest() {
        let records = vec![record("A", vec![1.0, 0.0]), record("B", vec![0.0, 1.0])];
        let texts = rank(&records, &[1.0, 0.0], 1).unwrap();
        assert_eq!(texts, vec!["A".to_string()]);
    }

    #[test]
    fn test_rank_returns_n_in_descending_order() {
        let records = vec![
            record("b", vec![0.0, 1.0, 0.0]),
            record("a", vec![1.0, 0.0, 0.0]),
            record("c", vec![0.7, 0.7, 0.0]),
            record("d", vec![-1.0, 0.0, 0.0]),
        ];

        let scored = rank_scored(&records, &[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(scored.len(), 3);
        let texts: Vec<&str> = scored.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c", "b"]);
        assert!(scored.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_more_than_available() {
        let records = vec![record("A", vec![1.0, 0.0]), record("B", vec![0.0, 1.0])];
        let texts = rank(&records, &[0.5, 0.5], 10).unwrap();
        assert_eq!(texts.len(), 2);
    }

    #[test]
    fn test_rank_ties_keep_store_order() {
        let records = vec![
            record("first", vec![0.0, 1.0]),
            record("second", vec![0.0, 2.0]),
            record("third", vec![0.0, 3.0]),
        ];
        let texts = rank(&records, &[0.0, 1.0], 3).unwrap();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rank_rejects_wrong_query_dimension() {
        let records = vec![record("A", vec![1.0, 0.0])];
        assert!(rank(&records, &[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_rank_empty_store() {
        assert!(rank(&[], &[1.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_average() {
        let avg = weighted_average(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[3.0, 1.0]).unwrap();
        // (0.75, 0.25) normalized
        let norm = (0.75f32 * 0.75 + 0.25 * 0.25).sqrt();
        assert!((avg[0] - 0.75 / norm).abs() < 1e-6);
        assert!((avg[1] - 0.25 / norm).abs() < 1e-6);
    }
}
