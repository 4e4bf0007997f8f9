//! Distance metrics for vector similarity calculation.
//!
//! The variants match the distances the vector database accepts when a
//! collection is created. [`DistanceMetric::score`] reproduces the score the
//! database reports for a hit so the in-memory store ranks the same way.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MenagerieError, Result};

/// Distance metrics for vector similarity calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Cosine similarity
    #[default]
    #[serde(alias = "cosine")]
    Cosine,
    /// Euclidean (L2) distance
    #[serde(rename = "Euclid", alias = "euclid", alias = "euclidean")]
    Euclid,
    /// Dot product similarity (higher is more similar)
    #[serde(rename = "Dot", alias = "dot", alias = "dot_product")]
    Dot,
    /// Manhattan (L1) distance
    #[serde(alias = "manhattan")]
    Manhattan,
}

impl DistanceMetric {
    /// Score `b` against the query `a`.
    ///
    /// Cosine and dot return similarities (higher is better). Euclid and
    /// Manhattan return distances (lower is better); see
    /// [`DistanceMetric::higher_is_better`].
    pub fn score(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(MenagerieError::InvalidOperation(format!(
                "Vector dimensions must match for distance calculation ({} vs {})",
                a.len(),
                b.len()
            )));
        }

        let result = match self {
            DistanceMetric::Cosine => {
                let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot_product / (norm_a * norm_b)
                }
            }
            DistanceMetric::Euclid => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Dot => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        };

        Ok(result)
    }

    /// Whether larger scores mean closer vectors.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, DistanceMetric::Cosine | DistanceMetric::Dot)
    }

    /// Name used by the vector database REST API.
    pub fn wire_name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "Cosine",
            DistanceMetric::Euclid => "Euclid",
            DistanceMetric::Dot => "Dot",
            DistanceMetric::Manhattan => "Manhattan",
        }
    }

    /// Score a query against multiple vectors, in parallel for large batches.
    pub fn batch_score_parallel(&self, query: &[f32], vectors: &[&[f32]]) -> Result<Vec<f32>> {
        if vectors.len() < 100 {
            return vectors
                .iter()
                .map(|v| self.score(query, v))
                .collect::<Result<Vec<_>>>();
        }

        vectors
            .par_iter()
            .map(|v| self.score(query, v))
            .collect::<Result<Vec<_>>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_score() {
        let metric = DistanceMetric::Cosine;
        assert!((metric.score(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(metric.score(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
        assert_eq!(metric.score(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_euclid_and_manhattan() {
        assert_eq!(
            DistanceMetric::Euclid
                .score(&[0.0, 0.0], &[3.0, 4.0])
                .unwrap(),
            5.0
        );
        assert_eq!(
            DistanceMetric::Manhattan
                .score(&[0.0, 0.0], &[3.0, 4.0])
                .unwrap(),
            7.0
        );
        assert!(!DistanceMetric::Euclid.higher_is_better());
        assert!(DistanceMetric::Dot.higher_is_better());
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(DistanceMetric::Dot.score(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(DistanceMetric::Dot.wire_name(), "Dot");
        assert_eq!(DistanceMetric::Euclid.wire_name(), "Euclid");
    }

    #[test]
    fn test_serde_accepts_lowercase_aliases() {
        let metric: DistanceMetric = serde_json::from_str("\"cosine\"").unwrap();
        assert_eq!(metric, DistanceMetric::Cosine);
        let metric: DistanceMetric = serde_json::from_str("\"Euclid\"").unwrap();
        assert_eq!(metric, DistanceMetric::Euclid);
        assert_eq!(
            serde_json::to_string(&DistanceMetric::Dot).unwrap(),
            "\"Dot\""
        );
    }

    #[test]
    fn test_batch_score_parallel_matches_sequential() {
        let query = vec![1.0, 2.0, 3.0];
        let data: Vec<Vec<f32>> = (0..150).map(|i| vec![i as f32, 1.0, 0.5]).collect();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();

        let scores = DistanceMetric::Dot.batch_score_parallel(&query, &refs).unwrap();
        assert_eq!(scores.len(), 150);
        assert_eq!(scores[10], 10.0 + 2.0 + 1.5);
    }
}
