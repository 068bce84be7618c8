//! Shared normalization and length policy for embeddings.
//!
//! Both extractors produce a variable-length raw feature vector and hand it
//! to [`EmbeddingComposer::compose`], which L2-normalizes it (leaving
//! near-zero vectors untouched) and then fits it to the collection
//! dimension by zero-padding or truncation.

use crate::types::{Embedding, EMBEDDING_DIM};

/// Vectors with a norm at or below this are not normalized.
pub const NORM_EPSILON: f64 = 1e-8;

/// Normalizes raw features and fits them to a fixed dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingComposer {
    dimension: usize,
}

impl Default for EmbeddingComposer {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl EmbeddingComposer {
    /// Create a composer producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Output dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Normalize, then pad or truncate to the output dimension.
    pub fn compose(&self, raw: &[f64]) -> Embedding {
        let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
        let scale = if norm > NORM_EPSILON { 1.0 / norm } else { 1.0 };

        let mut values: Vec<f32> = raw
            .iter()
            .take(self.dimension)
            .map(|&x| (x * scale) as f32)
            .collect();
        values.resize(self.dimension, 0.0);

        Embedding::from_composed(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_normalizes() {
        let composer = EmbeddingComposer::new(4);
        let e = composer.compose(&[3.0, 4.0]);

        assert_eq!(e.as_slice(), &[0.6, 0.8, 0.0, 0.0]);
        assert!((e.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_compose_pads_to_dimension() {
        let e = EmbeddingComposer::default().compose(&[1.0; 208]);
        assert_eq!(e.len(), 256);
        assert!(e.as_slice()[208..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_compose_truncates_after_normalizing() {
        let composer = EmbeddingComposer::new(2);
        let e = composer.compose(&[1.0, 1.0, 1.0, 1.0]);

        assert_eq!(e.len(), 2);
        assert!((e.as_slice()[0] - 0.5).abs() < 1e-7);
        assert!((e.as_slice()[1] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_compose_leaves_zero_vector() {
        let e = EmbeddingComposer::new(8).compose(&[0.0; 8]);
        assert!(e.is_zero());
    }

    #[test]
    fn test_compose_leaves_tiny_vector_unscaled() {
        let e = EmbeddingComposer::new(2).compose(&[1e-9, 0.0]);
        assert_eq!(e.as_slice()[0], 1e-9_f32);
    }

    #[test]
    fn test_compose_empty_input() {
        let e = EmbeddingComposer::new(3).compose(&[]);
        assert_eq!(e.as_slice(), &[0.0, 0.0, 0.0]);
    }
}
