//! Character-code text features.
//!
//! The encoding is lexical, not semantic: each leading character contributes
//! its code point scaled into [0, 17), and three trailer slots near the end
//! of the vector carry length, distinct-character and space counts. Two
//! strings sharing a prefix share the corresponding leading components.

use std::collections::HashSet;

use crate::compose::EmbeddingComposer;
use crate::types::{Embedding, EMBEDDING_DIM};

/// Divisor applied to code points.
const CODE_POINT_SCALE: f64 = 65536.0;

/// Pre-normalization features for `text` at the given dimension.
///
/// Positions `0..min(chars, dimension)` hold scaled code points. For
/// non-empty text, positions `dimension - 10`, `dimension - 9` and
/// `dimension - 8` are then overwritten with the character count / 1000,
/// the distinct character count / 100 and the space count / 100.
pub fn raw_features(text: &str, dimension: usize) -> Vec<f64> {
    let mut features = vec![0.0; dimension];

    for (slot, ch) in features.iter_mut().zip(text.chars()) {
        *slot = f64::from(u32::from(ch)) / CODE_POINT_SCALE;
    }

    if !text.is_empty() && dimension >= 10 {
        let char_count = text.chars().count();
        let distinct = text.chars().collect::<HashSet<_>>().len();
        let spaces = text.chars().filter(|&c| c == ' ').count();

        features[dimension - 10] = char_count as f64 / 1000.0;
        features[dimension - 9] = distinct as f64 / 100.0;
        features[dimension - 8] = spaces as f64 / 100.0;
    }

    features
}

/// Extracts embeddings from text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor {
    composer: EmbeddingComposer,
}

impl TextExtractor {
    /// Create an extractor using `composer`'s dimension.
    pub fn new(composer: EmbeddingComposer) -> Self {
        Self { composer }
    }

    /// Embed `text`. Total: the empty string yields the zero vector.
    pub fn extract(&self, text: &str) -> Embedding {
        self.composer
            .compose(&raw_features(text, self.composer.dimension()))
    }
}

/// Embed `text` at the deployed dimension.
pub fn extract_text(text: &str) -> Embedding {
    TextExtractor::default().extract(text)
}

/// Raw features at the deployed dimension.
pub fn raw_text_features(text: &str) -> Vec<f64> {
    raw_features(text, EMBEDDING_DIM)
}
