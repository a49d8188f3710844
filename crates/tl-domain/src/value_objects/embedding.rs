//! Embedding value object and similarity math.

use serde::{Deserialize, Serialize};

/// A dense vector representation of a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The vector components.
    pub vector: Vec<f32>,
    /// Model that produced the vector.
    pub model: String,
    /// Dimensionality; equals `vector.len()`.
    pub dimensions: usize,
}

impl Embedding {
    /// Wrap a vector produced by `model`.
    #[must_use]
    pub fn new(vector: Vec<f32>, model: impl Into<String>) -> Self {
        let dimensions = vector.len();
        Self {
            vector,
            model: model.into(),
            dimensions,
        }
    }
}

/// Cosine similarity of two vectors, in [-1, 1].
///
/// Returns 0.0 for mismatched dimensions or zero-magnitude inputs; callers
/// treat that as "not similar" rather than an error.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize_vector(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
