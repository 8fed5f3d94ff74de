// ============================================================
// Layer 3: Embedding Matrix
// ============================================================
// vocab_size x embedding_size matrix of learned token vectors.
// The row-normalised view (every row divided by its L2 norm) is
// what the external feature extractor consumes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    vocab_size:     usize,
    embedding_size: usize,
    /// Row-major values, `vocab_size * embedding_size` long
    values:         Vec<f32>,
}

impl EmbeddingMatrix {
    /// Returns None when `values` does not match the declared shape.
    pub fn from_values(vocab_size: usize, embedding_size: usize, values: Vec<f32>) -> Option<Self> {
        (values.len() == vocab_size * embedding_size)
            .then_some(Self { vocab_size, embedding_size, values })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, token: usize) -> &[f32] {
        let start = token * self.embedding_size;
        &self.values[start..start + self.embedding_size]
    }

    /// Divide every row by its Euclidean norm.
    /// All-zero rows stay zero instead of turning into NaN.
    pub fn normalized(mut self) -> Self {
        let width = self.embedding_size;
        if width == 0 {
            return self;
        }
        for row in self.values.chunks_mut(width) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|v| *v /= norm);
            }
        }
        self
    }
}
