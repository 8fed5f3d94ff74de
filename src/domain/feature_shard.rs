// ============================================================
// Layer 3: Feature Shard Domain Type
// ============================================================
// One file's worth of labelled feature rows. Vectors are kept
// row-major in a single flat Vec so a shard can be appended to an
// accumulation buffer without reallocating per row.
//
// Labels are binary: 0 = benign, 1 = malicious.

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainingError;

/// Binary class label.
pub type Label = u8;

pub const NEGATIVE: Label = 0;
pub const POSITIVE: Label = 1;

/// A matrix of feature vectors with a parallel label vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureShard {
    /// File name the shard was read from, for log lines
    pub source: String,
    width: usize,
    vectors: Vec<f32>,
    labels: Vec<Label>,
}

impl FeatureShard {
    /// Build a shard, checking that `vectors` holds exactly one row of
    /// `width` values per label and that every label is 0 or 1.
    pub fn new(
        source: impl Into<String>,
        width: usize,
        vectors: Vec<f32>,
        labels: Vec<Label>,
    ) -> Result<Self, TrainingError> {
        let source = source.into();
        if vectors.len() != width * labels.len() {
            return Err(TrainingError::shard_read(
                &source,
                format!(
                    "{} values do not form {} rows of width {}",
                    vectors.len(),
                    labels.len(),
                    width
                ),
            ));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > POSITIVE) {
            return Err(TrainingError::shard_read(
                &source,
                format!("label {bad} is not binary"),
            ));
        }
        Ok(Self { source, width, vectors, labels })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.width..(i + 1) * self.width]
    }

    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == POSITIVE).count()
    }

    pub fn has_positive(&self) -> bool {
        self.labels.contains(&POSITIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_sliced_by_width() {
        let shard = FeatureShard::new("s", 2, vec![1.0, 2.0, 3.0, 4.0], vec![0, 1]).unwrap();
        assert_eq!(shard.rows(), 2);
        assert_eq!(shard.row(1), &[3.0, 4.0]);
        assert_eq!(shard.positives(), 1);
        assert!(shard.has_positive());
    }

    #[test]
    fn test_row_count_mismatch_is_rejected() {
        let err = FeatureShard::new("s", 3, vec![1.0; 5], vec![0, 0]).unwrap_err();
        assert!(matches!(err, TrainingError::ShardRead { .. }));
    }

    #[test]
    fn test_non_binary_label_is_rejected() {
        let err = FeatureShard::new("s", 1, vec![0.5], vec![2]).unwrap_err();
        assert!(err.to_string().contains("not binary"));
    }
}
