// ============================================================
// Layer 6: Embedding Export
// ============================================================
// Writes the row-normalised embedding matrix as a single F32
// safetensors tensor named "embeddings" with shape
// [vocab_size, embedding_size], the file the feature-shard
// derivation reads downstream.

use std::{collections::HashMap, fs, path::Path};

use safetensors::{tensor::TensorView, Dtype, SafeTensors};

use crate::domain::{embedding::EmbeddingMatrix, error::TrainingError};

pub const EMBEDDINGS_FILE:   &str = "embeddings.safetensors";
pub const EMBEDDINGS_TENSOR: &str = "embeddings";

/// Write `matrix` to `path`, replacing any previous export.
pub fn save_embeddings(path: &Path, matrix: &EmbeddingMatrix) -> Result<(), TrainingError> {
    let bytes: Vec<u8> = matrix.values().iter().flat_map(|v| v.to_le_bytes()).collect();
    let view = TensorView::new(
        Dtype::F32,
        vec![matrix.vocab_size(), matrix.embedding_size()],
        &bytes,
    )
    .map_err(|e| TrainingError::artifact(path, e))?;

    let mut tensors = HashMap::new();
    tensors.insert(EMBEDDINGS_TENSOR.to_string(), view);
    let serialized = safetensors::tensor::serialize(&tensors, &None)
        .map_err(|e| TrainingError::artifact(path, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TrainingError::artifact(parent, e))?;
    }
    fs::write(path, serialized).map_err(|e| TrainingError::artifact(path, e))?;

    tracing::info!(
        "Exported {}x{} embeddings to '{}'",
        matrix.vocab_size(),
        matrix.embedding_size(),
        path.display()
    );
    Ok(())
}

pub fn load_embeddings(path: &Path) -> Result<EmbeddingMatrix, TrainingError> {
    let bytes = fs::read(path).map_err(|e| TrainingError::artifact(path, e))?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|e| TrainingError::artifact(path, e))?;
    let view = tensors
        .tensor(EMBEDDINGS_TENSOR)
        .map_err(|e| TrainingError::artifact(path, e))?;

    let (vocab_size, embedding_size) = match (view.dtype(), view.shape()) {
        (Dtype::F32, &[v, d]) => (v, d),
        (dtype, shape) => {
            return Err(TrainingError::artifact(
                path,
                format!("expected a 2-D F32 tensor, found {dtype:?} {shape:?}"),
            ))
        }
    };

    let values = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    EmbeddingMatrix::from_values(vocab_size, embedding_size, values)
        .ok_or_else(|| TrainingError::artifact(path, "tensor data does not match its shape"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(EMBEDDINGS_FILE);
        let matrix = EmbeddingMatrix::from_values(2, 2, vec![0.6, 0.8, 0.0, 0.0]).unwrap();

        save_embeddings(&path, &matrix).unwrap();
        let back = load_embeddings(&path).unwrap();

        assert_eq!(back, matrix);
    }

    #[test]
    fn test_missing_file_is_an_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_embeddings(&dir.path().join("absent.safetensors")).unwrap_err();
        assert!(matches!(err, TrainingError::Artifact { .. }));
    }
}
