// ============================================================
// Layer 4: Token Stream and Feature Shard Loaders
// ============================================================
// Reads the two file formats produced by the external packet
// tokenizer / feature extractor.
//
// Token stream files:
//   a flat sequence of little-endian i64 token ids, no header.
//
// Feature shard files (safetensors):
//   "vectors" → F32 [rows, width]
//   "labels"  → I64, I32 or U8 [rows], values 0 or 1
//
// Directory listings are sorted in natural order so that
// "day_2" comes before "day_10"; training order matters for both
// checkpointed embeddings and shard accumulation.
//
// Unlike document loading, a bad file is never skipped: a missing
// or corrupt stream/shard aborts the run.
//
// Reference: safetensors crate documentation
//            Rust Book §9 (Error Handling)

use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use safetensors::{Dtype, SafeTensors};

use crate::domain::error::TrainingError;
use crate::domain::feature_shard::{FeatureShard, Label};
use crate::domain::token_stream::{TokenId, TokenStream};
use crate::domain::traits::{FeatureShardSource, TokenStreamSource};

pub const VECTORS_TENSOR: &str = "vectors";
pub const LABELS_TENSOR: &str = "labels";

const TOKEN_WIDTH: usize = std::mem::size_of::<TokenId>();

// ─── Directory listing ────────────────────────────────────────────────────────
/// Regular files in `dir`, optionally filtered by extension, in
/// natural order.
pub fn list_files(dir: &Path, extension: Option<&str>) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = extension {
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
        }
        files.push(path);
    }
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Compare two names treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let da = a.iter().take_while(|c| c.is_ascii_digit()).count();
                let db = b.iter().take_while(|c| c.is_ascii_digit()).count();
                let (na, nb) = (strip_zeros(&a[..da]), strip_zeros(&b[..db]));
                let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = &a[da..];
                b = &b[db..];
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn strip_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|&&c| c == b'0').count();
    &digits[zeros.min(digits.len().saturating_sub(1))..]
}

// ─── Token streams ────────────────────────────────────────────────────────────
/// Ordered token-stream files, read one at a time.
pub struct TokenFileLoader {
    files: Vec<PathBuf>,
}

impl TokenFileLoader {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    /// Every regular file in `dir`, in natural order.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TrainingError> {
        let dir = dir.as_ref();
        let files = list_files(dir, None).map_err(|e| TrainingError::stream_read(dir, e))?;
        Ok(Self::new(files))
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl TokenStreamSource for TokenFileLoader {
    fn stream_count(&self) -> usize {
        self.files.len()
    }

    fn load_stream(&self, index: usize) -> Result<TokenStream, TrainingError> {
        let path = self
            .files
            .get(index)
            .ok_or_else(|| TrainingError::stream_read(format!("#{index}"), "index out of range"))?;
        read_token_file(path)
    }
}

/// Read a whole token file into memory.
pub fn read_token_file(path: &Path) -> Result<TokenStream, TrainingError> {
    let bytes = fs::read(path).map_err(|e| TrainingError::stream_read(path, e))?;
    if bytes.len() % TOKEN_WIDTH != 0 {
        return Err(TrainingError::stream_read(
            path,
            format!("{} bytes is not a whole number of {TOKEN_WIDTH}-byte tokens", bytes.len()),
        ));
    }

    let tokens: Vec<TokenId> = bytes
        .chunks_exact(TOKEN_WIDTH)
        .map(|chunk| {
            let mut raw = [0u8; TOKEN_WIDTH];
            raw.copy_from_slice(chunk);
            TokenId::from_le_bytes(raw)
        })
        .collect();

    tracing::debug!("Read {} tokens from '{}'", tokens.len(), path.display());
    Ok(TokenStream::new(file_name(path), tokens))
}

// ─── Feature shards ───────────────────────────────────────────────────────────
/// Ordered safetensors feature shards.
pub struct ShardFileLoader {
    files: Vec<PathBuf>,
}

impl ShardFileLoader {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    /// Every `.safetensors` file in `dir`, in natural order.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TrainingError> {
        let dir = dir.as_ref();
        let files = list_files(dir, Some("safetensors"))
            .map_err(|e| TrainingError::shard_read(dir, e))?;
        Ok(Self::new(files))
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn path(&self, index: usize) -> Result<&Path, TrainingError> {
        self.files
            .get(index)
            .map(PathBuf::as_path)
            .ok_or_else(|| TrainingError::shard_read(format!("#{index}"), "index out of range"))
    }
}

impl FeatureShardSource for ShardFileLoader {
    fn shard_count(&self) -> usize {
        self.files.len()
    }

    fn load_shard(&self, index: usize) -> Result<FeatureShard, TrainingError> {
        read_shard_file(self.path(index)?)
    }

    fn load_labels(&self, index: usize) -> Result<Vec<Label>, TrainingError> {
        let path  = self.path(index)?;
        let bytes = fs::read(path).map_err(|e| TrainingError::shard_read(path, e))?;
        let tensors = SafeTensors::deserialize(&bytes).map_err(|e| TrainingError::shard_read(path, e))?;
        decode_labels(path, &tensors)
    }
}

/// Read and validate one shard file.
pub fn read_shard_file(path: &Path) -> Result<FeatureShard, TrainingError> {
    let bytes = fs::read(path).map_err(|e| TrainingError::shard_read(path, e))?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|e| TrainingError::shard_read(path, e))?;

    let vectors = tensors
        .tensor(VECTORS_TENSOR)
        .map_err(|e| TrainingError::shard_read(path, e))?;
    if vectors.dtype() != Dtype::F32 {
        return Err(TrainingError::shard_read(
            path,
            format!("'{VECTORS_TENSOR}' must be F32, found {:?}", vectors.dtype()),
        ));
    }
    let (rows, width) = match vectors.shape() {
        [rows, width] => (*rows, *width),
        other => {
            return Err(TrainingError::shard_read(
                path,
                format!("'{VECTORS_TENSOR}' must be 2-D, found shape {other:?}"),
            ))
        }
    };
    let values: Vec<f32> = vectors
        .data()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let labels = decode_labels(path, &tensors)?;
    if labels.len() != rows {
        return Err(TrainingError::shard_read(
            path,
            format!("{rows} vectors but {} labels", labels.len()),
        ));
    }

    FeatureShard::new(file_name(path), width, values, labels)
}

fn decode_labels(path: &Path, tensors: &SafeTensors<'_>) -> Result<Vec<Label>, TrainingError> {
    let view = tensors
        .tensor(LABELS_TENSOR)
        .map_err(|e| TrainingError::shard_read(path, e))?;
    if view.shape().len() != 1 {
        return Err(TrainingError::shard_read(
            path,
            format!("'{LABELS_TENSOR}' must be 1-D, found shape {:?}", view.shape()),
        ));
    }

    let raw: Vec<i64> = match view.dtype() {
        Dtype::I64 => view
            .data()
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
        Dtype::I32 => view
            .data()
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
            .collect(),
        Dtype::U8 => view.data().iter().map(|&b| b as i64).collect(),
        other => {
            return Err(TrainingError::shard_read(
                path,
                format!("unsupported label dtype {other:?}"),
            ))
        }
    };

    raw.into_iter()
        .map(|v| match v {
            0 | 1 => Ok(v as Label),
            bad => Err(TrainingError::shard_read(path, format!("label {bad} is not binary"))),
        })
        .collect()
}
