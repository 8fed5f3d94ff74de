// ============================================================
// Layer 2: ScanUseCase
// ============================================================
// Reports which shard a bootstrapped classifier run would start
// from, reading labels only.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::data::{class_scanner::ClassStartScanner, loader::ShardFileLoader};

pub struct ScanUseCase {
    shards_dir: String,
}

impl ScanUseCase {
    pub fn new(shards_dir: impl Into<String>) -> Self {
        Self { shards_dir: shards_dir.into() }
    }

    /// Index and path of the first shard holding a positive label.
    pub fn execute(&self) -> Result<Option<(usize, PathBuf)>> {
        let shards = ShardFileLoader::from_dir(&self.shards_dir)
            .with_context(|| format!("Cannot list feature shards in '{}'", self.shards_dir))?;

        let found = ClassStartScanner::find_bootstrap_index(&shards)
            .with_context(|| format!("Scanning '{}' failed", self.shards_dir))?;

        Ok(found.map(|i| (i, shards.files()[i].clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::tests::write_shard;
    use crate::domain::feature_shard::FeatureShard;

    fn shard(rows: usize, positives: usize) -> FeatureShard {
        let labels = (0..rows).map(|i| u8::from(i < positives)).collect();
        FeatureShard::new("s", 2, vec![0.5; rows * 2], labels).unwrap()
    }

    #[test]
    fn test_reports_first_positive_shard_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(&dir.path().join("day_1.safetensors"), &shard(10, 0));
        write_shard(&dir.path().join("day_2.safetensors"), &shard(5, 0));
        write_shard(&dir.path().join("day_10.safetensors"), &shard(3, 0));
        write_shard(&dir.path().join("day_3.safetensors"), &shard(8, 2));

        let (index, path) = ScanUseCase::new(dir.path().display().to_string()).execute().unwrap().unwrap();
        assert_eq!(index, 2);
        assert!(path.ends_with("day_3.safetensors"));
    }

    #[test]
    fn test_no_positive_shard_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(&dir.path().join("a.safetensors"), &shard(4, 0));
        assert_eq!(ScanUseCase::new(dir.path().display().to_string()).execute().unwrap(), None);
    }
}
