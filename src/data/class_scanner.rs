// ============================================================
// Layer 4: Class Start Scanner
// ============================================================
// Finds the first shard that contains at least one malicious row.
//
// A statistics-based classifier cannot initialise from benign-only
// data, so its first fit has to come from a dual-class shard. The
// bootstrap schedule built here feeds that shard first and then
// every other shard in its original relative order.
//
//   shards:    [neg, neg, mixed, neg]
//   index:     Some(2)
//   schedule:  [2, 0, 1, 3]

use crate::domain::error::TrainingError;
use crate::domain::feature_shard::POSITIVE;
use crate::domain::traits::FeatureShardSource;

pub struct ClassStartScanner;

impl ClassStartScanner {
    /// Index of the first shard holding a positive label, or None.
    /// Only labels are read.
    pub fn find_bootstrap_index<S: FeatureShardSource + ?Sized>(
        shards: &S,
    ) -> Result<Option<usize>, TrainingError> {
        for i in 0..shards.shard_count() {
            let labels = shards.load_labels(i)?;
            if labels.contains(&POSITIVE) {
                tracing::debug!("First positive shard is #{}", i);
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Shard order for a bootstrapped run: the bootstrap shard, then
    /// the rest in order. A missing bootstrap shard is an error, never
    /// an index.
    pub fn bootstrap_schedule<S: FeatureShardSource + ?Sized>(
        shards: &S,
    ) -> Result<Vec<usize>, TrainingError> {
        let start = Self::find_bootstrap_index(shards)?.ok_or(TrainingError::BootstrapNotFound)?;
        let mut order = Vec::with_capacity(shards.shard_count());
        order.push(start);
        order.extend((0..shards.shard_count()).filter(|&i| i != start));
        Ok(order)
    }
}
