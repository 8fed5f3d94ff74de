// ============================================================
// Layer 6: Classifier Artifact Store
// ============================================================
// The trained classifier is persisted exactly once, at the end of
// a successful session, as one JSON document. The write goes to a
// sibling temp file first and is renamed into place, so readers
// never observe a half-written artifact.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{error::TrainingError, traits::ClassifierModel};
use crate::ml::classifier::Classifier;

pub const CLASSIFIER_FILE: &str = "classifier.json";

#[derive(Debug, Clone)]
pub struct ClassifierStore {
    path: PathBuf,
}

impl ClassifierStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Drop an artifact left by an earlier run. Returns whether one existed.
    pub fn remove_stale(&self) -> Result<bool, TrainingError> {
        if !self.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| TrainingError::artifact(&self.path, e))?;
        tracing::warn!("Removed previous classifier artifact '{}'", self.path.display());
        Ok(true)
    }

    pub fn save(&self, model: &Classifier) -> Result<(), TrainingError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| TrainingError::artifact(parent, e))?;
        }

        let json = serde_json::to_vec(model).map_err(|e| TrainingError::artifact(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| TrainingError::artifact(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| TrainingError::artifact(&self.path, e))?;

        tracing::info!("Saved {} artifact to '{}'", model.name(), self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Classifier, TrainingError> {
        let bytes = fs::read(&self.path).map_err(|e| TrainingError::artifact(&self.path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| TrainingError::artifact(&self.path, e))
    }
}
