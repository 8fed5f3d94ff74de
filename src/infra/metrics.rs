// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Appends one CSV row per record so a run leaves a permanent,
// plottable trail next to its artifacts.
//
//   loss.csv         one row per loss report of the embedding trainer
//     file,step,average_loss
//     0,2000,113.402100
//
//   evaluation.csv   one row per evaluated shard plus an overall row
//     run,scope,rows,tn,fp,fn,tp,f1,roc_auc,average_precision
//
// The header is written only when the file is new, so successive
// runs (and update_model resumes) keep appending to the same log.
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// A row type that can be appended to a CSV log.
pub trait CsvRecord {
    const FILE_NAME: &'static str;

    fn header() -> &'static str;
    fn row(&self) -> String;
}

// ─── Loss ─────────────────────────────────────────────────────────────────────
/// Running average of the embedding loss over the last reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct LossRecord {
    /// Index of the token file within the run
    pub file:         usize,
    /// Step within that file
    pub step:         usize,
    pub average_loss: f64,
}

impl CsvRecord for LossRecord {
    const FILE_NAME: &'static str = "loss.csv";

    fn header() -> &'static str {
        "file,step,average_loss"
    }

    fn row(&self) -> String {
        format!("{},{},{:.6}", self.file, self.step, self.average_loss)
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub run:               String,
    /// Shard name, or "overall"
    pub scope:             String,
    pub rows:              usize,
    pub tn:                usize,
    pub fp:                usize,
    pub fn_:               usize,
    pub tp:                usize,
    /// Empty when only one class is present
    pub f1:                Option<f64>,
    pub roc_auc:           Option<f64>,
    pub average_precision: Option<f64>,
}

fn optional(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

impl CsvRecord for EvaluationRecord {
    const FILE_NAME: &'static str = "evaluation.csv";

    fn header() -> &'static str {
        "run,scope,rows,tn,fp,fn,tp,f1,roc_auc,average_precision"
    }

    fn row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.run,
            self.scope,
            self.rows,
            self.tn,
            self.fp,
            self.fn_,
            self.tp,
            optional(self.f1),
            optional(self.roc_auc),
            optional(self.average_precision),
        )
    }
}

// ─── Logger ───────────────────────────────────────────────────────────────────
/// Appends `R` rows to `<dir>/<R::FILE_NAME>`.
#[derive(Debug, Clone)]
pub struct MetricsLogger<R: CsvRecord> {
    csv_path: PathBuf,
    _record:  PhantomData<R>,
}

impl<R: CsvRecord> MetricsLogger<R> {
    /// Creates `dir` if needed and writes the header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join(R::FILE_NAME);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{}", R::header())?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, _record: PhantomData })
    }

    pub fn log(&self, record: &R) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", record.row())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
