// ============================================================
// Layer 2: EvaluateUseCase
// ============================================================
// Loads a classifier artifact, scores it on held-out shards, logs
// the results and appends them to evaluation.csv.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::data::loader::ShardFileLoader;
use crate::infra::{
    classifier_store::ClassifierStore,
    metrics::{EvaluationRecord, MetricsLogger},
};
use crate::ml::evaluation::{evaluate, EvaluationReport, ScopeEvaluation};

pub struct EvaluateUseCase {
    artifact:   PathBuf,
    shards_dir: String,
    /// Directory receiving evaluation.csv
    report_dir: PathBuf,
    run:        String,
}

impl EvaluateUseCase {
    pub fn new(
        artifact:   impl Into<PathBuf>,
        shards_dir: impl Into<String>,
        report_dir: impl Into<PathBuf>,
        run:        impl Into<String>,
    ) -> Self {
        Self {
            artifact:   artifact.into(),
            shards_dir: shards_dir.into(),
            report_dir: report_dir.into(),
            run:        run.into(),
        }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let model = ClassifierStore::new(&self.artifact)
            .load()
            .context("Cannot load the classifier; train one first")?;

        let shards = ShardFileLoader::from_dir(&self.shards_dir)
            .with_context(|| format!("Cannot list test shards in '{}'", self.shards_dir))?;
        if shards.files().is_empty() {
            bail!("No .safetensors shards found in '{}'", self.shards_dir);
        }

        let report = evaluate(&model, &shards)?;

        let logger = MetricsLogger::<EvaluationRecord>::new(&self.report_dir)?;
        for eval in report.shards.iter().chain(std::iter::once(&report.overall)) {
            log_scope(eval);
            logger.log(&self.record(eval))?;
        }
        Ok(report)
    }

    fn record(&self, eval: &ScopeEvaluation) -> EvaluationRecord {
        EvaluationRecord {
            run:               self.run.clone(),
            scope:             eval.scope.clone(),
            rows:              eval.matrix.total(),
            tn:                eval.matrix.tn,
            fp:                eval.matrix.fp,
            fn_:               eval.matrix.fn_,
            tp:                eval.matrix.tp,
            f1:                eval.f1,
            roc_auc:           eval.roc_auc,
            average_precision: eval.average_precision,
        }
    }
}

fn log_scope(eval: &ScopeEvaluation) {
    let m = &eval.matrix;
    match (eval.f1, eval.roc_auc, eval.average_precision) {
        (Some(f1), Some(auc), Some(ap)) => tracing::info!(
            "{}: TN={} FP={} FN={} TP={} | F1={:.4} AUC={:.4} AP={:.4}",
            eval.scope, m.tn, m.fp, m.fn_, m.tp, f1, auc, ap
        ),
        _ => tracing::info!(
            "{}: TN={} FP={} FN={} TP={} | single class, no F1/AUC/AP",
            eval.scope, m.tn, m.fp, m.fn_, m.tp
        ),
    }
}
