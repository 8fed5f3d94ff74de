// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case. Nothing is computed here.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{ClassifierArgs, Commands, EmbeddingsArgs, EvaluateArgs, ScanArgs};

#[derive(Parser, Debug)]
#[command(
    name = "packet2vec-train",
    version,
    about = "Train packet-token embeddings and incremental malicious-traffic classifiers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Embeddings(args) => run_embeddings(args),
            Commands::Classifier(args) => run_classifier(args),
            Commands::Scan(args)       => run_scan(args),
            Commands::Evaluate(args)   => run_evaluate(args),
        }
    }
}

fn run_embeddings(args: EmbeddingsArgs) -> Result<()> {
    use crate::application::train_embeddings_use_case::TrainEmbeddingsUseCase;

    match &args.resume_from {
        Some(dir) => tracing::info!("Updating embeddings from checkpoint '{}'", dir),
        None => tracing::info!("Training embeddings from scratch on '{}'", args.tokens_dir),
    }

    let out = TrainEmbeddingsUseCase::new(args.into()).execute()?;
    println!("Embeddings written to {}", out.display());
    Ok(())
}

fn run_classifier(args: ClassifierArgs) -> Result<()> {
    use crate::application::train_classifier_use_case::TrainClassifierUseCase;

    let summary = TrainClassifierUseCase::new(args.into()).execute()?;
    println!(
        "Classifier written to {} after {} commits",
        summary.artifact.display(),
        summary.commits.len()
    );
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<()> {
    use crate::application::scan_use_case::ScanUseCase;

    match ScanUseCase::new(args.shards_dir).execute()? {
        Some((index, path)) => println!("First positive shard: #{} ({})", index, path.display()),
        None => println!("No shard contains a positive label"),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.artifact, args.shards_dir, args.report_dir, args.run).execute()?;
    let m = report.overall.matrix;
    println!("Overall: TN={} FP={} FN={} TP={}", m.tn, m.fp, m.fn_, m.tp);
    if let Some(auc) = report.overall.roc_auc {
        println!("ROC AUC: {auc:.4}");
    }
    Ok(())
}
