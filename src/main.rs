use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod error;
mod features;
mod history;
mod models;
mod predict;
mod registry;
mod report;
mod risk;
mod scoring;

use models::{PredictionResult, SemesterRecord, StudentOutcome};
use registry::ModelRegistry;

#[derive(Parser)]
#[command(name = "graduation-early-warning")]
#[command(about = "Early warning for delayed graduation from semester history", long_about = None)]
struct Cli {
    /// Directory holding config.json and models/model_scenario_<semester>.json
    #[arg(long, global = true, env = "GRADUATION_MODEL_DIR", default_value = "model_bundle")]
    model_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict graduation risk for one student
    Predict {
        /// Semester the student is currently in (2-8)
        #[arg(long)]
        semester: u32,
        /// One completed semester as GPA,CREDITS,PASSED, oldest first
        #[arg(long = "record", value_parser = history::parse_record)]
        records: Vec<SemesterRecord>,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the feature record derived from a history
    Features {
        #[arg(long)]
        semester: u32,
        #[arg(long = "record", value_parser = history::parse_record)]
        records: Vec<SemesterRecord>,
    },
    /// Predict every student in a roster CSV and write a markdown report
    Batch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "early-warning-report.md")]
        out: PathBuf,
    },
    /// List the loaded per-semester models and thresholds
    Models,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict {
            semester,
            records,
            json,
        } => {
            let registry = load_registry(&cli.model_dir)?;
            let result = predict::predict_graduation(&registry, semester, &records);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            print_result(semester, &records, &result);
        }
        Commands::Features { semester, records } => {
            let features = features::build_features(semester, &records);
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
        Commands::Batch { csv, out } => {
            let registry = load_registry(&cli.model_dir)?;
            let students = history::read_roster(&csv)?;

            let outcomes: Vec<StudentOutcome> = students
                .into_iter()
                .map(|student| predict::predict_student(&registry, student))
                .collect();

            let report = report::build_report(
                &csv.display().to_string(),
                Utc::now().date_naive(),
                &outcomes,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(students = outcomes.len(), out = %out.display(), "batch report written");
            println!("Report for {} students written to {}.", outcomes.len(), out.display());
        }
        Commands::Models => {
            let registry = load_registry(&cli.model_dir)?;
            println!("Per-semester models:");
            for summary in registry.summaries() {
                match summary.kind {
                    Some(kind) => println!(
                        "- semester {}: {} ({}) threshold {:.2}, classes {}",
                        summary.semester,
                        summary.model_name.as_deref().unwrap_or("unnamed"),
                        kind,
                        summary.threshold,
                        summary
                            .class_order
                            .map(|classes| classes.join(" / "))
                            .unwrap_or_else(|| "by convention".to_string())
                    ),
                    None => println!(
                        "- semester {}: no model loaded (threshold {:.2})",
                        summary.semester, summary.threshold
                    ),
                }
            }
        }
    }

    Ok(())
}

fn load_registry(model_dir: &Path) -> anyhow::Result<ModelRegistry> {
    ModelRegistry::load(model_dir)
        .with_context(|| format!("failed to load model bundle from {}", model_dir.display()))
}

fn print_result(semester: u32, records: &[SemesterRecord], result: &PredictionResult) {
    let prediction = match result {
        PredictionResult::Prediction(prediction) => prediction,
        PredictionResult::Error { message } => {
            println!("Prediction failed: {message}");
            return;
        }
    };

    println!("Prediction: {}", prediction.outcome_label);
    println!("Risk probability: {:.1}%", prediction.probability * 100.0);
    println!(
        "Risk level: {} (threshold {:.2})",
        prediction.risk_level, prediction.threshold_used
    );
    println!("{}", prediction.risk_level.advice());

    let features = features::build_features(semester, records);
    let gap = features.credit_gap;
    println!(
        "Credits passed: {} of {} minimum ({})",
        features.total_credits_passed,
        features::target_credits(semester),
        if gap > 0 {
            format!("{gap} behind")
        } else {
            format!("{} ahead", gap.abs())
        }
    );
}
