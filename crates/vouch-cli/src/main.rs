//! Vouch CLI - LLM-judged user profile validation
//!
//! # Commands
//!
//! - `check` - Validate one profile JSON file
//! - `batch` - Validate several files with bounded concurrency
//!
//! Results are printed to stdout as JSON; logs go to stderr and the log
//! file.

mod input;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use vouch_core::{ProfileInput, ValidationResult};
use vouch_runtime::{BackendKind, ValidationOrchestrator, ValidatorConfig};

use crate::input::load_profile;

/// Vouch - validate user profiles with a language model
///
/// The model judges every field; Vouch enforces the output contract and
/// repairs malformed responses.
#[derive(Parser)]
#[command(name = "vouch")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the cloud backend regardless of configuration
    #[arg(long, global = true)]
    cloud: bool,

    /// Append logs to this file
    #[arg(long, global = true, value_name = "PATH", default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a single profile file
    ///
    /// Examples:
    ///   vouch check profile.json
    ///   vouch --cloud check profile.json --report
    Check {
        /// Path to the profile JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print every attempt and token usage, not just the result
        #[arg(long)]
        report: bool,
    },
    /// Validate several profile files
    ///
    /// Examples:
    ///   vouch batch a.json b.json
    ///   vouch --cloud batch profiles/*.json --concurrency 4
    Batch {
        /// Paths to profile JSON files
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Records validated at once (keep at 1 for local models)
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_file, cli.verbose) {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Fatal error");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Check { file, report } => {
            tracing::info!(file = %file.display(), "Starting validation for file");

            // Input problems are reported before any backend is set up.
            let input = match load_profile(file) {
                Ok(input) => input,
                Err(e) => {
                    tracing::error!(error = %e, "Unusable input file");
                    print_json(&serde_json::to_value(e.to_result())?)?;
                    return Ok(ExitCode::FAILURE);
                }
            };

            let orchestrator = match build_orchestrator(&cli).await {
                Ok(orchestrator) => orchestrator,
                Err(e) => {
                    print_json(&serde_json::to_value(setup_failure(&e))?)?;
                    return Ok(ExitCode::FAILURE);
                }
            };
            let outcome = orchestrator.validate(&input).await;

            if *report {
                print_json(&serde_json::to_value(&outcome)?)?;
            } else {
                print_json(&serde_json::to_value(&outcome.result)?)?;
            }
            tracing::info!("Output sent to stdout");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Batch { files, concurrency } => {
            let orchestrator = match build_orchestrator(&cli).await {
                Ok(orchestrator) => orchestrator,
                Err(e) => {
                    print_json(&batch_setup_failure(files, &setup_failure(&e))?)?;
                    return Ok(ExitCode::FAILURE);
                }
            };
            let (output, all_readable) = run_batch(&orchestrator, files, *concurrency).await?;
            print_json(&output)?;
            Ok(if all_readable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Validate every readable file and key each result by its path.
async fn run_batch(
    orchestrator: &ValidationOrchestrator,
    files: &[PathBuf],
    concurrency: usize,
) -> anyhow::Result<(Value, bool)> {
    let mut results: Vec<Option<Value>> = vec![None; files.len()];
    let mut pending: Vec<(usize, ProfileInput)> = Vec::new();

    for (i, file) in files.iter().enumerate() {
        match load_profile(file) {
            Ok(input) => pending.push((i, input)),
            Err(e) => {
                tracing::error!(error = %e, "Skipping unusable input file");
                results[i] = Some(serde_json::to_value(e.to_result())?);
            }
        }
    }
    let all_readable = pending.len() == files.len();

    tracing::info!(
        files = files.len(),
        readable = pending.len(),
        concurrency,
        "Starting batch validation"
    );

    let inputs: Vec<ProfileInput> = pending.iter().map(|(_, input)| input.clone()).collect();
    let outcomes = orchestrator.validate_many(&inputs, concurrency).await;

    for ((i, _), outcome) in pending.iter().zip(outcomes) {
        results[*i] = Some(serde_json::to_value(outcome.result)?);
    }

    let mut output = Map::new();
    for (file, result) in files.iter().zip(results) {
        output.insert(
            file.display().to_string(),
            result.unwrap_or(Value::Null),
        );
    }

    Ok((Value::Object(output), all_readable))
}

/// Build the validator and check that its backend answers.
///
/// An unhealthy backend is only logged; each record still gets a result.
async fn build_orchestrator(cli: &Cli) -> anyhow::Result<ValidationOrchestrator> {
    let config = load_config(cli.config.as_deref(), cli.cloud)?;
    tracing::info!(backend = %config.backend, model = config.model(), "LLM provider selected");

    let orchestrator =
        ValidationOrchestrator::from_config(config).context("failed to set up validator")?;
    if !orchestrator.health_check().await {
        tracing::warn!(
            provider = orchestrator.provider_name(),
            "Backend health check failed, requests may end in the fallback result"
        );
    }
    Ok(orchestrator)
}

/// Result printed when the validator cannot be set up.
fn setup_failure(error: &anyhow::Error) -> ValidationResult {
    let message = format!("{:#}", error);
    tracing::error!(error = %message, "Validator setup failed");
    ValidationResult::invalid(vec![message], Vec::new())
}

/// The same setup failure reported for every file of a batch.
fn batch_setup_failure(files: &[PathBuf], result: &ValidationResult) -> anyhow::Result<Value> {
    let result = serde_json::to_value(result)?;
    let output: Map<String, Value> = files
        .iter()
        .map(|file| (file.display().to_string(), result.clone()))
        .collect();
    Ok(Value::Object(output))
}

/// Configuration file (or defaults), then environment, then flags.
fn load_config(path: Option<&Path>, force_cloud: bool) -> anyhow::Result<ValidatorConfig> {
    let config = match path {
        Some(path) => ValidatorConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ValidatorConfig::default(),
    };

    let mut config = config.apply_env();
    if force_cloud {
        config.backend = BackendKind::Cloud;
    }
    Ok(config)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
