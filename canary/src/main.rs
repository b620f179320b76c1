//! Message-producing conformance test client.
//!
//! Classifies message files locally and drives producing tests against a
//! Canary test service: fetch a reference test, submit a produced message,
//! and write the HTML report once the test is completed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use canary::controller::SessionController;
use canary::core::issues::evaluate_capture;
use canary::core::jurisdictions::JURISDICTIONS;
use canary::core::types::Issue;
use canary::error::SessionError;
use canary::exit_codes;
use canary::flow::{FlowInput, run_flow};
use canary::io::client::HttpTestRepository;
use canary::io::config::{CanaryConfig, load_config};
use canary::io::message::{load_issues, load_message};
use canary::io::report::write_report;
use canary::logging;

#[derive(Parser)]
#[command(
    name = "canary",
    version,
    about = "Message-producing conformance tests against a Canary test service"
)]
struct Cli {
    /// Path to the client config (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "canary.toml")]
    config: PathBuf,

    /// Override the test service base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical type of a message file and its aggregated issues.
    Classify {
        /// FHIR message bundle (JSON).
        message: PathBuf,
        /// Expected message type; adds a mismatch issue when it differs.
        #[arg(long)]
        expected: Option<String>,
        /// Validator issues for the message (JSON array).
        #[arg(long)]
        issues: Option<PathBuf>,
    },
    /// Load a connectathon test and print it.
    Fetch {
        /// Jurisdiction code (e.g. MA, YC).
        #[arg(long)]
        state: String,
        /// Connectathon record id (1-5).
        #[arg(long)]
        record: String,
    },
    /// Run a producing test end to end.
    Run {
        #[arg(long)]
        state: String,
        #[arg(long)]
        record: String,
        /// Message type being produced (e.g. Submission).
        #[arg(long = "type")]
        expected_type: String,
        /// Produced message (FHIR message bundle, JSON).
        #[arg(long)]
        message: PathBuf,
        /// Validator issues for the message (JSON array).
        #[arg(long)]
        issues: Option<PathBuf>,
        /// Where to write the report; defaults to the configured `report_dir`.
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// List the jurisdiction codes a test can be generated for.
    Jurisdictions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Classification {
    actual_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_type: Option<String>,
    issues: Vec<Issue>,
}

#[tokio::main]
async fn main() {
    logging::init();
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SessionError>() {
        Some(session_err) if session_err.is_remote() => exit_codes::REMOTE,
        _ => exit_codes::INVALID,
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = resolve_config(&cli.config, cli.api_url.as_deref())?;
    match cli.command {
        Command::Classify {
            message,
            expected,
            issues,
        } => cmd_classify(&config, &message, expected.as_deref(), issues.as_deref()),
        Command::Fetch { state, record } => cmd_fetch(&config, &state, &record).await,
        Command::Run {
            state,
            record,
            expected_type,
            message,
            issues,
            report_dir,
        } => {
            let input = FlowInput {
                state_code: state,
                record_id: record,
                expected_type,
                message: load_message(&message)?,
                issues: issues.as_deref().map(load_issues).transpose()?,
            };
            let report_dir = report_dir.unwrap_or_else(|| config.report_dir.clone());
            cmd_run(&config, input, &report_dir).await
        }
        Command::Jurisdictions => {
            for jurisdiction in JURISDICTIONS {
                println!("{}\t{}", jurisdiction.code, jurisdiction.name);
            }
            Ok(exit_codes::OK)
        }
    }
}

fn resolve_config(path: &Path, api_url: Option<&str>) -> Result<CanaryConfig> {
    let mut config = load_config(path)?;
    if let Some(api_url) = api_url {
        config.api_url = api_url.to_string();
        config.validate().context("--api-url")?;
    }
    debug!(api_url = %config.api_url, "config resolved");
    Ok(config)
}

fn controller(config: &CanaryConfig) -> Result<SessionController<HttpTestRepository>> {
    let repository = HttpTestRepository::new(config)?;
    Ok(SessionController::new(
        repository,
        config.message_type_table(),
    ))
}

fn cmd_classify(
    config: &CanaryConfig,
    message: &Path,
    expected: Option<&str>,
    issues: Option<&Path>,
) -> Result<i32> {
    let table = config.message_type_table();
    let message = load_message(message)?;
    let remote = issues.map(load_issues).transpose()?;
    let classification = match expected {
        Some(expected) => {
            let evaluation = evaluate_capture(&table, &message, expected, remote.as_deref());
            Classification {
                actual_type: evaluation.actual_type,
                expected_type: Some(expected.to_string()),
                issues: evaluation.issues,
            }
        }
        None => Classification {
            actual_type: table.classify(Some(&message)),
            expected_type: None,
            issues: remote.unwrap_or_default(),
        },
    };
    print_json(&classification)?;
    Ok(exit_codes::OK)
}

async fn cmd_fetch(config: &CanaryConfig, state: &str, record: &str) -> Result<i32> {
    let controller = controller(config)?;
    controller.select_and_fetch(state, record).await?;
    print_json(&controller.view().await)?;
    Ok(exit_codes::OK)
}

async fn cmd_run(config: &CanaryConfig, input: FlowInput, report_dir: &Path) -> Result<i32> {
    let controller = controller(config)?;
    let outcome = run_flow(&controller, input).await?;
    let view = &outcome.view;

    for issue in &view.issues {
        eprintln!("{:?}: {}", issue.severity, issue.message);
    }
    if outcome.already_completed {
        println!("test was already completed");
    }
    if let Some(results) = &view.results {
        let summary = results.summary;
        println!(
            "total: {} correct: {} incorrect: {}",
            summary.total, summary.correct, summary.incorrect
        );
    }

    if !outcome.completed() {
        println!("test not completed");
        return Ok(exit_codes::INCOMPLETE);
    }
    if let Some(report) = controller.report_view().await {
        let path = write_report(report_dir, &report)?;
        println!("report: {}", path.display());
    }
    Ok(exit_codes::OK)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
