//! Dropout CLI - scores students with the dropout risk engine

#![deny(warnings)]

// Global invariants enforced:
// - Results go to stdout; diagnostics and logs go to stderr
// - All rows of one batch run share a single timestamp

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dropout_core::batch::{self, RowOutcome};
use dropout_core::config::{self, ResolvedConfig};
use dropout_core::delta::AssessmentDelta;
use dropout_core::{
    render_explain, render_json, render_text, PredictionHistory, PredictionRecord, StudentSignals,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dropout")]
#[command(about = "Student dropout risk assessment")]
#[command(version = env!("DROPOUT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a single student
    Assess {
        /// Attendance rate in percent [0, 100]
        #[arg(long, allow_negative_numbers = true)]
        attendance: f64,

        /// Family monthly income in local currency units
        #[arg(long, allow_negative_numbers = true)]
        income: f64,

        /// Whether the father is alive
        #[arg(long, action = clap::ArgAction::Set)]
        father_alive: bool,

        /// Whether the mother is alive
        #[arg(long, action = clap::ArgAction::Set)]
        mother_alive: bool,

        /// Free-text intervention notes (not scored)
        #[arg(long)]
        notes: Option<String>,

        /// Student id; required with --output
        #[arg(long)]
        student: Option<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Show how each sub-score was reached (text format only)
        #[arg(long)]
        explain: bool,

        /// Append the assessment to this student's history file (created if missing)
        #[arg(long, requires = "student")]
        history: Option<PathBuf>,

        /// Write the prediction record to this path; its version comes from --history, else 1
        #[arg(long, requires = "student")]
        output: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Assess every student in a JSONL roster
    Batch {
        /// Roster file, one JSON object per line
        path: PathBuf,

        /// Output format
        #[arg(long, default_value = "jsonl")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compare two prediction records of the same student
    Delta {
        /// Earlier prediction record
        before: PathBuf,
        /// Later prediction record
        after: PathBuf,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without scoring anything
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

/// One batch output line
#[derive(Serialize)]
struct BatchRow<'a> {
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assessment: Option<&'a dropout_core::RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a RowOutcome> for BatchRow<'a> {
    fn from(outcome: &'a RowOutcome) -> Self {
        BatchRow {
            line: outcome.line,
            student_id: outcome.student_id.as_deref(),
            assessment: outcome.result.as_ref().ok(),
            error: outcome.result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assess {
            attendance,
            income,
            father_alive,
            mother_alive,
            notes,
            student,
            format,
            explain,
            history,
            output,
            config: config_path,
        } => {
            if explain && format != OutputFormat::Text {
                anyhow::bail!("--explain is only valid with --format text");
            }

            let resolved = load_config(config_path.as_deref())?;
            let scorer = resolved.scorer()?;

            let signals = StudentSignals::new(attendance, income, father_alive, mother_alive, notes)
                .context("invalid student signals")?;
            let assessment = scorer
                .assess(signals.clone())
                .context("invalid student signals")?;

            match format {
                OutputFormat::Text => {
                    if let Some(ref currency) = resolved.currency {
                        println!("Currency: {}", currency);
                    }
                    print!("{}", render_text(&assessment));
                    if explain {
                        println!();
                        print!("{}", render_explain(&scorer, &signals));
                    }
                }
                OutputFormat::Json | OutputFormat::Jsonl => {
                    println!("{}", render_json(&assessment));
                }
            }

            let Some(student_id) = student else {
                return Ok(());
            };

            let record = match history {
                Some(history_path) => {
                    let mut ledger = PredictionHistory::load_or_new(&history_path, &student_id)?;
                    let record = ledger.record(assessment)?.clone();
                    ledger.save(&history_path)?;
                    eprintln!(
                        "Recorded prediction version {} in {}",
                        record.version,
                        history_path.display()
                    );
                    record
                }
                None => PredictionRecord::new(student_id, 1, assessment),
            };

            if let Some(path) = output {
                std::fs::write(&path, record.to_json()?)
                    .with_context(|| format!("failed to write record: {}", path.display()))?;
                eprintln!("Wrote prediction record: {}", path.display());
            }
        }
        Commands::Batch {
            path,
            format,
            config: config_path,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let scorer = resolved.scorer()?;

            let input = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read roster: {}", path.display()))?;
            let outcomes = batch::assess_roster(&scorer, &input, Utc::now());

            print!("{}", render_batch(&outcomes, format)?);

            let failed: Vec<&RowOutcome> =
                outcomes.iter().filter(|o| o.result.is_err()).collect();
            for outcome in &failed {
                if let Err(ref e) = outcome.result {
                    eprintln!("line {}: {}", outcome.line, e);
                }
            }
            if !failed.is_empty() {
                eprintln!(
                    "{} of {} roster row(s) failed",
                    failed.len(),
                    outcomes.len()
                );
                std::process::exit(1);
            }
        }
        Commands::Delta { before, after } => {
            let before = read_record(&before)?;
            let after = read_record(&after)?;
            let delta = AssessmentDelta::between_records(&before, &after)?;
            println!("{}", delta.to_json()?);
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => match load_config(path.as_deref()) {
                Ok(config) => {
                    if let Some(ref p) = config.config_path {
                        println!("Config valid: {}", p.display());
                    } else {
                        println!("No config file found. Using defaults.");
                    }
                }
                Err(e) => {
                    eprintln!("Config validation failed: {:#}", e);
                    std::process::exit(1);
                }
            },
            ConfigAction::Show { path } => {
                let resolved = load_config(path.as_deref())?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!(
                    "  Currency: {}",
                    resolved.currency.as_deref().unwrap_or("none")
                );
                println!();
                println!("Income bands:");
                println!("  extreme_floor: {}", resolved.income_bands.extreme_floor);
                println!("  low_floor: {}", resolved.income_bands.low_floor);
                println!("  mid_floor: {}", resolved.income_bands.mid_floor);
                println!("  cap: {}", resolved.income_bands.cap);
            }
        },
    }

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let cwd = std::env::current_dir()?;
    let resolved =
        config::load_and_resolve(&cwd, config_path).context("failed to load configuration")?;
    if let Some(ref p) = resolved.config_path {
        tracing::info!(path = %p.display(), "using config");
    }
    Ok(resolved)
}

fn read_record(path: &Path) -> anyhow::Result<PredictionRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read record: {}", path.display()))?;
    PredictionRecord::from_json(&content)
        .with_context(|| format!("invalid prediction record: {}", path.display()))
}

fn render_batch(outcomes: &[RowOutcome], format: OutputFormat) -> anyhow::Result<String> {
    let mut output = String::new();
    match format {
        OutputFormat::Jsonl => {
            for outcome in outcomes {
                output.push_str(&serde_json::to_string(&BatchRow::from(outcome))?);
                output.push('\n');
            }
        }
        OutputFormat::Json => {
            let rows: Vec<BatchRow> = outcomes.iter().map(BatchRow::from).collect();
            output.push_str(&serde_json::to_string_pretty(&rows)?);
            output.push('\n');
        }
        OutputFormat::Text => {
            output.push_str(&format!(
                "{:<6} {:<16} {:<10} {:<8} {}\n",
                "LINE", "STUDENT", "LEVEL", "OVERALL", "FACTORS"
            ));
            for outcome in outcomes {
                let student = outcome.student_id.as_deref().unwrap_or("-");
                match &outcome.result {
                    Ok(a) => {
                        let factors = if a.risk_factors().is_empty() {
                            "-".to_string()
                        } else {
                            a.risk_factors().join("; ")
                        };
                        output.push_str(&format!(
                            "{:<6} {:<16} {:<10} {:<8} {}\n",
                            outcome.line,
                            student,
                            a.risk_level().as_str(),
                            a.overall_risk_score(),
                            factors
                        ));
                    }
                    Err(e) => {
                        output.push_str(&format!(
                            "{:<6} {:<16} {:<10} {:<8} {}\n",
                            outcome.line, student, "ERROR", "-", e
                        ));
                    }
                }
            }
        }
    }
    Ok(output)
}
