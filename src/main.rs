//! Growthcheck: child growth standardization and risk assessment.
//!
//! Command-line front end. Every command prints one JSON document on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use growthcheck::application::RiskClassifier;
use growthcheck::config::AppConfig;
use growthcheck::domain::{ReferenceTable, Severity};
use growthcheck::{
    GrowthEngine, GrowthError, Measurement, Metric, ModelRegistry, ModelSet, RiskAssessment, Sex,
};

#[derive(Debug, Parser)]
#[command(name = "growthcheck", version, about = "Child growth standardization and risk assessment")]
struct Cli {
    /// Model directory (classifier.json, labels.json, regressor.json)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Standards JSON replacing the built-in WHO tables
    #[arg(long, global = true)]
    standards: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Standardized score of one measurement
    Standardize {
        #[arg(long)]
        value: f64,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        sex: Sex,
        #[arg(long)]
        metric: Metric,
    },

    /// Risk category, confidence and anomaly flag
    Classify {
        #[command(flatten)]
        input: MeasurementArgs,

        /// Use the built-in labelling rule instead of the trained classifier
        #[arg(long)]
        rules: bool,
    },

    /// Next-month height/weight projection
    Project {
        #[command(flatten)]
        input: MeasurementArgs,

        /// Include percentile-band chart data
        #[arg(long)]
        bands: bool,
    },

    /// Percentile-band chart series for one sex
    Bands {
        #[arg(long)]
        sex: Sex,
    },

    /// Load and verify the model directory, then describe it
    InspectModels,
}

#[derive(Debug, clap::Args)]
struct MeasurementArgs {
    #[arg(long)]
    age: u32,
    #[arg(long)]
    sex: Sex,
    #[arg(long)]
    height: Option<f64>,
    #[arg(long)]
    weight: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    z_height: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    z_weight: Option<f64>,
}

impl MeasurementArgs {
    fn to_measurement(&self) -> Measurement {
        Measurement {
            age_months: self.age,
            sex: self.sex,
            height_cm: self.height,
            weight_kg: self.weight,
            z_height: self.z_height,
            z_weight: self.z_weight,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = init_logging()?;

    let mut config = AppConfig::from_env_or_default();
    if let Some(dir) = cli.model_dir.clone() {
        config.model_dir = dir;
    }
    if let Some(path) = cli.standards.clone() {
        config.standards_file = Some(path);
    }

    match run(&cli.command, &config) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&error_body(&e))?);
            tracing::error!(kind = e.kind(), "{e}");
            drop(guard);
            std::process::exit(1);
        }
    }
}

fn error_body(e: &GrowthError) -> serde_json::Value {
    json!({ "error": { "kind": e.kind(), "message": e.to_string() } })
}

/// Models for commands that need them; an empty registry otherwise.
fn load_registry(command: &Command, config: &AppConfig) -> growthcheck::Result<ModelRegistry> {
    let needs_models = matches!(
        command,
        Command::Classify { rules: false, .. } | Command::Project { .. } | Command::InspectModels
    );
    if !needs_models {
        return Ok(ModelRegistry::empty());
    }
    let policy = config.verification_policy()?;
    let set = ModelSet::from_dir(&config.model_dir, &policy)?;
    Ok(ModelRegistry::with_models(set))
}

fn run(command: &Command, config: &AppConfig) -> growthcheck::Result<serde_json::Value> {
    let table = Arc::new(match &config.standards_file {
        Some(path) => ReferenceTable::load(path)?,
        None => ReferenceTable::who(),
    });
    let registry = load_registry(command, config)?;
    let engine = GrowthEngine::new(table, Arc::new(registry), config.engine);

    let value = match command {
        Command::Standardize {
            value,
            age,
            sex,
            metric,
        } => {
            let z = engine.standardize(*value, *age, *sex, *metric)?;
            let severity = Severity::from_score(z);
            json!({
                "metric": metric,
                "value": value,
                "unit": metric.unit(),
                "age_months": age,
                "sex": sex,
                "z": z,
                "severity": severity,
                "interpretation": severity.description(),
            })
        }
        Command::Classify { input, rules } => {
            let measurement = input.to_measurement();
            let assessment = if *rules {
                let features = engine.features(&measurement)?;
                let (verdict, model_label) =
                    RiskClassifier::rule_based().classify_labelled(&features, engine.config())?;
                RiskAssessment {
                    verdict,
                    features,
                    model_label,
                    model_version: 0,
                }
            } else {
                engine.assess_risk(&measurement)?
            };
            let mut value = serde_json::to_value(&assessment)?;
            value["summary"] = json!(assessment.verdict.summary());
            value
        }
        Command::Project { input, bands } => {
            serde_json::to_value(engine.project_trajectory(&input.to_measurement(), *bands)?)?
        }
        Command::Bands { sex } => json!({
            "sex": sex,
            "bands": engine.reference_series(*sex)?,
        }),
        Command::InspectModels => serde_json::to_value(engine.registry().current()?.info())?,
    };
    Ok(value)
}

/// Initialize logging.
///
/// JSON goes to stdout, so logs default to stderr. `GROWTHCHECK_LOG_MODE=file`
/// sends them to `GROWTHCHECK_LOG_FILE` instead.
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_mode = std::env::var("GROWTHCHECK_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file = std::env::var("GROWTHCHECK_LOG_FILE")
            .unwrap_or_else(|_| "growthcheck.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_command() -> Command {
        Command::Project {
            input: MeasurementArgs {
                age: 12,
                sex: Sex::Male,
                height: Some(75.5),
                weight: Some(9.8),
                z_height: None,
                z_weight: None,
            },
            bands: false,
        }
    }

    #[test]
    fn test_signed_models_without_key_report_kind() {
        let config = AppConfig {
            model_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models"),
            require_signed_models: true,
            pubkey_file: None,
            ..AppConfig::default()
        };

        let err = run(&project_command(), &config).expect_err("no verifying key");
        assert_eq!(err.kind(), "model_unavailable");

        let body = error_body(&err);
        assert_eq!(body["error"]["kind"], "model_unavailable");
        assert!(body["error"]["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn test_commands_without_models_skip_verification() {
        let config = AppConfig {
            model_dir: PathBuf::from("does-not-exist"),
            require_signed_models: true,
            ..AppConfig::default()
        };
        let command = Command::Bands { sex: Sex::Female };

        assert_eq!(load_registry(&command, &config).expect("registry").version(), 0);
        let value = run(&command, &config).expect("bands");
        assert_eq!(value["sex"], "female");
    }

    #[test]
    fn test_standardize_output() {
        let command = Command::Standardize {
            value: 9.8,
            age: 12,
            sex: Sex::Male,
            metric: Metric::Weight,
        };
        let value = run(&command, &AppConfig::default()).expect("standardize");
        assert_eq!(value["unit"], "kg");
        assert_eq!(value["severity"], "normal");
        assert_eq!(value["interpretation"], "Within the expected range");
    }

    #[test]
    fn test_missing_standards_file_reports_kind() {
        let config = AppConfig {
            standards_file: Some(PathBuf::from("does-not-exist.json")),
            ..AppConfig::default()
        };
        let err = run(&Command::Bands { sex: Sex::Male }, &config).expect_err("missing file");
        assert_eq!(err.kind(), "io_error");
    }
}
