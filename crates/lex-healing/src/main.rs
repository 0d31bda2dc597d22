//! CLI entry point for the self-healing data engine.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use dotenv::dotenv;
use lex_healing::{
    DriftResult, Engine, EngineConfig, ExecutionMode, HealingLog, StreamConfig, StreamSummary,
    TableReplaySource, TableSource, run_health_check,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Self-healing data quality engine",
    long_about = "Scans CSV tables for missing-value drift, repairs them and monitors \
                  streams of micro-batches.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  RENDER, RENDER_SERVICE_ID, RENDER_INSTANCE_ID, IS_PULL_REQUEST, DYNO, PORT\n  \
                  Any of these set selects cloud mode (tables read in full).\n\n\
                  EXAMPLES:\n  \
                  lex-healing scan data/raw/sales.csv\n  \
                  lex-healing heal data/raw/sales.csv -o data/clean/sales.csv\n  \
                  lex-healing stream --batches 50 --drift-probability 0.2\n  \
                  lex-healing health-check"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs so stdout only carries the JSON document.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    policy: PolicyArgs,

    #[command(subcommand)]
    command: Command,
}

/// Repair and alert policy overrides.
#[derive(ClapArgs, Debug)]
struct PolicyArgs {
    /// Drop columns with more than this percentage of nulls
    #[arg(long, global = true)]
    drop_threshold: Option<f64>,

    /// Impute numeric columns with less than this percentage of nulls
    #[arg(long, global = true)]
    impute_threshold: Option<f64>,

    /// Drift score above which a table needs healing (0.0 - 1.0)
    #[arg(long, global = true)]
    critical_drift: Option<f64>,

    /// Z-score above which a numeric value counts as an anomaly
    #[arg(long, global = true)]
    z_threshold: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a CSV file for missing-value drift
    Scan {
        /// Path to the CSV file
        input: PathBuf,
    },

    /// Drop, impute and flag columns, then write the cleaned CSV
    Heal {
        /// Path to the CSV file
        input: PathBuf,

        /// Where to write the cleaned CSV (default: <input>_cleaned.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the streaming monitor
    Stream {
        /// Replay this CSV instead of generating synthetic transactions
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Stop after this many batches (0 runs until interrupted)
        #[arg(long, default_value = "20")]
        batches: usize,

        /// Rows per batch
        #[arg(long, default_value = "50")]
        batch_size: usize,

        /// Probability of a synthetic drift event per batch
        #[arg(long, default_value = "0.1")]
        drift_probability: f64,

        /// Seed for reproducible synthetic batches
        #[arg(long)]
        seed: Option<u64>,

        /// Pause between batches in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Run a scan and heal cycle on generated data; exits 1 on failure
    #[command(alias = "health_check")]
    HealthCheck,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    // Execution-mode signals may come from .env
    dotenv().ok();
    let mode = ExecutionMode::detect();

    let config = build_config(&cli.policy, mode)?;

    match cli.command {
        Command::Scan { ref input } => {
            let engine = Engine::builder().config(config).build()?;
            let result = engine
                .scan(&TableSource::path(input))
                .with_context(|| format!("Scan of {} failed", input.display()))?;
            print_output(&result, cli.json, print_scan)?;
        }
        Command::Heal {
            ref input,
            ref output,
        } => {
            let engine = Engine::builder().config(config).build()?;
            let log = engine
                .heal(&TableSource::path(input), output.as_deref())
                .with_context(|| format!("Healing of {} failed", input.display()))?;
            print_output(&log, cli.json, print_healing)?;
        }
        Command::Stream {
            ref input,
            batches,
            batch_size,
            drift_probability,
            seed,
            delay_ms,
        } => {
            let mut builder = StreamConfig::builder()
                .batch_size(batch_size)
                .drift_probability(drift_probability)
                .tick_delay(Duration::from_millis(delay_ms));
            builder = if batches == 0 {
                builder.unbounded()
            } else {
                builder.max_batches(batches)
            };
            if let Some(seed) = seed {
                builder = builder.seed(seed);
            }
            let stream_config = builder.build()?;
            let engine = Engine::builder().config(config).build()?;

            let summary = match input {
                Some(path) => {
                    let df = engine.load_table(&TableSource::path(path))?;
                    let source = TableReplaySource::new(df, batch_size)?;
                    engine
                        .stream_controller(source, stream_config)?
                        .on_alert(|alert| warn!("ALERT {}", alert.summary()))
                        .run()?
                }
                None => engine
                    .synthetic_stream(stream_config)?
                    .on_alert(|alert| warn!("ALERT {}", alert.summary()))
                    .run()?,
            };
            print_output(&summary, cli.json, print_stream)?;
        }
        Command::HealthCheck => {
            info!("Starting system health check ({} mode)", mode.as_str());
            match run_health_check(&config) {
                Ok(report) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("Health check passed");
                        println!("  Mode:        {}", report.execution_mode.as_str());
                        println!("  Drift score: {:.2}%", report.drift_score * 100.0);
                        println!("  Gaps found:  {}", report.value_missing);
                        println!("  Rows:        {}", report.rows_processed);
                    }
                }
                Err(e) => {
                    error!("Health check failed: {}", e);
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&e)?);
                    } else {
                        eprintln!("Health check failed: {}", e);
                    }
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_config(policy: &PolicyArgs, mode: ExecutionMode) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder().execution_mode(mode);
    if let Some(value) = policy.drop_threshold {
        builder = builder.drop_threshold(value);
    }
    if let Some(value) = policy.impute_threshold {
        builder = builder.impute_threshold(value);
    }
    if let Some(value) = policy.critical_drift {
        builder = builder.critical_drift_threshold(value);
    }
    if let Some(value) = policy.z_threshold {
        builder = builder.anomaly_z_threshold(value);
    }
    Ok(builder.build()?)
}

fn print_output<T: serde::Serialize>(value: &T, json: bool, human: fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

// Plain println! here: this is the command's result, not a log line.

fn print_scan(result: &DriftResult) {
    println!("\n{}", "=".repeat(60));
    println!("DRIFT SCAN");
    println!("{}", "=".repeat(60));
    println!("  Rows:        {}", result.num_rows);
    println!("  Columns:     {}", result.num_columns);
    println!(
        "  Drift score: {:.1}% ({})",
        result.drift_score * 100.0,
        result.severity.display_name()
    );
    if result.requires_healing {
        println!("  CRITICAL DRIFT: run `heal` on this file");
    }
    println!("  {}", result.severity.recommendation());

    if !result.missing_stats.columns_with_missing.is_empty() {
        println!("\n  {:<24} {:>8} {:>9}", "Column", "Missing", "Percent");
        println!("  {}", "-".repeat(43));
        for column in &result.missing_stats.columns_with_missing {
            println!(
                "  {:<24} {:>8} {:>8.1}%",
                truncate_str(&column.column, 24),
                column.count,
                column.percentage
            );
        }
    }
    println!();
}

fn print_healing(log: &HealingLog) {
    println!("\n{}", "=".repeat(60));
    println!("HEALING SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  Rows processed: {}", log.rows_processed);
    println!("  Dropped:        {:?}", log.columns_dropped);
    for imputed in &log.columns_imputed {
        println!(
            "  Imputed:        {} ({} = {:.2})",
            imputed.column, imputed.method, imputed.value
        );
    }
    for flagged in &log.columns_flagged {
        println!(
            "  Flagged:        {} ({:.1}% missing)",
            flagged.column, flagged.null_percentage
        );
    }
    for skipped in &log.columns_skipped {
        println!("  Skipped:        {} ({})", skipped.column, skipped.reason);
    }
    if let (Some(path), Some(size)) = (&log.output_path, &log.output_size) {
        println!("  Output:         {} ({})", path.display(), size);
    }
    println!();
}

fn print_stream(summary: &StreamSummary) {
    println!("\n{}", "=".repeat(60));
    println!("STREAM SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  Batches processed: {}", summary.batches_processed);
    println!("  Batches retained:  {}", summary.batches);
    println!("  Mean health:       {:.3}", summary.mean_health_score);
    println!("  Mean drift:        {:.3}", summary.mean_drift_score);
    println!("  Total anomalies:   {}", summary.total_anomalies);
    println!("  Alerts raised:     {}", summary.alerts_raised);
    println!();
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_credits_package_authors() {
        let command = Cli::command();
        assert_eq!(command.get_author(), Some(env!("CARGO_PKG_AUTHORS")));
    }

    #[test]
    fn test_health_check_alias() {
        let cli = Cli::try_parse_from(["lex-healing", "health_check"]).unwrap();
        assert!(matches!(cli.command, Command::HealthCheck));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a_very_long_column_name", 10), "a_very_...");
    }
}
