use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use ft::aggregate::RunContext;
use ft::classify::PatternVocabulary;
use ft::config::Config;
use ft::error::AnalyzerError;
use ft::history::HistoryStore;
use ft::outcome::Verdict;
use ft::{identity, ingest};

#[derive(Parser)]
#[command(name = "ft")]
#[command(about = "Record test outcomes over time and detect flaky tests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a run's results against cross-run history
    Analyze {
        /// Structured results document (cucumber-style JSON) [default: target/cucumber.json]
        #[arg(long, conflicts_with = "log")]
        results: Option<PathBuf>,
        /// Raw captured console log to scrape instead of a results document
        #[arg(long)]
        log: Option<PathBuf>,
        /// History file [default: from config]
        #[arg(long)]
        history: Option<PathBuf>,
        /// Write summary rows and totals as JSON for an external renderer
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Show derived stats for one test key
    Stats {
        /// Test key, e.g. features/login.feature:12
        key: String,
        /// History file [default: from config]
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Delete recorded history
    Clean {
        #[command(subcommand)]
        mode: CleanMode,
    },
}

#[derive(Subcommand)]
enum CleanMode {
    /// Delete the whole history file
    All {
        /// History file [default: from config]
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new()?;

    match cli.command {
        Commands::Analyze {
            results,
            log,
            history,
            json,
        } => analyze(&config, results, log, history, json),
        Commands::Stats { key, history } => stats(&config, &key, history),
        Commands::Clean {
            mode: CleanMode::All { history },
        } => clean_all(&config, history),
    }
}

fn analyze(
    config: &Config,
    results: Option<PathBuf>,
    log: Option<PathBuf>,
    history: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let history_path = history.unwrap_or_else(|| config.history.file.clone());
    let vocab = PatternVocabulary::new(&config.classify.extra_patterns);
    let mut store = HistoryStore::load(&history_path, config.report.trend_window);
    let mut ctx = RunContext::new(Utc::now(), config.report.trend_window);

    let source = match log {
        Some(path) => fs::read_to_string(&path)
            .map_err(|e| AnalyzerError::SourceUnavailable(format!("{}: {}", path.display(), e)))
            .and_then(|text| ingest::console_log(&text)),
        None => {
            let path = results.unwrap_or_else(|| PathBuf::from("target/cucumber.json"));
            ingest::results_document(&path)
        }
    };

    let outcomes = match source {
        Ok(outcomes) => outcomes,
        Err(err @ AnalyzerError::SourceUnavailable(_)) => {
            // Recoverable: skip this run's classification, leave history alone.
            eprintln!("{}", format!("{} - skipping this run", err).yellow());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    for scenario in outcomes {
        match identity::resolve(&scenario.meta) {
            Ok(key) => ctx.record(&mut store, &vocab, config.classify.rule, key, scenario),
            Err(err) => ctx.skip(err.to_string()),
        }
    }

    // Exactly one persist per run, after all appends. Failing here is
    // fatal: a silently lost run would poison every later verdict.
    store.persist()?;

    print_summary(&ctx);

    if let Some(path) = json {
        let summary = serde_json::json!({
            "rows": ctx.rows(),
            "totals": ctx.totals(),
            "skipped": ctx.skipped(),
        });
        fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        println!("{}", format!("Summary written to {}", path.display()).green());
    }

    Ok(())
}

fn print_summary(ctx: &RunContext) {
    let totals = ctx.totals();
    println!(
        "{} {} | {} {} | {} {} | {} {}",
        "Total:".bold(),
        totals.total,
        "Passed:".green().bold(),
        totals.passed,
        "Flaky:".yellow().bold(),
        totals.flaky,
        "Failed:".red().bold(),
        totals.failed,
    );
    println!();

    for row in ctx.rows() {
        let verdict = match row.verdict {
            Verdict::Passed => row.verdict.to_string().green(),
            Verdict::Flaky => row.verdict.to_string().yellow(),
            Verdict::Failed => row.verdict.to_string().red(),
        };
        println!(
            "{:<7} {:>6.1}% {} {}  {}  {}",
            verdict,
            row.stability_percent,
            trend_marks(&row.recent_trend),
            row.key.bold(),
            format_last_passed(row.last_passed).dimmed(),
            row.reason,
        );
    }

    if !ctx.skipped().is_empty() {
        println!();
        println!(
            "{}",
            format!(
                "{} outcome(s) had no stable identity and were not classified:",
                ctx.skipped().len()
            )
            .yellow()
            .bold()
        );
        for detail in ctx.skipped() {
            println!("  {}", detail.yellow());
        }
    }
}

fn trend_marks(trend: &[bool]) -> String {
    if trend.is_empty() {
        return "-".to_string();
    }
    trend.iter().map(|p| if *p { '✅' } else { '❌' }).collect()
}

fn format_last_passed(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(t) => format!("last passed {}", t.format("%Y-%m-%d %H:%M:%S")),
        None => "never passed".to_string(),
    }
}

fn stats(config: &Config, key: &str, history: Option<PathBuf>) -> Result<()> {
    let history_path = history.unwrap_or_else(|| config.history.file.clone());
    let store = HistoryStore::load(&history_path, config.report.trend_window);

    if store.history(key).is_empty() {
        println!("{}", format!("No history recorded for {}", key).yellow());
        return Ok(());
    }

    let stats = store.stats_for(key, Utc::now());
    println!("{}", key.bold());
    println!(
        "  {} {} passed, {} failed over {} runs",
        "Runs:".bold(),
        stats.pass_count.to_string().green(),
        stats.fail_count.to_string().red(),
        stats.total_runs(),
    );
    println!("  {} {:.1}%", "Stability:".bold(), stats.stability_percent());
    println!("  {} {}", "Trend:".bold(), trend_marks(&stats.recent_trend));
    println!("  {}", format_last_passed(stats.last_passed));
    Ok(())
}

fn clean_all(config: &Config, history: Option<PathBuf>) -> Result<()> {
    let history_path = history.unwrap_or_else(|| config.history.file.clone());
    if !history_path.exists() {
        println!("{}", "No history file to delete".yellow());
        return Ok(());
    }

    print!(
        "{}",
        format!("Delete all history in {}? (yes/no): ", history_path.display()).yellow()
    );
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() || input.trim().to_lowercase() != "yes" {
        println!("{}", "Aborted".yellow());
        return Ok(());
    }

    HistoryStore::wipe(&history_path)?;
    println!("{}", "History deleted".green().bold());
    Ok(())
}
