//! `quiz`: terminal front-end for the AI course quiz engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use quiz_core::model::{Catalog, QuizMode, StudySettings};
use services::{Clock, LoadStatus, SaveStatus, SelectionError, StudyServices};
use storage::{JsonFileRepository, Storage};

mod play;

const DEFAULT_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Parser)]
#[command(name = "quiz", version, about = "Spaced-repetition quizzes for the AI course")]
struct Cli {
    /// Progress file
    #[arg(long, global = true, default_value = "quiz-progress.json")]
    data: PathBuf,

    /// Question catalog JSON (defaults to the built-in AI course catalog)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Study settings JSON
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a quiz session
    Play {
        /// daily-challenge, random, interleaved, time-attack, weak-area-drill, short-answer
        #[arg(long, short, default_value = "daily-challenge")]
        mode: String,

        /// Number of questions (defaults per mode)
        #[arg(long, short = 'n')]
        count: Option<usize>,

        /// Randomise ties when topping up a session
        #[arg(long)]
        shuffle: bool,
    },

    /// Show progress and per-topic statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the gradebook report
    Report {
        #[arg(long)]
        student: Option<String>,

        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Erase all saved progress
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List quiz modes
    Modes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Modes = cli.command {
        for mode in QuizMode::ALL {
            let limit = mode
                .time_limit()
                .map(|d| format!(", {}s limit", d.as_secs()))
                .unwrap_or_default();
            println!("{:<16} {} questions{limit}", mode.as_str(), mode.default_count());
        }
        return Ok(());
    }

    let catalog = load_catalog(cli.catalog.as_deref()).await?;
    let settings = load_settings(cli.settings.as_deref()).await?;
    let storage = Storage {
        snapshots: Arc::new(JsonFileRepository::new(&cli.data)),
    };
    let services = StudyServices::new(Clock::default(), settings, Arc::new(catalog), storage)
        .context("invalid study settings")?;

    match cli.command {
        Commands::Play {
            mode,
            count,
            shuffle,
        } => {
            let mode: QuizMode = mode
                .parse()
                .map_err(|_| SelectionError::UnknownMode(mode.clone()))?;
            let services = services.with_shuffle(shuffle);
            let mut ctx = bootstrap(&services).await;
            play::run(&services, &mut ctx, mode, count).await
        }
        Commands::Stats { json } => {
            let ctx = bootstrap(&services).await;
            let stats = services.stats(&ctx);
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                play::print_stats(&stats);
            }
            Ok(())
        }
        Commands::Report {
            student,
            format,
            output,
        } => {
            let ctx = bootstrap(&services).await;
            let report = services.gradebook(&ctx, student.as_deref());
            let text = match format {
                ReportFormat::Json => report.to_json_pretty()?,
                ReportFormat::Csv => report.to_csv()?,
            };
            match output {
                Some(path) => {
                    tokio::fs::write(&path, text)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Gradebook written to {}", path.display());
                }
                None => println!("{text}"),
            }
            Ok(())
        }
        Commands::Reset { yes } => {
            if !yes && !play::confirm("Erase all saved progress?")? {
                println!("Nothing changed.");
                return Ok(());
            }
            let (_, status) = services.reset().await;
            report_save(&status);
            if status.is_saved() {
                println!("Progress reset.");
            }
            Ok(())
        }
        Commands::Modes => Ok(()),
    }
}

async fn bootstrap(services: &StudyServices) -> services::StudyContext {
    let (ctx, status) = services.bootstrap().await;
    if let LoadStatus::Recovered { reason } = status {
        eprintln!("warning: saved progress could not be used ({reason}); starting fresh");
    }
    ctx
}

fn report_save(status: &SaveStatus) {
    match status {
        SaveStatus::Saved => {}
        SaveStatus::Degraded { reason } => {
            eprintln!("warning: progress not saved ({reason}); it will be lost on exit");
        }
        SaveStatus::Skipped => eprintln!("warning: saving is disabled for this run"),
    }
}

async fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => storage::load_catalog(path)
            .await
            .with_context(|| format!("loading catalog {}", path.display())),
        None => storage::parse_catalog(DEFAULT_CATALOG).context("built-in catalog is invalid"),
    }
}

async fn load_settings(path: Option<&Path>) -> Result<StudySettings> {
    let Some(path) = path else {
        return Ok(StudySettings::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading settings {}", path.display()))?;
    let settings: StudySettings = serde_json::from_str(&text)
        .with_context(|| format!("parsing settings {}", path.display()))?;
    if let Err(err) = settings.validate() {
        bail!("settings {}: {err}", path.display());
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_catalog_is_valid() {
        let catalog = storage::parse_catalog(DEFAULT_CATALOG).unwrap();
        assert!(catalog.len() >= 12);
        assert!(catalog.topics().count() >= 4);
    }

    #[test]
    fn cli_parses_play_flags() {
        let cli = Cli::try_parse_from(["quiz", "play", "--mode", "interleaved", "-n", "6"]).unwrap();
        match cli.command {
            Commands::Play { mode, count, shuffle } => {
                assert_eq!(mode, "interleaved");
                assert_eq!(count, Some(6));
                assert!(!shuffle);
            }
            _ => panic!("expected play"),
        }
        assert_eq!(cli.data, PathBuf::from("quiz-progress.json"));
    }

    #[test]
    fn cli_parses_report_format() {
        let cli = Cli::try_parse_from(["quiz", "report", "--format", "csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Report {
                format: ReportFormat::Csv,
                ..
            }
        ));
        let cli = Cli::try_parse_from(["quiz", "report"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Report {
                format: ReportFormat::Json,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["quiz", "report", "--format", "xml"]).is_err());
    }
}
