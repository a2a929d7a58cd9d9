//! codescope CLI: analyze source trees, search the corpus, and correlate
//! alerts from the command line. All commands print JSON to stdout; logs go
//! to stderr via tracing.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use codescope::{
    AlertRecord, CodeScopeEngine, Config, Language, SearchFilters, Severity,
};

#[derive(Parser)]
#[command(name = "codescope", about = "Structural code analysis and search", version)]
struct Cli {
    /// Optional TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one file or a directory tree.
    Analyze {
        path: PathBuf,
        /// Embed and index the results for semantic search.
        #[arg(long)]
        embeddings: bool,
        /// Restrict a directory scan to one language.
        #[arg(long)]
        language: Option<String>,
    },
    /// Search the analyzed corpus.
    Search {
        query: String,
        /// One of: semantic, function_name, complexity.
        #[arg(long, default_value = "semantic")]
        search_type: String,
        #[arg(long, default_value_t = 10)]
        top_k: i64,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        min_complexity: Option<f64>,
        #[arg(long)]
        max_complexity: Option<f64>,
    },
    /// Store an alert and correlate it against the corpus.
    Alert {
        #[arg(long)]
        alert_type: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        file_path: Option<String>,
        #[arg(long)]
        line_number: Option<u32>,
        #[arg(long, default_value = "medium")]
        severity: String,
    },
    /// Report store and index health.
    Health,
    /// Report corpus statistics.
    Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let engine = CodeScopeEngine::new(config).context("starting engine")?;

    match cli.command {
        Command::Analyze {
            path,
            embeddings,
            language,
        } => {
            if path.is_dir() {
                let language = language.map(|l| l.parse::<Language>()).transpose()?;
                let analysis = engine.analyze_repository(&path, language, embeddings)?;
                print_json(&analysis)?;
            } else {
                let record = engine.analyze_file(&path, embeddings)?;
                print_json(&record)?;
            }
        }
        Command::Search {
            query,
            search_type,
            top_k,
            language,
            min_complexity,
            max_complexity,
        } => {
            let filters = SearchFilters {
                language: language
                    .map(|l| l.parse::<Language>())
                    .transpose()?,
                min_complexity,
                max_complexity,
            };
            // Negative counts collapse to 0, which the engine rejects with a
            // clear message.
            let top_k = usize::try_from(top_k).unwrap_or(0);
            let results = engine.search(&query, &search_type, top_k, &filters)?;
            print_json(&results)?;
        }
        Command::Alert {
            alert_type,
            message,
            file_path,
            line_number,
            severity,
        } => {
            let mut alert = AlertRecord::new(alert_type, message, severity.parse::<Severity>()?);
            alert.file_path = file_path;
            alert.line_number = line_number;
            let result = engine.analyze_alert(alert)?;
            print_json(&result)?;
        }
        Command::Health => print_json(&engine.health())?,
        Command::Stats => print_json(&engine.stats()?)?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
