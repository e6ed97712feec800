use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stock_analyzer::config::{self, AppConfig, SourceConfig, SymbolConfig};
use stock_analyzer::engine::{AugmentedSeries, IndicatorEngine};
use stock_analyzer::error::SourceError;
use stock_analyzer::report::SymbolReport;
use stock_analyzer::source::csv::CsvBarSource;
use stock_analyzer::source::yahoo::{YahooBarSource, YahooOptions};
use stock_analyzer::source::{BarRequest, BarSource};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("bar source error")]
    Source,
    #[display("indicator error")]
    Indicator,
    #[display("output error")]
    Output,
    #[display("runtime error")]
    Runtime,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "stock-analyzer",
    about = "Technical indicator report for stock symbols"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Analyze these symbols (default range and interval) instead of the configured list
    #[arg(short, long)]
    symbol: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Number of recent bars listed in the text report
    #[arg(short, long, default_value_t = 10)]
    rows: usize,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    // ── Symbols ───────────────────────────────────────────────────────────────
    let symbols: Vec<SymbolConfig> = if cli.symbol.is_empty() {
        config.symbols.clone()
    } else {
        cli.symbol.iter().map(SymbolConfig::with_defaults).collect()
    };
    if symbols.is_empty() {
        warn!("no symbols configured; nothing to do");
        return Ok(());
    }
    let requests = symbols
        .iter()
        .map(SymbolConfig::request)
        .collect::<Result<Vec<_>, _>>()
        .change_context(AppError::Config)?;

    // ── Source and engine ─────────────────────────────────────────────────────
    let source = build_source(&config.source).change_context(AppError::Source)?;
    let engine = Arc::new(
        IndicatorEngine::new(config.indicators.clone()).change_context(AppError::Config)?,
    );

    // ── Fetch and compute ─────────────────────────────────────────────────────
    // The source rate-limits internally, so every symbol is spawned at once.
    let total = requests.len();
    let mut handles = Vec::with_capacity(total);
    for request in requests {
        let source = Arc::clone(&source);
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(analyze(source, engine, request)));
    }

    let mut analyzed = Vec::with_capacity(total);
    let mut failed = 0usize;
    for handle in handles {
        match handle.await.change_context(AppError::Runtime)? {
            Ok(augmented) => analyzed.push(augmented),
            Err(report) => {
                failed += 1;
                error!(error = ?report, "symbol analysis failed (continuing)");
            }
        }
    }

    // ── Output ────────────────────────────────────────────────────────────────
    let ma_periods = &config.indicators.ma_periods;
    match cli.format {
        OutputFormat::Text => {
            for augmented in &analyzed {
                println!("{}", SymbolReport::new(augmented, ma_periods).text(cli.rows));
            }
        }
        OutputFormat::Json => {
            let reports: Vec<SymbolReport<'_>> = analyzed
                .iter()
                .map(|augmented| SymbolReport::new(augmented, ma_periods))
                .collect();
            let json = serde_json::to_string_pretty(&reports).change_context(AppError::Output)?;
            println!("{json}");
        }
    }

    if failed > 0 {
        return Err(Report::new(AppError::Source)
            .attach(format!("{failed} of {total} symbols failed")));
    }
    info!(symbols = total, "analysis complete");
    Ok(())
}

/// Logs go to stderr; stdout carries the report.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_source(config: &SourceConfig) -> Result<Arc<dyn BarSource>, Report<SourceError>> {
    let source: Arc<dyn BarSource> = match config.kind.as_str() {
        "csv" => Arc::new(CsvBarSource::new(config.csv_path())),
        _ => {
            let defaults = YahooOptions::default();
            Arc::new(YahooBarSource::new(YahooOptions {
                base_url: config.base_url.clone(),
                requests_per_second: NonZeroU32::new(config.requests_per_second)
                    .unwrap_or(defaults.requests_per_second),
                max_retries: config.max_retries,
                retry_delay: Duration::from_secs(config.retry_delay_secs),
                timeout: Duration::from_secs(config.timeout_secs),
            })?)
        }
    };
    info!(source = source.name(), "bar source ready");
    Ok(source)
}

async fn analyze(
    source: Arc<dyn BarSource>,
    engine: Arc<IndicatorEngine>,
    request: BarRequest,
) -> Result<AugmentedSeries, Report<AppError>> {
    info!(
        source = source.name(),
        symbol = %request.symbol,
        range = %request.range,
        interval = %request.interval,
        "fetching bars"
    );

    let series = source
        .fetch_bars(&request)
        .await
        .change_context(AppError::Source)
        .attach_with(|| format!("symbol: {}", request.symbol))?;

    // CPU-bound; runs on the blocking pool.
    let augmented = tokio::task::spawn_blocking(move || engine.compute(&series))
        .await
        .change_context(AppError::Runtime)?
        .change_context(AppError::Indicator)
        .attach_with(|| format!("symbol: {}", request.symbol))?;

    info!(
        symbol = %request.symbol,
        bars = augmented.len(),
        columns = augmented.columns().len(),
        "indicators computed"
    );
    Ok(augmented)
}
