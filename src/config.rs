use std::collections::HashSet;
use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::engine::{EngineParams, IndicatorEngine};
use crate::error::ConfigError;
use crate::model::{Interval, Range};
use crate::source::BarRequest;
use crate::source::yahoo::YAHOO_BASE_URL;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_source_kind() -> String {
    "yahoo".into()
}

fn default_base_url() -> String {
    YAHOO_BASE_URL.into()
}

fn default_csv_dir() -> String {
    "./data".into()
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_range() -> String {
    "1y".into()
}

fn default_interval() -> String {
    "1d".into()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub indicators: EngineParams,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Accepted values: `"yahoo"` | `"csv"`
    #[serde(default = "default_source_kind")]
    pub kind: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory holding `<SYMBOL>.csv` files when `kind = "csv"`.
    #[serde(default = "default_csv_dir")]
    pub csv_dir: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            base_url: default_base_url(),
            csv_dir: default_csv_dir(),
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SourceConfig {
    pub fn csv_path(&self) -> PathBuf {
        PathBuf::from(&self.csv_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl SymbolConfig {
    /// Default range and interval for `symbol`.
    pub fn with_defaults(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            range: default_range(),
            interval: default_interval(),
        }
    }

    pub fn request(&self) -> Result<BarRequest, Report<ConfigError>> {
        let range = Range::parse(&self.range).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!(
                    "symbols[symbol={}].range: unknown range \"{}\"",
                    self.symbol, self.range
                ),
            })
        })?;
        let interval = Interval::parse(&self.interval).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!(
                    "symbols[symbol={}].interval: unknown interval \"{}\"",
                    self.symbol, self.interval
                ),
            })
        })?;
        Ok(BarRequest::new(self.symbol.clone(), range, interval))
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_SOURCE_KINDS: &[&str] = &["yahoo", "csv"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_source(config)?;
    validate_indicators(config)?;
    validate_symbols(config)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not one of {VALID_LOG_FORMATS:?}",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_source(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let source = &config.source;
    if !VALID_SOURCE_KINDS.contains(&source.kind.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "source.kind \"{}\" is not one of {VALID_SOURCE_KINDS:?}",
                source.kind
            ),
        }));
    }
    if source.requests_per_second == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "source.requests_per_second must be > 0".into(),
        }));
    }
    if source.timeout_secs == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "source.timeout_secs must be > 0".into(),
        }));
    }
    Ok(())
}

fn validate_indicators(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    IndicatorEngine::new(config.indicators.clone()).change_context(ConfigError::Validation {
        field: "indicators".into(),
    })?;
    Ok(())
}

/// Symbols may be empty here; the command line can supply them.
fn validate_symbols(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = HashSet::new();
    for entry in &config.symbols {
        if entry.symbol.trim().is_empty() {
            return Err(Report::new(ConfigError::Validation {
                field: "symbols: empty symbol".into(),
            }));
        }
        entry.request()?;
        if !seen.insert((&entry.symbol, &entry.range, &entry.interval)) {
            return Err(Report::new(ConfigError::Validation {
                field: format!(
                    "symbols: duplicate entry ({}, {}, {})",
                    entry.symbol, entry.range, entry.interval
                ),
            }));
        }
    }
    Ok(())
}
