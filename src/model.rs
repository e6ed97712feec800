use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;

/// Bar interval as understood by the bar sources.
///
/// String representations match the config file format (e.g. `"5m"`, `"1d"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "2m")]
    Min2,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "60m")]
    Min60,
    #[serde(rename = "90m")]
    Min90,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1wk")]
    Week1,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
}

impl Interval {
    /// Parse a config-format string like `"1d"` or `"15m"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "2m" => Some(Self::Min2),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "30m" => Some(Self::Min30),
            "60m" => Some(Self::Min60),
            "90m" => Some(Self::Min90),
            "1h" => Some(Self::Hour1),
            "1d" => Some(Self::Day1),
            "5d" => Some(Self::Day5),
            "1wk" => Some(Self::Week1),
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min2 => "2m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Min60 => "60m",
            Self::Min90 => "90m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Week1 => "1wk",
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
        }
    }

    /// Intraday intervals are only served for short ranges by most providers.
    pub fn is_intraday(self) -> bool {
        matches!(
            self,
            Self::Min1
                | Self::Min2
                | Self::Min5
                | Self::Min15
                | Self::Min30
                | Self::Min60
                | Self::Min90
                | Self::Hour1
        )
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How far back a bar request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Range {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "10y")]
    Year10,
    #[serde(rename = "ytd")]
    Ytd,
    #[serde(rename = "max")]
    Max,
}

impl Range {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Self::Day1),
            "5d" => Some(Self::Day5),
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            "6mo" => Some(Self::Month6),
            "1y" => Some(Self::Year1),
            "2y" => Some(Self::Year2),
            "5y" => Some(Self::Year5),
            "10y" => Some(Self::Year10),
            "ytd" => Some(Self::Ytd),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
            Self::Year5 => "5y",
            Self::Year10 => "10y",
            Self::Ytd => "ytd",
            Self::Max => "max",
        }
    }

    /// Ranges short enough to be served at intraday resolution.
    pub fn allows_intraday(self) -> bool {
        matches!(self, Self::Day1 | Self::Day5 | Self::Month1)
    }

    /// Earliest timestamp covered when the range ends at `end`; `None` for
    /// [`Range::Max`].
    pub fn start_from(self, end: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Day1 => Some(end - Duration::days(1)),
            Self::Day5 => Some(end - Duration::days(5)),
            Self::Month1 => end.checked_sub_months(Months::new(1)),
            Self::Month3 => end.checked_sub_months(Months::new(3)),
            Self::Month6 => end.checked_sub_months(Months::new(6)),
            Self::Year1 => end.checked_sub_months(Months::new(12)),
            Self::Year2 => end.checked_sub_months(Months::new(24)),
            Self::Year5 => end.checked_sub_months(Months::new(60)),
            Self::Year10 => end.checked_sub_months(Months::new(120)),
            Self::Ytd => Utc.with_ymd_and_hms(end.year(), 1, 1, 0, 0, 0).single(),
            Self::Max => None,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Close minus open.
    pub fn change(&self) -> f64 {
        self.close - self.open
    }

    /// Close-to-open change in percent, 0 when open is 0.
    pub fn change_pct(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        self.change() / self.open * 100.0
    }

    fn check(&self) -> Result<(), String> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{field} must be a positive finite price, got {value}"));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!(
                "volume must be non-negative and finite, got {}",
                self.volume
            ));
        }
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low {
            return Err(format!(
                "low {} is above min(open, close) {body_low}",
                self.low
            ));
        }
        if self.high < body_high {
            return Err(format!(
                "high {} is below max(open, close) {body_high}",
                self.high
            ));
        }
        Ok(())
    }
}

/// Check the per-bar price invariants and strict timestamp ordering.
pub fn validate_bars(bars: &[Bar]) -> Result<(), Report<IndicatorError>> {
    for (index, bar) in bars.iter().enumerate() {
        if let Err(reason) = bar.check() {
            bail!(IndicatorError::MalformedBar { index, reason });
        }
        if index > 0 && bars[index - 1].timestamp >= bar.timestamp {
            bail!(IndicatorError::MalformedBar {
                index,
                reason: format!(
                    "timestamp {} does not follow {}",
                    bar.timestamp,
                    bars[index - 1].timestamp
                ),
            });
        }
    }
    Ok(())
}

/// Descriptive data a source may report next to the bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentInfo {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub market_price: Option<f64>,
}

/// Ordered bars for one instrument, oldest first.
///
/// Construction validates every bar; the series is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<InstrumentInfo>,
}

impl BarSeries {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, Report<IndicatorError>> {
        validate_bars(&bars)?;
        Ok(Self {
            symbol: symbol.into(),
            interval,
            bars,
            info: None,
        })
    }

    pub fn with_info(mut self, info: InstrumentInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn info(&self) -> Option<&InstrumentInfo> {
        self.info.as_ref()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}
