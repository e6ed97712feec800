use std::fmt;

use serde::Serialize;

use crate::engine::{AugmentedSeries, columns};
use crate::model::{Bar, InstrumentInfo, Interval};
use crate::signal::{Signal, SignalSummary};

const NOT_AVAILABLE: &str = "N/A";

/// Columns of the recent-bars table, after the timestamp.
const RECENT_COLUMNS: [&str; 6] = [
    "Close",
    columns::RSI,
    columns::MACD,
    columns::WILLIAMS_R,
    columns::ATR,
    "Volume",
];

#[derive(Debug, Serialize)]
pub struct LatestBar<'a> {
    #[serde(flatten)]
    pub bar: &'a Bar,
    pub change: f64,
    pub change_pct: f64,
}

#[derive(Debug, Serialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Option<f64>,
}

/// Latest-bar summary of one symbol plus the full augmented table.
///
/// Serializes to the JSON output; [`SymbolReport::text`] renders the
/// terminal view.
#[derive(Debug, Serialize)]
pub struct SymbolReport<'a> {
    pub symbol: &'a str,
    pub interval: Interval,
    pub info: Option<&'a InstrumentInfo>,
    pub latest: Option<LatestBar<'a>>,
    pub signals: SignalSummary,
    pub indicators: Vec<NamedValue>,
    #[serde(skip)]
    moving_averages: Vec<String>,
    #[serde(rename = "series")]
    augmented: &'a AugmentedSeries,
}

impl<'a> SymbolReport<'a> {
    /// `ma_periods` selects the moving-average columns shown in the summary.
    pub fn new(augmented: &'a AugmentedSeries, ma_periods: &[usize]) -> Self {
        let series = augmented.series();
        let latest = series.last().map(|bar| LatestBar {
            bar,
            change: bar.change(),
            change_pct: bar.change_pct(),
        });
        let indicators = augmented
            .columns()
            .iter()
            .map(|c| NamedValue {
                name: c.name.clone(),
                value: c.values.latest(),
            })
            .collect();

        Self {
            symbol: series.symbol(),
            interval: series.interval(),
            info: series.info(),
            latest,
            signals: SignalSummary::from_series(augmented),
            indicators,
            moving_averages: ma_periods
                .iter()
                .map(|&p| columns::moving_average(p))
                .collect(),
            augmented,
        }
    }

    /// Terminal rendering with the last `rows` bars in the recent table.
    pub fn text(&self, rows: usize) -> TextReport<'_, 'a> {
        TextReport { report: self, rows }
    }

    fn latest(&self, name: &str) -> Option<f64> {
        self.augmented.latest(name)
    }
}

pub struct TextReport<'r, 'a> {
    report: &'r SymbolReport<'a>,
    rows: usize,
}

impl fmt::Display for TextReport<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let augmented = report.augmented;
        writeln!(
            f,
            "=== {} ({}, {} bars) ===",
            report.symbol,
            report.interval,
            augmented.len()
        )?;
        if let Some(info) = report.info {
            writeln!(f, "{}", instrument_line(info))?;
        }

        let Some(latest) = &report.latest else {
            return writeln!(f, "no bars");
        };
        writeln!(
            f,
            "Last {}  close {:.2}  change {:+.2} ({:+.2}%)",
            format_timestamp(latest.bar, report.interval),
            latest.bar.close,
            latest.change,
            latest.change_pct
        )?;
        writeln!(f)?;

        let signals = &report.signals;
        writeln!(
            f,
            "{:<12}{:<28}{}",
            "RSI",
            decimal(report.latest(columns::RSI)),
            with_hint(signals.rsi)
        )?;
        writeln!(
            f,
            "{:<12}{:<28}{}",
            "Williams %R",
            decimal(report.latest(columns::WILLIAMS_R)),
            with_hint(signals.williams_r)
        )?;
        let macd = match (
            report.latest(columns::MACD),
            report.latest(columns::MACD_SIGNAL),
        ) {
            (Some(macd), Some(signal)) => format!("{macd:.2} / signal {signal:.2}"),
            (Some(macd), None) => format!("{macd:.2} / signal {NOT_AVAILABLE}"),
            _ => NOT_AVAILABLE.to_owned(),
        };
        writeln!(f, "{:<12}{:<28}{}", "MACD", macd, with_hint(signals.macd))?;

        for name in &report.moving_averages {
            writeln!(f, "{:<12}{}", name, decimal(report.latest(name)))?;
        }

        let bands = match (
            report.latest(columns::BB_UPPER),
            report.latest(columns::BB_MIDDLE),
            report.latest(columns::BB_LOWER),
            signals.bands,
        ) {
            (Some(upper), Some(middle), Some(lower), Some(reading)) => format!(
                "U {upper:.2}  M {middle:.2}  L {lower:.2}  (width {:.1}%, {})",
                reading.width_pct,
                reading.position.label()
            ),
            _ => NOT_AVAILABLE.to_owned(),
        };
        writeln!(f, "{:<12}{}", "Bollinger", bands)?;

        let atr = match (report.latest(columns::ATR), signals.volatility) {
            (Some(atr), Some(reading)) => format!(
                "{atr:.2} ({:.2}% - {} volatility)",
                reading.atr_pct,
                reading.level.label()
            ),
            _ => NOT_AVAILABLE.to_owned(),
        };
        writeln!(f, "{:<12}{}", "ATR", atr)?;

        let obv = report
            .latest(columns::OBV)
            .map_or_else(|| NOT_AVAILABLE.to_owned(), grouped);
        writeln!(f, "{:<12}{}", "OBV", obv)?;

        let volume = match signals.volume {
            Some(reading) => format!(
                "{} ({:.0}% of average - {})",
                grouped(latest.bar.volume),
                reading.ratio_pct,
                reading.activity.label()
            ),
            None => grouped(latest.bar.volume),
        };
        writeln!(f, "{:<12}{}", "Volume", volume)?;

        if self.rows == 0 {
            return Ok(());
        }
        let bars = augmented.bars();
        let start = bars.len().saturating_sub(self.rows);
        let time_width = if report.interval.is_intraday() { 16 } else { 10 };

        writeln!(f)?;
        writeln!(f, "Recent {} bars", bars.len() - start)?;
        write!(f, "{:<time_width$}", "Date")?;
        for name in RECENT_COLUMNS {
            write!(f, "{name:>14}")?;
        }
        writeln!(f)?;

        let column = |name: &str, index: usize| augmented.column(name).and_then(|c| c.get(index));
        for (index, bar) in bars.iter().enumerate().skip(start) {
            write!(f, "{:<time_width$}", format_timestamp(bar, report.interval))?;
            write!(f, "{:>14.2}", bar.close)?;
            for &name in &RECENT_COLUMNS[1..5] {
                write!(f, "{:>14}", decimal(column(name, index)))?;
            }
            writeln!(f, "{:>14}", grouped(bar.volume))?;
        }
        Ok(())
    }
}

/// `Apple Inc.  price 181.91 USD`, with `N/A` for whatever the source left out.
fn instrument_line(info: &InstrumentInfo) -> String {
    let name = info.name.as_deref().unwrap_or(NOT_AVAILABLE);
    let price = match (info.market_price, info.currency.as_deref()) {
        (Some(price), Some(currency)) => format!("{price:.2} {currency}"),
        (Some(price), None) => format!("{price:.2}"),
        (None, _) => NOT_AVAILABLE.to_owned(),
    };
    format!("{name}  price {price}")
}

fn format_timestamp(bar: &Bar, interval: Interval) -> String {
    if interval.is_intraday() {
        bar.timestamp.format("%Y-%m-%d %H:%M").to_string()
    } else {
        bar.timestamp.format("%Y-%m-%d").to_string()
    }
}

fn decimal(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_owned(), |v| format!("{v:.2}"))
}

fn with_hint(signal: Signal) -> String {
    match signal.hint() {
        Some(hint) => format!("{signal} ({hint})"),
        None => signal.to_string(),
    }
}

/// Whole number with thousands separators, e.g. `-1,234,567`.
fn grouped(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(rounded.len() + rounded.len() / 3 + 1);
    for (i, digit) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if value < 0.0 && out != "0" {
        out.insert(0, '-');
    }
    out
}
