//! Categorical signals for the latest row of an [`AugmentedSeries`].
//!
//! Thresholds are fixed constants so that every consumer sees the same
//! labels for the same values.

use std::fmt;

use serde::Serialize;

use crate::engine::{AugmentedSeries, columns};

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const WILLIAMS_R_OVERBOUGHT: f64 = -20.0;
pub const WILLIAMS_R_OVERSOLD: f64 = -80.0;

/// ATR above this share of close (in percent) is high volatility.
pub const ATR_PCT_HIGH: f64 = 3.0;
pub const ATR_PCT_MEDIUM: f64 = 1.5;
/// Volume above this share of its moving average (in percent) is very high.
pub const VOLUME_RATIO_VERY_HIGH: f64 = 150.0;
pub const VOLUME_RATIO_HIGH: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Overbought,
    Oversold,
    Neutral,
    Bullish,
    Bearish,
    InsufficientData,
}

impl Signal {
    pub fn label(self) -> &'static str {
        match self {
            Self::Overbought => "overbought",
            Self::Oversold => "oversold",
            Self::Neutral => "neutral",
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::InsufficientData => "insufficient data",
        }
    }

    /// Trading hint attached to extreme readings.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::Overbought => Some("consider selling"),
            Self::Oversold => Some("consider buying"),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn rsi_signal(rsi: Option<f64>) -> Signal {
    match rsi {
        None => Signal::InsufficientData,
        Some(v) if v >= RSI_OVERBOUGHT => Signal::Overbought,
        Some(v) if v <= RSI_OVERSOLD => Signal::Oversold,
        Some(_) => Signal::Neutral,
    }
}

pub fn williams_r_signal(williams_r: Option<f64>) -> Signal {
    match williams_r {
        None => Signal::InsufficientData,
        Some(v) if v >= WILLIAMS_R_OVERBOUGHT => Signal::Overbought,
        Some(v) if v <= WILLIAMS_R_OVERSOLD => Signal::Oversold,
        Some(_) => Signal::Neutral,
    }
}

pub fn macd_signal(macd: Option<f64>, signal: Option<f64>) -> Signal {
    let (Some(macd), Some(signal)) = (macd, signal) else {
        return Signal::InsufficientData;
    };
    let diff = macd - signal;
    if diff > 0.0 {
        Signal::Bullish
    } else if diff < 0.0 {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandPosition {
    AboveMiddle,
    BelowMiddle,
}

impl BandPosition {
    pub fn label(self) -> &'static str {
        match self {
            Self::AboveMiddle => "above middle",
            Self::BelowMiddle => "below middle",
        }
    }
}

/// Where the close sits relative to the Bollinger bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandReading {
    pub width_pct: f64,
    pub position: BandPosition,
}

pub fn band_reading(
    close: f64,
    upper: Option<f64>,
    middle: Option<f64>,
    lower: Option<f64>,
) -> Option<BandReading> {
    let (upper, middle, lower) = (upper?, middle?, lower?);
    let width_pct = if middle == 0.0 {
        0.0
    } else {
        (upper - lower) / middle * 100.0
    };
    let position = if close > middle {
        BandPosition::AboveMiddle
    } else {
        BandPosition::BelowMiddle
    };
    Some(BandReading {
        width_pct,
        position,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    High,
    Medium,
    Low,
}

impl VolatilityLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolatilityReading {
    pub atr_pct: f64,
    pub level: VolatilityLevel,
}

pub fn volatility_reading(close: f64, atr: Option<f64>) -> Option<VolatilityReading> {
    let atr = atr?;
    let atr_pct = if close == 0.0 { 0.0 } else { atr / close * 100.0 };
    let level = if atr_pct > ATR_PCT_HIGH {
        VolatilityLevel::High
    } else if atr_pct > ATR_PCT_MEDIUM {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::Low
    };
    Some(VolatilityReading { atr_pct, level })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeActivity {
    VeryHigh,
    High,
    Normal,
}

impl VolumeActivity {
    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "very high",
            Self::High => "high",
            Self::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeReading {
    pub ratio_pct: f64,
    pub activity: VolumeActivity,
}

pub fn volume_reading(volume: f64, volume_ma: Option<f64>) -> Option<VolumeReading> {
    let volume_ma = volume_ma.filter(|&ma| ma != 0.0)?;
    let ratio_pct = volume / volume_ma * 100.0;
    let activity = if ratio_pct > VOLUME_RATIO_VERY_HIGH {
        VolumeActivity::VeryHigh
    } else if ratio_pct > VOLUME_RATIO_HIGH {
        VolumeActivity::High
    } else {
        VolumeActivity::Normal
    };
    Some(VolumeReading {
        ratio_pct,
        activity,
    })
}

/// Signals and readings for the last bar of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSummary {
    pub rsi: Signal,
    pub williams_r: Signal,
    pub macd: Signal,
    pub bands: Option<BandReading>,
    pub volatility: Option<VolatilityReading>,
    pub volume: Option<VolumeReading>,
}

impl SignalSummary {
    pub fn from_series(series: &AugmentedSeries) -> Self {
        let latest = |name: &str| series.latest(name);
        let last_bar = series.bars().last();

        Self {
            rsi: rsi_signal(latest(columns::RSI)),
            williams_r: williams_r_signal(latest(columns::WILLIAMS_R)),
            macd: macd_signal(latest(columns::MACD), latest(columns::MACD_SIGNAL)),
            bands: last_bar.and_then(|bar| {
                band_reading(
                    bar.close,
                    latest(columns::BB_UPPER),
                    latest(columns::BB_MIDDLE),
                    latest(columns::BB_LOWER),
                )
            }),
            volatility: last_bar.and_then(|bar| volatility_reading(bar.close, latest(columns::ATR))),
            volume: last_bar
                .and_then(|bar| volume_reading(bar.volume, latest(columns::VOLUME_MA))),
        }
    }
}
