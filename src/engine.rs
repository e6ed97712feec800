use std::collections::HashSet;

use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicator::atr::Atr;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::ma::Sma;
use crate::indicator::macd::Macd;
use crate::indicator::obv::Obv;
use crate::indicator::rsi::Rsi;
use crate::indicator::volume::VolumeMA;
use crate::indicator::williams::WilliamsR;
use crate::indicator::{Indicator, IndicatorSeries};
use crate::model::{Bar, BarSeries, validate_bars};

/// Fewest bars for which any indicator can produce a defined value.
pub const MIN_BARS: usize = 2;

/// Column names of an [`AugmentedSeries`].
pub mod columns {
    pub const ATR: &str = "ATR";
    pub const OBV: &str = "OBV";
    pub const VOLUME_MA: &str = "Volume_MA";
    pub const RSI: &str = "RSI";
    pub const MACD: &str = "MACD";
    pub const MACD_SIGNAL: &str = "MACD_Signal";
    pub const MACD_HISTOGRAM: &str = "MACD_Histogram";
    pub const WILLIAMS_R: &str = "Williams_R";
    pub const BB_UPPER: &str = "BB_Upper";
    pub const BB_MIDDLE: &str = "BB_Middle";
    pub const BB_LOWER: &str = "BB_Lower";

    /// `MA{period}`, e.g. `MA20`.
    pub fn moving_average(period: usize) -> String {
        format!("MA{period}")
    }
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_williams_period() -> usize {
    14
}

fn default_ma_periods() -> Vec<usize> {
    vec![20, 50, 200]
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_std_dev() -> f64 {
    2.0
}

fn default_atr_period() -> usize {
    14
}

fn default_volume_ma_period() -> usize {
    20
}

/// Lookback windows and multipliers of every calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_williams_period")]
    pub williams_period: usize,
    #[serde(default = "default_ma_periods")]
    pub ma_periods: Vec<usize>,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_std_dev")]
    pub bollinger_std_dev: f64,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    #[serde(default = "default_volume_ma_period")]
    pub volume_ma_period: usize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            williams_period: default_williams_period(),
            ma_periods: default_ma_periods(),
            bollinger_period: default_bollinger_period(),
            bollinger_std_dev: default_bollinger_std_dev(),
            atr_period: default_atr_period(),
            volume_ma_period: default_volume_ma_period(),
        }
    }
}

/// One named indicator column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: IndicatorSeries,
}

/// Input bars plus every computed indicator column, aligned index-for-index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentedSeries {
    series: BarSeries,
    columns: Vec<Column>,
}

impl AugmentedSeries {
    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn bars(&self) -> &[Bar] {
        self.series.bars()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Columns in computation order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&IndicatorSeries> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
    }

    /// Value of `name` at the last bar; `None` if unknown or undefined.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.column(name).and_then(IndicatorSeries::latest)
    }
}

/// Computes every indicator over a [`BarSeries`].
///
/// Holds no state between calls: the same input always yields the same
/// output.
pub struct IndicatorEngine {
    params: EngineParams,
    rsi: Rsi,
    macd: Macd,
    williams: WilliamsR,
    moving_averages: Vec<Sma>,
    bollinger: BollingerBands,
    atr: Atr,
    volume_ma: VolumeMA,
}

impl IndicatorEngine {
    pub fn new(params: EngineParams) -> Result<Self, Report<IndicatorError>> {
        if params.ma_periods.is_empty() {
            bail!(IndicatorError::InvalidParameter {
                name: "ma_periods must not be empty".into(),
            });
        }
        let mut seen = HashSet::new();
        for period in &params.ma_periods {
            if !seen.insert(period) {
                bail!(IndicatorError::InvalidParameter {
                    name: format!("ma_periods contains {period} twice"),
                });
            }
        }

        let moving_averages = params
            .ma_periods
            .iter()
            .map(|&period| Sma::new(period))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rsi: Rsi::new(params.rsi_period)?,
            macd: Macd::new(params.macd_fast, params.macd_slow, params.macd_signal)?,
            williams: WilliamsR::new(params.williams_period)?,
            moving_averages,
            bollinger: BollingerBands::new(params.bollinger_period, params.bollinger_std_dev)?,
            atr: Atr::new(params.atr_period)?,
            volume_ma: VolumeMA::new(params.volume_ma_period)?,
            params,
        })
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Compute every indicator column for `series`.
    ///
    /// Fails with [`IndicatorError::InsufficientData`] below [`MIN_BARS`]
    /// bars and with [`IndicatorError::MalformedBar`] if the bar invariants
    /// do not hold. Indicators whose lookback exceeds the series length come
    /// back fully undefined.
    pub fn compute(&self, series: &BarSeries) -> Result<AugmentedSeries, Report<IndicatorError>> {
        if series.len() < MIN_BARS {
            bail!(IndicatorError::InsufficientData {
                required: MIN_BARS,
                available: series.len(),
            });
        }
        validate_bars(series.bars())?;

        let bars = series.bars();
        let mut output = Vec::with_capacity(11 + self.moving_averages.len());
        let mut push = |name: &str, values: IndicatorSeries| {
            output.push(Column {
                name: name.to_owned(),
                values,
            })
        };

        push(columns::ATR, self.atr.calculate(bars));
        push(columns::OBV, Obv.calculate(bars));
        push(columns::VOLUME_MA, self.volume_ma.calculate(bars));
        push(columns::RSI, self.rsi.calculate(bars));

        let macd = self.macd.calculate_lines(bars);
        push(columns::MACD, macd.macd);
        push(columns::MACD_SIGNAL, macd.signal);
        push(columns::MACD_HISTOGRAM, macd.histogram);

        push(columns::WILLIAMS_R, self.williams.calculate(bars));

        for sma in &self.moving_averages {
            push(sma.name(), sma.calculate(bars));
        }

        let bands = self.bollinger.calculate_bands(bars);
        push(columns::BB_UPPER, bands.upper);
        push(columns::BB_MIDDLE, bands.middle);
        push(columns::BB_LOWER, bands.lower);

        Ok(AugmentedSeries {
            series: series.clone(),
            columns: output,
        })
    }
}

/// Compute every indicator with the default parameters.
pub fn compute_all(series: &BarSeries) -> Result<AugmentedSeries, Report<IndicatorError>> {
    IndicatorEngine::new(EngineParams::default())?.compute(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::{bar, bars_from_closes};
    use crate::model::Interval;

    fn series(bars: Vec<Bar>) -> BarSeries {
        BarSeries::new("TEST", Interval::Day1, bars).unwrap()
    }

    /// A wavy but valid series with real high/low ranges and varying volume.
    fn wavy(len: usize) -> BarSeries {
        let bars = (0..len)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.37).sin() * 8.0 + i as f64 * 0.05;
                let volume = 1_000.0 + ((i * 37) % 11) as f64 * 150.0;
                bar(i, close + 1.5, close - 1.25, close, volume)
            })
            .collect();
        series(bars)
    }

    fn all_column_names() -> Vec<String> {
        [
            "ATR",
            "OBV",
            "Volume_MA",
            "RSI",
            "MACD",
            "MACD_Signal",
            "MACD_Histogram",
            "Williams_R",
            "MA20",
            "MA50",
            "MA200",
            "BB_Upper",
            "BB_Middle",
            "BB_Lower",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn fewer_than_two_bars_is_insufficient_data() {
        for len in 0..2 {
            let err = compute_all(&series(bars_from_closes(&vec![10.0; len]))).unwrap_err();
            assert_eq!(
                err.current_context(),
                &IndicatorError::InsufficientData {
                    required: 2,
                    available: len,
                }
            );
        }
    }

    #[test]
    fn two_bars_succeed_with_obv_defined() {
        let augmented = compute_all(&series(bars_from_closes(&[10.0, 11.0]))).unwrap();
        assert_eq!(augmented.column(columns::OBV).unwrap().values(), &[Some(0.0), Some(1.0)]);
        assert_eq!(augmented.column(columns::RSI).unwrap().first_defined(), None);
        assert_eq!(augmented.latest("MA200"), None);
    }

    #[test]
    fn columns_in_stable_order() {
        let augmented = compute_all(&wavy(10)).unwrap();
        let names: Vec<String> = augmented.columns().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, all_column_names());
    }

    #[test]
    fn every_column_matches_input_length() {
        for len in [2, 15, 40, 250] {
            let augmented = compute_all(&wavy(len)).unwrap();
            assert_eq!(augmented.len(), len);
            for column in augmented.columns() {
                assert_eq!(column.values.len(), len, "column {}", column.name);
            }
        }
    }

    #[test]
    fn obv_never_undefined_and_starts_at_zero() {
        let augmented = compute_all(&wavy(60)).unwrap();
        let obv = augmented.column(columns::OBV).unwrap();
        assert_eq!(obv.get(0), Some(0.0));
        assert!(obv.iter().all(|v| v.is_some()));
    }

    #[test]
    fn oscillators_stay_in_range() {
        let augmented = compute_all(&wavy(120)).unwrap();
        for v in augmented.column(columns::RSI).unwrap().iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
        for v in augmented.column(columns::WILLIAMS_R).unwrap().iter().flatten() {
            assert!((-100.0..=0.0).contains(&v));
        }
    }

    #[test]
    fn bollinger_bands_ordered() {
        let augmented = compute_all(&wavy(80)).unwrap();
        let upper = augmented.column(columns::BB_UPPER).unwrap();
        let middle = augmented.column(columns::BB_MIDDLE).unwrap();
        let lower = augmented.column(columns::BB_LOWER).unwrap();
        assert_eq!(upper.first_defined(), Some(19));
        assert_eq!(middle.first_defined(), Some(19));
        assert_eq!(lower.first_defined(), Some(19));
        for i in 19..80 {
            let (u, m, l) = (upper.get(i).unwrap(), middle.get(i).unwrap(), lower.get(i).unwrap());
            assert!(u > m && m > l, "bands not ordered at {i}");
        }
    }

    #[test]
    fn macd_histogram_matches_lines() {
        let augmented = compute_all(&wavy(90)).unwrap();
        let macd = augmented.column(columns::MACD).unwrap();
        let signal = augmented.column(columns::MACD_SIGNAL).unwrap();
        let histogram = augmented.column(columns::MACD_HISTOGRAM).unwrap();
        assert_eq!(macd.first_defined(), Some(25));
        assert_eq!(histogram.first_defined(), Some(33));
        for i in 33..90 {
            let expected = macd.get(i).unwrap() - signal.get(i).unwrap();
            assert!((histogram.get(i).unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_close_scenario() {
        let augmented = compute_all(&series(bars_from_closes(&[100.0; 30]))).unwrap();

        let ma20 = augmented.column("MA20").unwrap();
        assert_eq!(ma20.first_defined(), Some(19));
        for i in 19..30 {
            assert!((ma20.get(i).unwrap() - 100.0).abs() < 1e-9);
        }

        for i in 19..30 {
            for name in [columns::BB_UPPER, columns::BB_MIDDLE, columns::BB_LOWER] {
                let v = augmented.column(name).unwrap().get(i).unwrap();
                assert!((v - 100.0).abs() < 1e-9, "{name} at {i} = {v}");
            }
        }

        // No losses at all: undefined through the lookback, then the
        // zero-average-loss rule pins RSI to 100.
        let rsi = augmented.column(columns::RSI).unwrap();
        for i in 0..14 {
            assert_eq!(rsi.get(i), None);
        }
        for i in 14..30 {
            assert_eq!(rsi.get(i), Some(100.0));
        }

        assert_eq!(augmented.latest("MA50"), None);
        assert_eq!(augmented.latest(columns::ATR), Some(0.0));
    }

    #[test]
    fn strictly_rising_close_pins_rsi_to_100() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + i as f64 * 0.5).collect();
        let augmented = compute_all(&series(bars_from_closes(&closes))).unwrap();
        let rsi = augmented.column(columns::RSI).unwrap();
        for i in 14..40 {
            assert_eq!(rsi.get(i), Some(100.0));
        }
    }

    #[test]
    fn compute_is_idempotent() {
        let input = wavy(220);
        let first = compute_all(&input).unwrap();
        let second = compute_all(&input).unwrap();
        assert_eq!(first, second);
        for (a, b) in first.columns().iter().zip(second.columns()) {
            for (x, y) in a.values.iter().zip(b.values.iter()) {
                assert_eq!(x.map(f64::to_bits), y.map(f64::to_bits));
            }
        }
    }

    #[test]
    fn custom_params_change_columns() {
        let params = EngineParams {
            ma_periods: vec![5, 10],
            rsi_period: 3,
            ..EngineParams::default()
        };
        let engine = IndicatorEngine::new(params).unwrap();
        let augmented = engine.compute(&wavy(12)).unwrap();
        assert!(augmented.column("MA5").is_some());
        assert!(augmented.column("MA20").is_none());
        assert_eq!(augmented.column(columns::RSI).unwrap().first_defined(), Some(3));
    }

    #[test]
    fn invalid_params_rejected() {
        let bad = [
            EngineParams {
                macd_fast: 30,
                ..EngineParams::default()
            },
            EngineParams {
                ma_periods: vec![],
                ..EngineParams::default()
            },
            EngineParams {
                ma_periods: vec![20, 20],
                ..EngineParams::default()
            },
            EngineParams {
                rsi_period: 0,
                ..EngineParams::default()
            },
            EngineParams {
                bollinger_std_dev: 0.0,
                ..EngineParams::default()
            },
        ];
        for params in bad {
            assert!(IndicatorEngine::new(params).is_err());
        }
    }

    #[test]
    fn default_params_deserialize_from_empty_table() {
        let params: EngineParams = toml::from_str("").unwrap();
        assert_eq!(params, EngineParams::default());
    }
}
