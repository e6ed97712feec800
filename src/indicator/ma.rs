use error_stack::{Report, bail};

use crate::engine::columns;
use crate::error::IndicatorError;
use crate::indicator::{Indicator, IndicatorSeries, close_prices, ema, rolling_mean};
use crate::model::Bar;

/// Simple Moving Average of close.
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            name: columns::moving_average(period),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        rolling_mean(&close_prices(bars), self.period)
    }
}

/// Exponential Moving Average of close, seeded with the SMA of the first
/// `period` closes.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    /// EMA over an arbitrary price slice.
    pub fn calculate_prices(&self, prices: &[f64]) -> IndicatorSeries {
        let values: Vec<Option<f64>> = prices.iter().copied().map(Some).collect();
        ema(&values, self.period)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "EMA"
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        self.calculate_prices(&close_prices(bars))
    }
}
