use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, IndicatorSeries};
use crate::model::Bar;

/// Williams %R over a trailing high/low window that includes the current bar.
///
/// Ranges over [-100, 0]. A flat window (highest high equals lowest low)
/// yields 0.
pub struct WilliamsR {
    period: usize,
}

impl WilliamsR {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for WilliamsR {
    fn name(&self) -> &str {
        "Williams_R"
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        if bars.len() < self.period {
            return IndicatorSeries::undefined(bars.len());
        }

        let values = bars
            .windows(self.period)
            .map(|window| {
                let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
                let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
                let close = window[window.len() - 1].close;
                if highest == lowest {
                    0.0
                } else {
                    -100.0 * (highest - close) / (highest - lowest)
                }
            })
            .collect();

        IndicatorSeries::aligned(bars.len(), values)
    }
}
