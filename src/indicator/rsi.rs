use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, IndicatorSeries, close_prices, wilder};
use crate::model::Bar;

/// RSI (Relative Strength Index) using Wilder's smoothing method.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "RSI"
    }

    /// `period` deltas are needed, and the first delta lands on index 1.
    fn lookback(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        let prices = close_prices(bars);
        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let gains: Vec<f64> = deltas.iter().map(|&d| d.max(0.0)).collect();
        let losses: Vec<f64> = deltas.iter().map(|&d| (-d).max(0.0)).collect();

        let values = wilder(&gains, self.period)
            .into_iter()
            .zip(wilder(&losses, self.period))
            .map(|(avg_gain, avg_loss)| rsi_value(avg_gain, avg_loss))
            .collect();

        IndicatorSeries::aligned(prices.len(), values)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
