use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, IndicatorSeries, close_prices, ema};
use crate::model::Bar;

/// The three MACD lines, each aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub macd: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

pub struct Macd {
    fast: Ema,
    slow: Ema,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast: Ema::new(fast_period)?,
            slow: Ema::new(slow_period)?,
            slow_period,
            signal_period,
        })
    }

    /// First index at which the signal line and histogram are defined.
    pub fn signal_lookback(&self) -> usize {
        self.slow_period + self.signal_period - 2
    }

    /// Calculate the MACD line, its signal line and the histogram.
    pub fn calculate_lines(&self, bars: &[Bar]) -> MacdLines {
        let prices = close_prices(bars);

        // Both EMAs come back full length, so the slow one's undefined
        // prefix carries into the difference.
        let fast_ema = self.fast.calculate_prices(&prices);
        let slow_ema = self.slow.calculate_prices(&prices);
        let macd = fast_ema.zip_with(&slow_ema, |f, s| f - s);

        let signal = ema(macd.values(), self.signal_period);
        let histogram = macd.zip_with(&signal, |m, s| m - s);

        MacdLines {
            macd,
            signal,
            histogram,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "MACD"
    }

    fn lookback(&self) -> usize {
        self.slow_period - 1
    }

    /// Returns MACD line values only.
    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        self.calculate_lines(bars).macd
    }
}
