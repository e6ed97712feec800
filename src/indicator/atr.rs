use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, IndicatorSeries, wilder};
use crate::model::Bar;

/// Average True Range, Wilder-smoothed.
///
/// True range needs the previous close, so it starts at index 1 and the
/// first defined ATR sits at index `period`.
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

/// `max(high - low, |high - prev_close|, |low - prev_close|)` for each bar
/// after the first.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let prev_close = w[0].close;
            let bar = &w[1];
            let hl = bar.high - bar.low;
            let hc = (bar.high - prev_close).abs();
            let lc = (bar.low - prev_close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        "ATR"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        IndicatorSeries::aligned(bars.len(), wilder(&true_ranges(bars), self.period))
    }
}
