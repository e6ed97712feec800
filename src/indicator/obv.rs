use crate::indicator::{Indicator, IndicatorSeries};
use crate::model::Bar;

/// On-Balance Volume: running total starting at 0 that adds the bar's
/// volume on an up close and subtracts it on a down close.
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &str {
        "OBV"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        let mut total = 0.0;
        let mut previous_close: Option<f64> = None;
        bars.iter()
            .map(|bar| {
                if let Some(prev) = previous_close {
                    if bar.close > prev {
                        total += bar.volume;
                    } else if bar.close < prev {
                        total -= bar.volume;
                    }
                }
                previous_close = Some(bar.close);
                Some(total)
            })
            .collect()
    }
}
