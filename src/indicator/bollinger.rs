use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, IndicatorSeries, close_prices};
use crate::model::Bar;

/// Upper, middle and lower band, each aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        if !std_dev_multiplier.is_finite() || std_dev_multiplier <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "std_dev_multiplier must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }

    /// Middle band is the SMA of close; the outer bands sit
    /// `std_dev_multiplier` population standard deviations away.
    pub fn calculate_bands(&self, bars: &[Bar]) -> Bands {
        let prices = close_prices(bars);
        if prices.len() < self.period {
            let empty = IndicatorSeries::undefined(prices.len());
            return Bands {
                upper: empty.clone(),
                middle: empty.clone(),
                lower: empty,
            };
        }

        let (upper, (middle, lower)): (Vec<f64>, (Vec<f64>, Vec<f64>)) = prices
            .windows(self.period)
            .map(|window| {
                // Deviations from the first price are exact for a flat window,
                // so zero variance yields bands equal to the close.
                let n = self.period as f64;
                let shift = window[0];
                let mean_dev = window.iter().map(|&p| p - shift).sum::<f64>() / n;
                let variance = window
                    .iter()
                    .map(|&p| (p - shift - mean_dev).powi(2))
                    .sum::<f64>()
                    / n;
                let middle = shift + mean_dev;
                let width = self.std_dev_multiplier * variance.sqrt();
                (middle + width, (middle, middle - width))
            })
            .unzip();

        Bands {
            upper: IndicatorSeries::aligned(prices.len(), upper),
            middle: IndicatorSeries::aligned(prices.len(), middle),
            lower: IndicatorSeries::aligned(prices.len(), lower),
        }
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "BB"
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    /// Returns middle band (SMA) values only.
    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        self.calculate_bands(bars).middle
    }
}
