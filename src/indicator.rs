pub mod atr;
pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod volume;
pub mod williams;

use serde::Serialize;

use crate::model::Bar;

/// A technical analysis indicator over a slice of bars.
///
/// Bars must be in ascending chronological order (oldest first). The output
/// is aligned index-for-index with the input; positions before the lookback
/// window is satisfied are `None`.
pub trait Indicator: Send + Sync {
    /// Column name of this indicator (e.g., "RSI", "MA20").
    fn name(&self) -> &str;

    /// Index of the first position that can hold a defined value.
    fn lookback(&self) -> usize;

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries;
}

/// One indicator column. `None` marks "not enough history yet".
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct IndicatorSeries(Vec<Option<f64>>);

impl IndicatorSeries {
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self(values)
    }

    /// A column of `len` undefined positions.
    pub fn undefined(len: usize) -> Self {
        Self(vec![None; len])
    }

    /// Place `values` at the tail of a column of length `total_len`.
    pub fn aligned(total_len: usize, values: Vec<f64>) -> Self {
        let offset = total_len.saturating_sub(values.len());
        let mut output = vec![None; total_len];
        for (index, value) in values.into_iter().enumerate() {
            output[offset + index] = Some(value);
        }
        Self(output)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied().flatten()
    }

    /// Value at the last position, `None` if undefined or empty.
    pub fn latest(&self) -> Option<f64> {
        self.0.last().copied().flatten()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.0.iter().copied()
    }

    pub fn first_defined(&self) -> Option<usize> {
        self.0.iter().position(Option::is_some)
    }

    /// Element-wise `f(a, b)`; undefined on either side stays undefined.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| Some(f((*a)?, (*b)?)))
            .collect()
    }
}

impl FromIterator<Option<f64>> for IndicatorSeries {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Extract volumes from a slice of bars.
pub fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume).collect()
}

/// Simple rolling mean over a trailing window including the current value.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.len() < period {
        return IndicatorSeries::undefined(values.len());
    }
    let means = values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect();
    IndicatorSeries::aligned(values.len(), means)
}

/// Exponential moving average with `alpha = 2 / (period + 1)`.
///
/// The seed is the simple mean of the first `period` defined inputs. Once an
/// input turns undefined after the seed, every later output is undefined.
pub(crate) fn ema(values: &[Option<f64>], period: usize) -> IndicatorSeries {
    let mut output = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return IndicatorSeries(output);
    };
    if period == 0 || values.len() - start < period {
        return IndicatorSeries(output);
    }

    let seed_window = &values[start..start + period];
    let Some(seed_sum) = seed_window.iter().copied().sum::<Option<f64>>() else {
        return IndicatorSeries(output);
    };

    let k = 2.0 / (period as f64 + 1.0);
    let mut current = seed_sum / period as f64;
    output[start + period - 1] = Some(current);

    for (index, value) in values.iter().enumerate().skip(start + period) {
        let Some(value) = value else {
            break;
        };
        current = value * k + current * (1.0 - k);
        output[index] = Some(current);
    }

    IndicatorSeries(output)
}

/// Wilder's smoothed average: seeded by the mean of the first `period`
/// values, then `avg = (avg * (period - 1) + x) / period`.
///
/// Returns one value per input from position `period - 1` on; empty when
/// there are fewer than `period` inputs.
pub(crate) fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let p = period as f64;
    let mut avg = values[..period].iter().sum::<f64>() / p;
    let mut results = Vec::with_capacity(values.len() - period + 1);
    results.push(avg);
    for &value in &values[period..] {
        avg = (avg * (p - 1.0) + value) / p;
        results.push(avg);
    }
    results
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_pads_front_with_undefined() {
        let series = IndicatorSeries::aligned(4, vec![1.0, 2.0]);
        assert_eq!(series.values(), &[None, None, Some(1.0), Some(2.0)]);
        assert_eq!(series.first_defined(), Some(2));
        assert_eq!(series.latest(), Some(2.0));
    }

    #[test]
    fn rolling_mean_known_values() {
        let series = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(1), None);
        assert!((series.get(2).unwrap() - 2.0).abs() < 1e-12);
        assert!((series.get(3).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_mean_short_input_all_undefined() {
        let series = rolling_mean(&[1.0, 2.0], 3);
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_defined(), None);
    }

    #[test]
    fn ema_seed_equals_sma() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].into_iter().map(Some).collect();
        let series = ema(&values, 3);
        assert_eq!(series.get(1), None);
        assert!((series.get(2).unwrap() - 2.0).abs() < 1e-12);
        // alpha = 0.5 -> 4 * 0.5 + 2 * 0.5
        assert!((series.get(3).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ema_skips_leading_undefined() {
        let values = vec![None, None, Some(2.0), Some(4.0), Some(6.0)];
        let series = ema(&values, 2);
        assert_eq!(series.first_defined(), Some(3));
        assert!((series.get(3).unwrap() - 3.0).abs() < 1e-12);
        // alpha = 2/3 -> 6 * 2/3 + 3 * 1/3 = 5
        assert!((series.get(4).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn ema_stops_at_undefined_gap() {
        let values = vec![Some(1.0), Some(1.0), None, Some(1.0)];
        let series = ema(&values, 2);
        assert_eq!(series.values(), &[None, Some(1.0), None, None]);
    }

    #[test]
    fn wilder_known_values() {
        let smoothed = wilder(&[1.0, 3.0, 5.0], 2);
        assert_eq!(smoothed.len(), 2);
        assert!((smoothed[0] - 2.0).abs() < 1e-12);
        assert!((smoothed[1] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn zip_with_propagates_undefined() {
        let a = IndicatorSeries::new(vec![None, Some(3.0), Some(5.0)]);
        let b = IndicatorSeries::new(vec![Some(1.0), None, Some(2.0)]);
        assert_eq!(a.zip_with(&b, |x, y| x - y).values(), &[None, None, Some(3.0)]);
    }
}
