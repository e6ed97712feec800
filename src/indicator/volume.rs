use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, IndicatorSeries, rolling_mean, volumes};
use crate::model::Bar;

/// Simple moving average of traded volume.
pub struct VolumeMA {
    period: usize,
}

impl VolumeMA {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for VolumeMA {
    fn name(&self) -> &str {
        "Volume_MA"
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        rolling_mean(&volumes(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::bar;

    fn bars_with_volumes(vols: &[f64]) -> Vec<Bar> {
        vols.iter()
            .enumerate()
            .map(|(i, &v)| bar(i, 100.0, 100.0, 100.0, v))
            .collect()
    }

    #[test]
    fn volume_ma_period_zero_invalid() {
        assert!(VolumeMA::new(0).is_err());
    }

    #[test]
    fn volume_ma_short_input_all_undefined() {
        let vma = VolumeMA::new(5).unwrap();
        let values = vma.calculate(&bars_with_volumes(&[1.0; 4]));
        assert_eq!(values.len(), 4);
        assert_eq!(values.first_defined(), None);
    }

    #[test]
    fn volume_ma_known_value() {
        let vma = VolumeMA::new(3).unwrap();
        let values = vma.calculate(&bars_with_volumes(&[1.0, 2.0, 3.0, 4.0]));
        // (1+2+3)/3 = 2.0, (2+3+4)/3 = 3.0
        assert!((values.get(2).unwrap() - 2.0).abs() < 1e-9);
        assert!((values.get(3).unwrap() - 3.0).abs() < 1e-9);
    }
}
