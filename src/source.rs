pub mod csv;
pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SourceError;
use crate::model::{BarSeries, Interval, Range};

/// What to fetch: one symbol over a range at a given bar interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRequest {
    pub symbol: String,
    pub range: Range,
    pub interval: Interval,
}

impl BarRequest {
    pub fn new(symbol: impl Into<String>, range: Range, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            range,
            interval,
        }
    }

    /// Intraday intervals are only served for short ranges; longer ranges
    /// are clamped to one month.
    pub fn normalized(&self) -> Self {
        if self.interval.is_intraday() && !self.range.allows_intraday() {
            warn!(
                symbol = %self.symbol,
                interval = %self.interval,
                requested_range = %self.range,
                "intraday interval requested with a long range, clamping range to 1mo"
            );
            return Self {
                range: Range::Month1,
                ..self.clone()
            };
        }
        self.clone()
    }
}

/// Abstraction over a provider of OHLCV bars.
///
/// Uses `BoxFuture` so the trait stays object-safe (`dyn BarSource`).
pub trait BarSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the bars covering `request`, already validated as a series.
    fn fetch_bars(
        &self,
        request: &BarRequest,
    ) -> BoxFuture<'_, Result<BarSeries, Report<SourceError>>>;
}
