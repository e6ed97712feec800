use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::model::{Bar, BarSeries, InstrumentInfo};
use crate::source::{BarRequest, BarSource};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const SOURCE_NAME: &str = "yahoo";
// The chart endpoint rejects the default reqwest user agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct YahooOptions {
    pub base_url: String,
    pub requests_per_second: NonZeroU32,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for YahooOptions {
    fn default() -> Self {
        Self {
            base_url: YAHOO_BASE_URL.into(),
            requests_per_second: nonzero!(2u32),
            max_retries: 1,
            retry_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct YahooBarSource {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    options: YahooOptions,
}

impl YahooBarSource {
    pub fn new(options: YahooOptions) -> Result<Self, Report<SourceError>> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .change_context(SourceError::Request {
                source_name: SOURCE_NAME.into(),
            })
            .attach("failed to build HTTP client")?;
        let quota = Quota::per_second(options.requests_per_second);
        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            options,
        })
    }

    /// Wait before the next attempt, or `None` when the failure is final.
    fn retry_delay(&self, error: &SourceError, attempt: u32) -> Option<Duration> {
        if attempt >= self.options.max_retries {
            return None;
        }
        let base = self.options.retry_delay;
        match error {
            SourceError::RateLimit { .. } => Some(base * (attempt + 2)),
            SourceError::NoData { .. } => Some(base * (attempt + 1)),
            SourceError::Request { .. } => Some(base),
            SourceError::ResponseParse { .. } | SourceError::InvalidBars { .. } => None,
        }
    }

    async fn fetch_once(&self, request: &BarRequest) -> Result<BarSeries, Report<SourceError>> {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/v8/finance/chart/{}",
            self.options.base_url.trim_end_matches('/'),
            request.symbol
        );
        let params = [
            ("range", request.range.as_str()),
            ("interval", request.interval.as_str()),
            ("includePrePost", "false"),
        ];

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .change_context(SourceError::Request {
                source_name: SOURCE_NAME.into(),
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(Report::new(SourceError::RateLimit {
                    source_name: SOURCE_NAME.into(),
                }));
            }
            StatusCode::NOT_FOUND => {
                return Err(Report::new(SourceError::NoData {
                    symbol: request.symbol.clone(),
                })
                .attach("HTTP status: 404 Not Found"));
            }
            status if !status.is_success() => {
                return Err(Report::new(SourceError::Request {
                    source_name: SOURCE_NAME.into(),
                })
                .attach(format!("HTTP status: {status}")));
            }
            _ => {}
        }

        let body: ChartResponse =
            response
                .json()
                .await
                .change_context(SourceError::ResponseParse {
                    source_name: SOURCE_NAME.into(),
                })?;

        let info = body.instrument_info();
        let bars = body.into_bars(&request.symbol)?;
        if bars.len() < 2 {
            return Err(Report::new(SourceError::NoData {
                symbol: request.symbol.clone(),
            })
            .attach(format!("usable rows: {}", bars.len())));
        }

        let series = BarSeries::new(request.symbol.clone(), request.interval, bars)
            .change_context(SourceError::InvalidBars {
                symbol: request.symbol.clone(),
            })?;
        Ok(match info {
            Some(info) => series.with_info(info),
            None => series,
        })
    }
}

impl BarSource for YahooBarSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch_bars(
        &self,
        request: &BarRequest,
    ) -> BoxFuture<'_, Result<BarSeries, Report<SourceError>>> {
        let request = request.normalized();
        Box::pin(async move {
            let mut attempt = 0;
            loop {
                debug!(
                    symbol = %request.symbol,
                    attempt = attempt + 1,
                    max_attempts = self.options.max_retries + 1,
                    "yahoo chart request"
                );
                match self.fetch_once(&request).await {
                    Ok(series) => {
                        info!(
                            symbol = %request.symbol,
                            range = %request.range,
                            interval = %request.interval,
                            fetched = series.len(),
                            "yahoo bar fetch complete"
                        );
                        return Ok(series);
                    }
                    Err(report) => {
                        let Some(delay) = self.retry_delay(report.current_context(), attempt)
                        else {
                            return Err(report.attach(format!("attempts: {}", attempt + 1)));
                        };
                        warn!(
                            symbol = %request.symbol,
                            error = %report.current_context(),
                            delay_secs = delay.as_secs_f64(),
                            "yahoo fetch failed, retrying..."
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}

// ── Chart response ──

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    long_name: Option<String>,
    short_name: Option<String>,
    currency: Option<String>,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResponse {
    /// Instrument details from `meta`; the long name wins over the short one.
    fn instrument_info(&self) -> Option<InstrumentInfo> {
        let meta = self.chart.result.as_ref()?.first()?.meta.as_ref()?;
        Some(InstrumentInfo {
            name: meta.long_name.clone().or_else(|| meta.short_name.clone()),
            currency: meta.currency.clone(),
            market_price: meta.regular_market_price,
        })
    }

    /// Rows with a missing price are skipped, as are rows whose timestamp does
    /// not advance past the previous kept row. A missing volume counts as 0.
    fn into_bars(self, symbol: &str) -> Result<Vec<Bar>, Report<SourceError>> {
        if let Some(error) = self.chart.error {
            return Err(Report::new(SourceError::NoData {
                symbol: symbol.to_owned(),
            })
            .attach(format!("{}: {}", error.code, error.description)));
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
        let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut bars: Vec<Bar> = Vec::with_capacity(result.timestamp.len());
        let mut skipped = 0usize;
        for (i, &ts) in result.timestamp.iter().enumerate() {
            let row = (
                DateTime::from_timestamp(ts, 0),
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
            );
            let (Some(timestamp), Some(open), Some(high), Some(low), Some(close)) = row else {
                skipped += 1;
                continue;
            };
            if bars.last().is_some_and(|prev| prev.timestamp >= timestamp) {
                skipped += 1;
                continue;
            }
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume: at(&quote.volume, i).unwrap_or(0.0),
            });
        }

        if skipped > 0 {
            debug!(symbol, skipped, kept = bars.len(), "yahoo rows skipped");
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interval, Range};

    fn parse(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn chart_rows_become_bars() {
        let body = parse(
            r#"{"chart":{"result":[{
                "meta":{"symbol":"AAPL"},
                "timestamp":[1704205800,1704292200,1704378600],
                "indicators":{"quote":[{
                    "open":[187.15,184.22,182.15],
                    "high":[188.44,185.88,183.09],
                    "low":[183.89,183.43,180.88],
                    "close":[185.64,184.25,181.91],
                    "volume":[82488700,58414500,71983600]
                }]}
            }],"error":null}}"#,
        );
        let bars = body.into_bars("AAPL").unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp.timestamp(), 1704205800);
        assert_eq!(bars[1].close, 184.25);
        assert_eq!(bars[2].volume, 71983600.0);
    }

    #[test]
    fn meta_becomes_instrument_info() {
        let body = parse(
            r#"{"chart":{"result":[{
                "meta":{"symbol":"AAPL","currency":"USD","regularMarketPrice":181.91,
                        "longName":"Apple Inc.","shortName":"Apple"},
                "timestamp":[1704205800],
                "indicators":{"quote":[{"open":[1.0],"high":[1.0],"low":[1.0],"close":[1.0]}]}
            }],"error":null}}"#,
        );
        let info = body.instrument_info().unwrap();
        assert_eq!(info.name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.currency.as_deref(), Some("USD"));
        assert_eq!(info.market_price, Some(181.91));
    }

    #[test]
    fn partial_meta_keeps_missing_fields_empty() {
        let body = parse(
            r#"{"chart":{"result":[{
                "meta":{"symbol":"005930.KS","shortName":"SamsungElec"},
                "timestamp":[],
                "indicators":{"quote":[{}]}
            }],"error":null}}"#,
        );
        assert_eq!(
            body.instrument_info(),
            Some(InstrumentInfo {
                name: Some("SamsungElec".into()),
                currency: None,
                market_price: None,
            })
        );

        let without_meta = parse(r#"{"chart":{"result":[],"error":null}}"#);
        assert_eq!(without_meta.instrument_info(), None);
    }

    #[test]
    fn null_prices_are_skipped() {
        let body = parse(
            r#"{"chart":{"result":[{
                "timestamp":[1,2,3],
                "indicators":{"quote":[{
                    "open":[10.0,null,12.0],
                    "high":[11.0,null,13.0],
                    "low":[9.0,null,11.0],
                    "close":[10.5,null,12.5],
                    "volume":[100,null,null]
                }]}
            }],"error":null}}"#,
        );
        let bars = body.into_bars("X").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 12.5);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn repeated_timestamp_is_dropped() {
        let body = parse(
            r#"{"chart":{"result":[{
                "timestamp":[1,2,2],
                "indicators":{"quote":[{
                    "open":[10.0,11.0,11.0],
                    "high":[11.0,12.0,12.0],
                    "low":[9.0,10.0,10.0],
                    "close":[10.5,11.5,11.6],
                    "volume":[1,1,1]
                }]}
            }],"error":null}}"#,
        );
        assert_eq!(body.into_bars("X").unwrap().len(), 2);
    }

    #[test]
    fn chart_error_is_no_data() {
        let body = parse(
            r#"{"chart":{"result":null,"error":{
                "code":"Not Found","description":"No data found, symbol may be delisted"
            }}}"#,
        );
        let err = body.into_bars("ZZZZ").unwrap_err();
        assert!(matches!(err.current_context(), SourceError::NoData { .. }));
    }

    #[test]
    fn empty_result_has_no_bars() {
        let body = parse(r#"{"chart":{"result":[],"error":null}}"#);
        assert!(body.into_bars("X").unwrap().is_empty());
    }

    #[test]
    fn retry_policy() {
        let source = YahooBarSource::new(YahooOptions {
            max_retries: 2,
            retry_delay: Duration::from_secs(3),
            ..YahooOptions::default()
        })
        .unwrap();
        let rate_limit = SourceError::RateLimit {
            source_name: "yahoo".into(),
        };
        let no_data = SourceError::NoData {
            symbol: "X".into(),
        };
        let parse_error = SourceError::ResponseParse {
            source_name: "yahoo".into(),
        };

        assert_eq!(
            source.retry_delay(&rate_limit, 0),
            Some(Duration::from_secs(6))
        );
        assert_eq!(source.retry_delay(&no_data, 1), Some(Duration::from_secs(6)));
        assert_eq!(source.retry_delay(&parse_error, 0), None);
        assert_eq!(source.retry_delay(&rate_limit, 2), None);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn fetch_daily_bars() {
        let source = YahooBarSource::new(YahooOptions::default()).unwrap();
        let request = BarRequest::new("AAPL", Range::Month3, Interval::Day1);
        let series = source.fetch_bars(&request).await.unwrap();
        assert!(series.len() > 20);
        assert_eq!(series.symbol(), "AAPL");
        assert!(series.info().is_some_and(|info| info.name.is_some()));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn fetch_intraday_clamps_range() {
        let source = YahooBarSource::new(YahooOptions::default()).unwrap();
        let request = BarRequest::new("MSFT", Range::Year1, Interval::Hour1);
        let series = source.fetch_bars(&request).await.unwrap();
        assert!(series.len() >= 2);
        let span = series.last().unwrap().timestamp - series.bars()[0].timestamp;
        assert!(span.num_days() <= 31);
    }
}
