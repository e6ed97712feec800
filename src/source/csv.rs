use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::model::{Bar, BarSeries};
use crate::source::{BarRequest, BarSource};

const SOURCE_NAME: &str = "csv";

/// Reads bars from `<dir>/<SYMBOL>.csv` files with the header
/// `timestamp,open,high,low,close,volume`.
///
/// Timestamps are RFC 3339 or plain `YYYY-MM-DD` dates (midnight UTC).
/// Only the rows inside the requested range, measured back from the last
/// row, are returned.
pub struct CsvBarSource {
    dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl BarSource for CsvBarSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch_bars(
        &self,
        request: &BarRequest,
    ) -> BoxFuture<'_, Result<BarSeries, Report<SourceError>>> {
        let request = request.clone();
        Box::pin(async move {
            let path = self.path_for(&request.symbol);
            let content = tokio::fs::read_to_string(&path)
                .await
                .change_context(SourceError::Request {
                    source_name: SOURCE_NAME.into(),
                })
                .attach_with(|| format!("path: {}", path.display()))?;

            let rows = parse_bars(&content, &path)?;
            let total = rows.len();

            let start = rows
                .last()
                .and_then(|last| request.range.start_from(last.timestamp));
            let bars: Vec<Bar> = match start {
                Some(start) => rows.into_iter().filter(|b| b.timestamp >= start).collect(),
                None => rows,
            };
            debug!(
                symbol = %request.symbol,
                range = %request.range,
                total,
                kept = bars.len(),
                "csv rows filtered by range"
            );

            if bars.len() < 2 {
                return Err(Report::new(SourceError::NoData {
                    symbol: request.symbol.clone(),
                })
                .attach(format!("rows in range: {}", bars.len())));
            }

            let series = BarSeries::new(request.symbol.clone(), request.interval, bars)
                .change_context(SourceError::InvalidBars {
                    symbol: request.symbol.clone(),
                })?;

            info!(
                symbol = %request.symbol,
                bars = series.len(),
                path = %path.display(),
                "csv bar load complete"
            );
            Ok(series)
        })
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvRow {
    fn into_bar(self) -> Result<Bar, Report<SourceError>> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| {
            Report::new(SourceError::ResponseParse {
                source_name: SOURCE_NAME.into(),
            })
            .attach(format!("unrecognized timestamp: {}", self.timestamp))
        })?;
        Ok(Bar {
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

fn parse_bars(content: &str, path: &Path) -> Result<Vec<Bar>, Report<SourceError>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_reader(content.as_bytes());

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(line, row)| {
            row.change_context(SourceError::ResponseParse {
                source_name: SOURCE_NAME.into(),
            })
            .attach_with(|| format!("{} row {}", path.display(), line + 1))?
            .into_bar()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::TimeZone;

    use super::*;
    use crate::model::{Interval, Range};

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    fn write_fixture(dir: &Path, symbol: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(format!("{symbol}.csv"))).unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2024-01-02T14:30:00-05:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 19, 30, 0).unwrap())
        );
        assert_eq!(parse_timestamp("02/01/2024"), None);
    }

    #[tokio::test]
    async fn loads_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "AAPL",
            "2024-01-02,100,101,99,100.5,1000\n\
             2024-01-03,100.5,102,100,101.5,1200\n\
             2024-01-04,101.5,103,101,102,900\n",
        );

        let source = CsvBarSource::new(dir.path());
        let request = BarRequest::new("AAPL", Range::Max, Interval::Day1);
        let series = source.fetch_bars(&request).await.unwrap();

        assert_eq!(series.symbol(), "AAPL");
        assert_eq!(series.interval(), Interval::Day1);
        assert_eq!(series.len(), 3);
        let last = series.last().unwrap();
        assert_eq!(last.close, 102.0);
        assert_eq!(last.volume, 900.0);
    }

    #[tokio::test]
    async fn range_keeps_trailing_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "SPY",
            "2023-06-01,10,11,9,10,1\n\
             2024-01-02,10,11,9,10,1\n\
             2024-01-20,10,11,9,10,1\n\
             2024-01-31,10,11,9,10,1\n",
        );

        let source = CsvBarSource::new(dir.path());
        let request = BarRequest::new("SPY", Range::Month1, Interval::Day1);
        let series = source.fetch_bars(&request).await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.bars()[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_file_is_request_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvBarSource::new(dir.path());
        let request = BarRequest::new("NOPE", Range::Max, Interval::Day1);
        let err = source.fetch_bars(&request).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::Request { .. }
        ));
    }

    #[tokio::test]
    async fn single_row_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "ONE", "2024-01-02,10,11,9,10,1\n");
        let source = CsvBarSource::new(dir.path());
        let request = BarRequest::new("ONE", Range::Max, Interval::Day1);
        let err = source.fetch_bars(&request).await.unwrap_err();
        assert!(matches!(err.current_context(), SourceError::NoData { .. }));
    }

    #[tokio::test]
    async fn malformed_bar_is_invalid_bars() {
        let dir = tempfile::tempdir().unwrap();
        // high below close on the second row
        write_fixture(
            dir.path(),
            "BAD",
            "2024-01-02,10,11,9,10,1\n\
             2024-01-03,10,10.5,9,11,1\n",
        );
        let source = CsvBarSource::new(dir.path());
        let request = BarRequest::new("BAD", Range::Max, Interval::Day1);
        let err = source.fetch_bars(&request).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::InvalidBars { .. }
        ));
    }

    #[tokio::test]
    async fn unparseable_number_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "TXT",
            "2024-01-02,10,11,9,ten,1\n\
             2024-01-03,10,11,9,10,1\n",
        );
        let source = CsvBarSource::new(dir.path());
        let request = BarRequest::new("TXT", Range::Max, Interval::Day1);
        let err = source.fetch_bars(&request).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::ResponseParse { .. }
        ));
    }
}
