use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("request to {source_name} failed")]
    Request { source_name: String },
    #[display("failed to parse response from {source_name}")]
    ResponseParse { source_name: String },
    #[display("rate limit exceeded for {source_name}")]
    RateLimit { source_name: String },
    #[display("no usable bars for {symbol}")]
    NoData { symbol: String },
    #[display("bars for {symbol} violate series invariants")]
    InvalidBars { symbol: String },
}

#[derive(Debug, Display, Error, PartialEq)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("malformed bar at index {index}: {reason}")]
    MalformedBar { index: usize, reason: String },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}
