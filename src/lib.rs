//! Technical-indicator engine for OHLCV bar series.
//!
//! [`engine::compute_all`] turns a validated [`model::BarSeries`] into an
//! [`engine::AugmentedSeries`] carrying every indicator column, and
//! [`signal::SignalSummary`] classifies its latest row. Bars come from a
//! [`source::BarSource`]; the engine itself performs no I/O.

pub mod config;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod model;
pub mod report;
pub mod signal;
pub mod source;
