use chrono::NaiveDate;

use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The record source could not answer. Never cached, never read as
    /// "available" or "empty".
    #[error("record source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error("invalid date range: end {end} is before start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}
