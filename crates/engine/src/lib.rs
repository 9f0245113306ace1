//! Sync and aggregation engine for stride.
//!
//! Everything here is a synchronous pipeline over a borrowed
//! [`RecordStore`](stride_platform::RecordStore):
//!
//! - [`poll`] / [`ChangeCursor`] walk the store's change feed page by page.
//! - [`SessionAggregator`] merges several windowed queries into a
//!   [`SessionSummary`](stride_protocol::SessionSummary).
//! - [`flatten`] turns per-record sample series into chart points.
//! - [`HistoryQueries`] covers session listings and weight readings.
//! - [`RecordWriter`] records manual sessions and weight entries.
//!
//! # Example
//!
//! ```ignore
//! use stride_engine::{poll, SessionAggregator};
//!
//! let summary = SessionAggregator::new(&store).summarize("session-1")?;
//! let (changes, token) = poll(&store, saved_token).drain()?;
//! ```

mod aggregator;
mod cursor;
mod error;
mod history;
mod series;
mod writer;

#[cfg(test)]
mod testing;

pub use aggregator::{
    merge, DayTotals, OriginMetrics, SessionAggregator, SessionSeries, SessionTotals,
};
pub use cursor::{poll, ChangeCursor};
pub use error::{EngineError, Result};
pub use history::HistoryQueries;
pub use series::flatten;
pub use writer::{heart_rate_samples, RecordWriter, SessionDraft, HEART_RATE_INTERVAL_SECS};
