//! Value types shared by the stride engine, its stores and the CLI.
//!
//! Everything here is a plain serde-serializable value: records as the health
//! platform stores them, the change-feed vocabulary, aggregate metrics and the
//! merged session summary.

mod changes;
mod metrics;
mod records;
mod summary;
mod window;

pub use changes::{Change, ChangeMessage, ChangeToken, ChangesResponse};
pub use metrics::{AggregateResult, MetricKey, Statistic};
pub use records::{
    DataOrigin, ExerciseType, Record, RecordPayload, RecordType, SeriesSample, SessionRecord,
    ZoneOffset,
};
pub use summary::{SamplePoint, SessionSummary};
pub use window::{InvalidWindow, TimeWindow};
