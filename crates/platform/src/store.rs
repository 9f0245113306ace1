//! The record store seam.

use std::collections::BTreeSet;

use stride_protocol::{
    AggregateResult, ChangeToken, ChangesResponse, MetricKey, Record, RecordType, SessionRecord,
    TimeWindow,
};

use crate::error::Result;

/// Trait for health-data platforms the engine reads from.
///
/// Implementations are passed explicitly to every engine component; there is
/// no global instance. All calls are blocking.
pub trait RecordStore {
    /// Records of one type overlapping `window`, ordered by start time.
    ///
    /// Only records whose origin passes the window's origin filter are returned.
    fn read_window(&self, record_type: RecordType, window: &TimeWindow) -> Result<Vec<Record>>;

    /// Computes `metrics` over `window`.
    ///
    /// Metrics without data are left out of the result rather than failing.
    fn aggregate(
        &self,
        metrics: &BTreeSet<MetricKey>,
        window: &TimeWindow,
    ) -> Result<AggregateResult>;

    /// Issues a token watching changes to `watched` from this point on.
    fn get_change_token(&self, watched: &BTreeSet<RecordType>) -> Result<ChangeToken>;

    /// Returns the next page of changes after `token`.
    ///
    /// An expired or unknown token is reported through `token_expired`, not as an error.
    fn poll_changes(&self, token: &ChangeToken) -> Result<ChangesResponse>;

    fn resolve_session(&self, session_id: &str) -> Result<SessionRecord>;

    /// Inserts or replaces records by id. Returns the number written.
    fn insert_records(&self, records: &[Record]) -> Result<usize>;

    /// Deletes records by id. Unknown ids are ignored. Returns the number deleted.
    fn delete_records(&self, ids: &[String]) -> Result<usize>;
}
