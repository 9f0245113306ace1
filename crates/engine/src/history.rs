//! Read paths over past sessions and weight readings.

use std::collections::BTreeSet;

use stride_platform::RecordStore;
use stride_protocol::{MetricKey, Record, RecordType, SessionRecord, TimeWindow};
use tracing::debug;

use crate::error::Result;

pub struct HistoryQueries<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> HistoryQueries<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Exercise sessions overlapping `window`, oldest first.
    pub fn read_exercise_sessions(&self, window: &TimeWindow) -> Result<Vec<SessionRecord>> {
        let records = self.store.read_window(RecordType::ExerciseSession, window)?;
        let mut sessions: Vec<SessionRecord> =
            records.iter().filter_map(SessionRecord::from_record).collect();
        sessions.sort_by_key(|s| s.start);
        debug!(count = sessions.len(), "Read exercise sessions");
        Ok(sessions)
    }

    pub fn read_weights(&self, window: &TimeWindow) -> Result<Vec<Record>> {
        let weights = self.store.read_window(RecordType::Weight, window)?;
        debug!(count = weights.len(), "Read weight records");
        Ok(weights)
    }

    /// Mean weight over `window`, `None` when there are no readings.
    pub fn average_weight(&self, window: &TimeWindow) -> Result<Option<f64>> {
        let metrics: BTreeSet<MetricKey> = [MetricKey::WeightAvg].into_iter().collect();
        let result = self.store.aggregate(&metrics, window)?;
        Ok(result.get(MetricKey::WeightAvg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::{kst, record, session, steps, ScriptedStore, PEDOMETER};
    use pretty_assertions::assert_eq;
    use stride_platform::StoreError;
    use stride_protocol::RecordPayload;

    fn weight(id: &str, hour: u32, kilograms: f64) -> Record {
        record(id, "com.example.scale", kst(hour, 0), kst(hour, 0), RecordPayload::Weight { kilograms })
    }

    fn whole_day() -> TimeWindow {
        TimeWindow::between(kst(0, 0), kst(23, 59)).unwrap()
    }

    #[test]
    fn test_sessions_are_ordered_by_start() {
        let store = ScriptedStore::with_records([
            session("late", kst(18, 0), kst(18, 40)),
            session("early", kst(7, 0), kst(7, 30)),
            steps("noise", PEDOMETER, kst(7, 0), kst(7, 30), 100),
        ]);

        let sessions = HistoryQueries::new(&store)
            .read_exercise_sessions(&whole_day())
            .unwrap();

        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_weights_and_average() {
        let store = ScriptedStore::with_records([
            weight("w1", 7, 70.0),
            weight("w2", 21, 71.0),
            steps("noise", PEDOMETER, kst(7, 0), kst(7, 30), 100),
        ]);
        let history = HistoryQueries::new(&store);

        assert_eq!(history.read_weights(&whole_day()).unwrap().len(), 2);
        assert_eq!(history.average_weight(&whole_day()).unwrap(), Some(70.5));
    }

    #[test]
    fn test_average_weight_without_readings() {
        let store = ScriptedStore::default();

        assert_eq!(
            HistoryQueries::new(&store).average_weight(&whole_day()).unwrap(),
            None
        );
    }

    #[test]
    fn test_store_failure_propagates() {
        let mut store = ScriptedStore::default();
        store.fail_aggregate_call = Some((1, StoreError::Unavailable("down".to_string())));

        assert_eq!(
            HistoryQueries::new(&store).average_weight(&whole_day()),
            Err(EngineError::Unavailable("down".to_string()))
        );
    }
}
