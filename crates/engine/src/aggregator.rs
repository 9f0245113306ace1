//! Per-session summaries built from several windowed store queries.
//!
//! A summary is assembled in phases. Each phase asks the store one question
//! and returns a small typed result; [`merge`] then folds those results into a
//! [`SessionSummary`] without inventing values for anything the store did not
//! report.
//!
//! | Phase | Window | Origin filter | Metrics |
//! |---|---|---|---|
//! | session totals | session | none | steps, energy |
//! | origin metrics | session | session origin | heart rate, speed, duration |
//! | day totals | local day of session start | none | steps |
//! | series | session | session origin | heart-rate and speed records |

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use stride_platform::RecordStore;
use stride_protocol::{
    AggregateResult, MetricKey, Record, RecordType, SamplePoint, SessionRecord, SessionSummary,
    TimeWindow,
};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::series::flatten;

const SESSION_TOTAL_METRICS: [MetricKey; 2] = [MetricKey::StepsCountTotal, MetricKey::EnergyTotal];

const ORIGIN_METRICS: [MetricKey; 7] = [
    MetricKey::HeartRateMin,
    MetricKey::HeartRateAvg,
    MetricKey::HeartRateMax,
    MetricKey::ExerciseDurationTotal,
    MetricKey::SpeedMin,
    MetricKey::SpeedAvg,
    MetricKey::SpeedMax,
];

/// Totals over the session window from every origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionTotals {
    pub steps: Option<u64>,
    pub energy_kcal: Option<f64>,
}

impl SessionTotals {
    fn from_aggregate(result: &AggregateResult) -> Self {
        Self {
            steps: result.count(MetricKey::StepsCountTotal),
            energy_kcal: result.get(MetricKey::EnergyTotal),
        }
    }
}

/// Metrics over the session window authored by the session's own origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OriginMetrics {
    pub active_duration_secs: Option<i64>,
    pub min_heart_rate: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub min_speed: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
}

impl OriginMetrics {
    fn from_aggregate(result: &AggregateResult) -> Self {
        Self {
            active_duration_secs: result.seconds(MetricKey::ExerciseDurationTotal),
            min_heart_rate: result.get(MetricKey::HeartRateMin),
            avg_heart_rate: result.get(MetricKey::HeartRateAvg),
            max_heart_rate: result.get(MetricKey::HeartRateMax),
            min_speed: result.get(MetricKey::SpeedMin),
            avg_speed: result.get(MetricKey::SpeedAvg),
            max_speed: result.get(MetricKey::SpeedMax),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayTotals {
    pub steps: Option<u64>,
}

/// Raw series records and their flattened points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSeries {
    pub heart_rate_records: Vec<Record>,
    pub speed_records: Vec<Record>,
    pub heart_rate_series: Vec<SamplePoint>,
    pub speed_series: Vec<SamplePoint>,
}

/// Builds a summary from phase results. Each field is copied from the phase
/// that owns it; the session and day step totals are kept apart.
pub fn merge(
    session: SessionRecord,
    totals: SessionTotals,
    origin: OriginMetrics,
    day: DayTotals,
    series: SessionSeries,
) -> SessionSummary {
    SessionSummary {
        session,
        active_duration_secs: origin.active_duration_secs,
        total_steps: totals.steps,
        total_steps_for_day: day.steps,
        total_energy_kcal: totals.energy_kcal,
        min_heart_rate: origin.min_heart_rate,
        avg_heart_rate: origin.avg_heart_rate,
        max_heart_rate: origin.max_heart_rate,
        min_speed: origin.min_speed,
        avg_speed: origin.avg_speed,
        max_speed: origin.max_speed,
        heart_rate_records: series.heart_rate_records,
        speed_records: series.speed_records,
        heart_rate_series: series.heart_rate_series,
        speed_series: series.speed_series,
    }
}

pub struct SessionAggregator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> SessionAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolves `session_id` and builds its full summary.
    ///
    /// Fails with [`EngineError::SessionNotFound`] for unknown ids. Any failing
    /// query fails the whole call; there are no partial summaries.
    pub fn summarize(&self, session_id: &str) -> Result<SessionSummary> {
        let session = self.store.resolve_session(session_id)?;
        let window = session_window(&session)?;
        debug!(
            session_id,
            start = %session.start,
            end = %session.end,
            origin = %session.origin,
            "Summarizing session"
        );

        let totals = self.session_totals(&window)?;
        let origin = self.origin_metrics(&session, &window)?;
        let day = self.day_totals(&session)?;
        let series = self.session_series(&session, &window)?;

        debug!(
            session_id,
            steps = ?totals.steps,
            day_steps = ?day.steps,
            heart_rate_points = series.heart_rate_series.len(),
            speed_points = series.speed_series.len(),
            "Session summary ready"
        );

        Ok(merge(session, totals, origin, day, series))
    }

    /// Resolves `session_id` and reads only its chart series, without running
    /// any aggregate query.
    pub fn series(&self, session_id: &str) -> Result<(SessionRecord, SessionSeries)> {
        let session = self.store.resolve_session(session_id)?;
        let window = session_window(&session)?;
        let series = self.session_series(&session, &window)?;
        Ok((session, series))
    }

    /// Step total for the local calendar day containing `day`, from every origin.
    pub fn total_steps_for_day(&self, day: DateTime<FixedOffset>) -> Result<Option<u64>> {
        let window = TimeWindow::day_of(day);
        let result = self
            .store
            .aggregate(&metric_set(&[MetricKey::StepsCountTotal]), &window)?;
        Ok(result.count(MetricKey::StepsCountTotal))
    }

    pub fn session_totals(&self, window: &TimeWindow) -> Result<SessionTotals> {
        let result = self
            .store
            .aggregate(&metric_set(&SESSION_TOTAL_METRICS), window)?;
        debug!(metrics = result.len(), "Fetched session totals");
        Ok(SessionTotals::from_aggregate(&result))
    }

    pub fn origin_metrics(&self, session: &SessionRecord, window: &TimeWindow) -> Result<OriginMetrics> {
        let window = window.clone().with_origin(session.origin.clone());
        let result = self.store.aggregate(&metric_set(&ORIGIN_METRICS), &window)?;
        debug!(metrics = result.len(), "Fetched origin metrics");
        Ok(OriginMetrics::from_aggregate(&result))
    }

    /// Steps over the day the session started on, in the session's own offset.
    pub fn day_totals(&self, session: &SessionRecord) -> Result<DayTotals> {
        let steps = self.total_steps_for_day(session.local_start())?;
        debug!(steps = ?steps, "Fetched day totals");
        Ok(DayTotals { steps })
    }

    pub fn session_series(&self, session: &SessionRecord, window: &TimeWindow) -> Result<SessionSeries> {
        let window = window.clone().with_origin(session.origin.clone());
        let heart_rate_records = self.store.read_window(RecordType::HeartRate, &window)?;
        let speed_records = self.store.read_window(RecordType::Speed, &window)?;

        Ok(SessionSeries {
            heart_rate_series: flatten(&heart_rate_records),
            speed_series: flatten(&speed_records),
            heart_rate_records,
            speed_records,
        })
    }
}

fn session_window(session: &SessionRecord) -> Result<TimeWindow> {
    TimeWindow::between(session.start, session.end)
        .map_err(|err| EngineError::InvalidRecord(format!("session {}: {}", session.id, err)))
}

fn metric_set(metrics: &[MetricKey]) -> BTreeSet<MetricKey> {
    metrics.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        heart_rate, kst, record, session, steps, ScriptedStore, PEDOMETER, RUN_APP,
    };
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use stride_platform::StoreError;
    use stride_protocol::{DataOrigin, RecordPayload, SeriesSample};

    fn morning_run() -> Vec<Record> {
        vec![
            session("run", kst(8, 0), kst(8, 30)),
            steps("during", PEDOMETER, kst(8, 0), kst(8, 30), 3_000),
            steps("commute", PEDOMETER, kst(6, 0), kst(6, 45), 5_000),
            steps("evening", PEDOMETER, kst(18, 0), kst(19, 0), 4_000),
            record(
                "kcal",
                PEDOMETER,
                kst(8, 0),
                kst(8, 30),
                RecordPayload::TotalCaloriesBurned { kilocalories: 310.5 },
            ),
            heart_rate(
                "hr-run",
                RUN_APP,
                &[(kst(8, 20), 140.0), (kst(8, 5), 100.0), (kst(8, 10), 120.0)],
            ),
            heart_rate("hr-watch", "com.example.watch", &[(kst(8, 15), 190.0)]),
        ]
    }

    #[test]
    fn test_session_and_day_steps_are_reported_separately() {
        let store = ScriptedStore::with_records(morning_run());

        let summary = SessionAggregator::new(&store).summarize("run").unwrap();

        assert_eq!(summary.total_steps, Some(3_000));
        assert_eq!(summary.total_steps_for_day, Some(12_000));
    }

    #[test]
    fn test_full_summary() {
        let store = ScriptedStore::with_records(morning_run());

        let summary = SessionAggregator::new(&store).summarize("run").unwrap();

        assert_eq!(summary.session_id(), "run");
        assert_eq!(summary.active_duration_secs, Some(1_800));
        assert_eq!(summary.total_energy_kcal, Some(310.5));
        assert_eq!(summary.min_heart_rate, Some(100.0));
        assert_eq!(summary.avg_heart_rate, Some(120.0));
        assert_eq!(summary.max_heart_rate, Some(140.0));
        assert_eq!(summary.min_speed, None);
        assert_eq!(summary.heart_rate_records.len(), 1);
        assert_eq!(summary.heart_rate_records[0].id, "hr-run");
        assert!(summary.speed_records.is_empty());

        let values: Vec<f64> = summary.heart_rate_series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![100.0, 120.0, 140.0]);
    }

    #[test]
    fn test_query_windows_and_filters() {
        let store = ScriptedStore::with_records(morning_run());

        SessionAggregator::new(&store).summarize("run").unwrap();

        let calls = store.aggregate_calls();
        assert_eq!(calls.len(), 3);

        let (totals_metrics, totals_window) = &calls[0];
        assert_eq!(*totals_metrics, metric_set(&SESSION_TOTAL_METRICS));
        assert!(totals_window.is_unrestricted());
        assert_eq!(totals_window.start(), kst(8, 0));
        assert_eq!(totals_window.end(), kst(8, 30));

        let (origin_metrics, origin_window) = &calls[1];
        assert_eq!(*origin_metrics, metric_set(&ORIGIN_METRICS));
        assert_eq!(
            origin_window.origin_filter().iter().collect::<Vec<_>>(),
            vec![&DataOrigin::new(RUN_APP)]
        );

        let (day_metrics, day_window) = &calls[2];
        assert_eq!(*day_metrics, metric_set(&[MetricKey::StepsCountTotal]));
        assert!(day_window.is_unrestricted());
        assert_eq!(day_window.start(), kst(0, 0));

        let reads = store.read_calls.lock().unwrap();
        assert_eq!(reads.len(), 2);
        assert!(reads.iter().all(|(_, w)| !w.is_unrestricted()));
    }

    #[test]
    fn test_late_evening_session_uses_its_own_local_day() {
        let store = ScriptedStore::with_records([session("late", kst(23, 50), kst(24, 20))]);

        SessionAggregator::new(&store).summarize("late").unwrap();

        let calls = store.aggregate_calls();
        let day_window = &calls[2].1;
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(
            day_window.start().with_timezone(&offset).to_rfc3339(),
            "2024-03-05T00:00:00+09:00"
        );
        assert_eq!(
            day_window.end().with_timezone(&offset).to_rfc3339(),
            "2024-03-05T23:59:59.999+09:00"
        );
    }

    #[test]
    fn test_empty_heart_rate_aggregate_leaves_fields_absent() {
        let mut store = ScriptedStore::with_records(morning_run());
        store.aggregate_override = Some(AggregateResult::new());

        let summary = SessionAggregator::new(&store).summarize("run").unwrap();

        assert!(!summary.has_heart_rate());
        assert_eq!(summary.total_steps, None);
        assert_eq!(summary.total_steps_for_day, None);
        assert_eq!(summary.active_duration_secs, None);
        assert_eq!(summary.total_energy_kcal, None);
    }

    #[test]
    fn test_unknown_session() {
        let store = ScriptedStore::with_records(morning_run());

        assert_eq!(
            SessionAggregator::new(&store).summarize("nope"),
            Err(EngineError::SessionNotFound("nope".to_string()))
        );
        assert!(store.aggregate_calls().is_empty());
    }

    #[test]
    fn test_non_session_record_id_is_not_found() {
        let store = ScriptedStore::with_records(morning_run());

        assert!(matches!(
            SessionAggregator::new(&store).summarize("during"),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_any_failing_query_fails_the_summary() {
        for failing_call in 1..=3 {
            let mut store = ScriptedStore::with_records(morning_run());
            store.fail_aggregate_call =
                Some((failing_call, StoreError::Unavailable("timeout".to_string())));

            assert_eq!(
                SessionAggregator::new(&store).summarize("run"),
                Err(EngineError::Unavailable("timeout".to_string())),
                "aggregate call {failing_call}"
            );
        }
    }

    #[test]
    fn test_speed_is_origin_filtered() {
        let mut records = morning_run();
        records.push(record(
            "speed-run",
            RUN_APP,
            kst(8, 0),
            kst(8, 30),
            RecordPayload::Speed {
                samples: vec![
                    SeriesSample::new(kst(8, 1), 2.5),
                    SeriesSample::new(kst(8, 2), 3.5),
                ],
            },
        ));
        records.push(record(
            "speed-other",
            PEDOMETER,
            kst(8, 0),
            kst(8, 30),
            RecordPayload::Speed {
                samples: vec![SeriesSample::new(kst(8, 3), 9.0)],
            },
        ));
        let store = ScriptedStore::with_records(records);

        let summary = SessionAggregator::new(&store).summarize("run").unwrap();

        assert_eq!(summary.min_speed, Some(2.5));
        assert_eq!(summary.avg_speed, Some(3.0));
        assert_eq!(summary.max_speed, Some(3.5));
        assert_eq!(summary.speed_series.len(), 2);
    }

    #[test]
    fn test_series_skips_aggregate_queries() {
        let store = ScriptedStore::with_records([
            session("s", kst(8, 0), kst(8, 30)),
            heart_rate("hr", RUN_APP, &[(kst(8, 1), 100.0), (kst(8, 2), 130.0)]),
            heart_rate("other", PEDOMETER, &[(kst(8, 3), 90.0)]),
        ]);

        let (session, series) = SessionAggregator::new(&store).series("s").unwrap();

        assert_eq!(session.id, "s");
        assert!(store.aggregate_calls().is_empty());
        let values: Vec<f64> = series.heart_rate_series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![100.0, 130.0]);
        assert!(series.speed_series.is_empty());
        assert!(matches!(
            SessionAggregator::new(&store).series("missing"),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_total_steps_for_day() {
        let store = ScriptedStore::with_records(morning_run());
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let noon = offset.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();

        let aggregator = SessionAggregator::new(&store);

        assert_eq!(aggregator.total_steps_for_day(noon).unwrap(), Some(12_000));
        let next_day = offset.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();
        assert_eq!(aggregator.total_steps_for_day(next_day).unwrap(), None);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let session = SessionRecord::from_record(&session("run", kst(8, 0), kst(8, 30))).unwrap();

        let summary = merge(
            session,
            SessionTotals {
                steps: Some(0),
                energy_kcal: None,
            },
            OriginMetrics::default(),
            DayTotals { steps: Some(42) },
            SessionSeries::default(),
        );

        assert_eq!(summary.total_steps, Some(0));
        assert_eq!(summary.total_energy_kcal, None);
        assert_eq!(summary.total_steps_for_day, Some(42));
        assert!(!summary.has_heart_rate());
        assert_eq!(summary.min_speed, None);
    }
}
