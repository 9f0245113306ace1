//! Write paths: manual exercise sessions and weight entries.
//!
//! A session is written together with its companions (a steps record, an
//! energy record and a heart-rate series sampled every 30 seconds) in one
//! `insert_records` call, so stores that write atomically never expose a
//! session without them.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use stride_platform::RecordStore;
use stride_protocol::{
    DataOrigin, ExerciseType, Record, RecordPayload, SeriesSample, SessionRecord, ZoneOffset,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, Result};

pub const HEART_RATE_INTERVAL_SECS: i64 = 30;

/// What to record for one manually entered session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub exercise_type: ExerciseType,
    pub title: Option<String>,
    pub steps: u64,
    pub energy_kcal: f64,
}

/// Heart-rate samples from `start` (inclusive) to `end` (exclusive), one every
/// [`HEART_RATE_INTERVAL_SECS`]. `bpm` is asked for each sample's value.
pub fn heart_rate_samples(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    mut bpm: impl FnMut(DateTime<Utc>) -> f64,
) -> Vec<SeriesSample> {
    let step = Duration::seconds(HEART_RATE_INTERVAL_SECS);
    let mut samples = Vec::new();
    let mut time = start;
    while time < end {
        samples.push(SeriesSample::new(time, bpm(time)));
        time += step;
    }
    samples
}

pub struct RecordWriter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    origin: DataOrigin,
}

impl<'a, S: RecordStore + ?Sized> RecordWriter<'a, S> {
    /// Writer that stamps every record with `origin`.
    pub fn new(store: &'a S, origin: DataOrigin) -> Self {
        Self { store, origin }
    }

    /// Writes a session and its companions. Returns the stored session.
    pub fn write_exercise_session(
        &self,
        draft: &SessionDraft,
        bpm: impl FnMut(DateTime<Utc>) -> f64,
    ) -> Result<SessionRecord> {
        if draft.end <= draft.start {
            return Err(EngineError::InvalidRecord(format!(
                "session ends at {} before it starts at {}",
                draft.end, draft.start
            )));
        }

        let session_id = Uuid::new_v4().to_string();
        let records = self.session_records(&session_id, draft, bpm);
        let written = self.store.insert_records(&records)?;

        info!(
            session_id = %session_id,
            written,
            steps = draft.steps,
            "Recorded exercise session"
        );

        records
            .first()
            .and_then(SessionRecord::from_record)
            .ok_or_else(|| EngineError::InvalidRecord(format!("session {} was not built", session_id)))
    }

    /// Writes an instantaneous weight reading taken at `at`, in `at`'s offset.
    pub fn write_weight(&self, kilograms: f64, at: DateTime<FixedOffset>) -> Result<Record> {
        let offset = Some(ZoneOffset::from(*at.offset()));
        let time = at.with_timezone(&Utc);
        let record = Record {
            id: Uuid::new_v4().to_string(),
            origin: self.origin.clone(),
            start: time,
            end: time,
            start_offset: offset,
            end_offset: offset,
            payload: RecordPayload::Weight { kilograms },
        };

        self.store.insert_records(std::slice::from_ref(&record))?;
        debug!(id = %record.id, kilograms, "Recorded weight");
        Ok(record)
    }

    fn session_records(
        &self,
        session_id: &str,
        draft: &SessionDraft,
        bpm: impl FnMut(DateTime<Utc>) -> f64,
    ) -> Vec<Record> {
        let start = draft.start.with_timezone(&Utc);
        let end = draft.end.with_timezone(&Utc);
        let start_offset = Some(ZoneOffset::from(*draft.start.offset()));
        let end_offset = Some(ZoneOffset::from(*draft.end.offset()));

        let companion = |suffix: &str, payload: RecordPayload| Record {
            id: format!("{}-{}", session_id, suffix),
            origin: self.origin.clone(),
            start,
            end,
            start_offset,
            end_offset,
            payload,
        };

        vec![
            Record {
                id: session_id.to_string(),
                ..companion(
                    "session",
                    RecordPayload::ExerciseSession {
                        exercise_type: draft.exercise_type,
                        title: draft.title.clone(),
                    },
                )
            },
            companion("steps", RecordPayload::Steps { count: draft.steps }),
            companion(
                "energy",
                RecordPayload::TotalCaloriesBurned {
                    kilocalories: draft.energy_kcal,
                },
            ),
            companion(
                "heart-rate",
                RecordPayload::HeartRate {
                    samples: heart_rate_samples(start, end, bpm),
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SessionAggregator;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use stride_platform::MemoryStore;
    use stride_protocol::{RecordType, TimeWindow};

    fn plus_nine() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn draft(minutes: i64) -> SessionDraft {
        let start = plus_nine().with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        SessionDraft {
            start,
            end: start + Duration::minutes(minutes),
            exercise_type: ExerciseType::Running,
            title: Some("My Run #7".to_string()),
            steps: 2_000,
            energy_kcal: 150.0,
        }
    }

    fn writer(store: &MemoryStore) -> RecordWriter<'_, MemoryStore> {
        RecordWriter::new(store, DataOrigin::new("dev.stride.cli"))
    }

    #[test]
    fn test_heart_rate_samples_every_thirty_seconds() {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();

        let samples = heart_rate_samples(start, start + Duration::seconds(95), |_| 120.0);

        let offsets: Vec<i64> = samples.iter().map(|s| (s.time - start).num_seconds()).collect();
        assert_eq!(offsets, vec![0, 30, 60, 90]);
        assert!(heart_rate_samples(start, start, |_| 120.0).is_empty());
    }

    #[test]
    fn test_session_is_written_with_companions() {
        let store = MemoryStore::new();
        let mut next_bpm = 100.0;

        let session = writer(&store)
            .write_exercise_session(&draft(30), |_| {
                next_bpm += 1.0;
                next_bpm
            })
            .unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(session.title.as_deref(), Some("My Run #7"));
        assert_eq!(session.start_offset, ZoneOffset::from_hours(9));
        assert_eq!(session.duration_secs(), 1_800);

        let window = TimeWindow::between(session.start, session.end).unwrap();
        let heart_rate = store.read_window(RecordType::HeartRate, &window).unwrap();
        assert_eq!(heart_rate.len(), 1);
        assert_eq!(heart_rate[0].samples().len(), 60);
        assert_eq!(heart_rate[0].origin, session.origin);

        let summary = SessionAggregator::new(&store).summarize(&session.id).unwrap();
        assert_eq!(summary.total_steps, Some(2_000));
        assert_eq!(summary.total_energy_kcal, Some(150.0));
        assert_eq!(summary.min_heart_rate, Some(101.0));
        assert_eq!(summary.max_heart_rate, Some(160.0));
        assert_eq!(summary.heart_rate_series.len(), 60);
    }

    #[test]
    fn test_session_must_end_after_it_starts() {
        let store = MemoryStore::new();

        let result = writer(&store).write_exercise_session(&draft(0), |_| 120.0);

        assert!(matches!(result, Err(EngineError::InvalidRecord(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_weight_is_instantaneous_in_local_offset() {
        let store = MemoryStore::new();
        let at = plus_nine().with_ymd_and_hms(2024, 3, 5, 7, 30, 0).unwrap();

        let record = writer(&store).write_weight(71.5, at).unwrap();

        assert_eq!(record.start, record.end);
        assert_eq!(record.start, Utc.with_ymd_and_hms(2024, 3, 4, 22, 30, 0).unwrap());
        assert_eq!(record.start_offset, ZoneOffset::from_hours(9));
        assert_eq!(record.payload, RecordPayload::Weight { kilograms: 71.5 });

        let day = TimeWindow::day_of(at);
        assert_eq!(store.read_window(RecordType::Weight, &day).unwrap(), vec![record]);
    }

    #[test]
    fn test_invalid_weight_is_rejected() {
        let store = MemoryStore::new();
        let at = plus_nine().with_ymd_and_hms(2024, 3, 5, 7, 30, 0).unwrap();

        assert!(matches!(
            writer(&store).write_weight(-3.0, at),
            Err(EngineError::InvalidRecord(_))
        ));
        assert!(store.is_empty());
    }
}
