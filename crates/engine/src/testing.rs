//! Test doubles shared by the engine's unit tests.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use stride_platform::{MemoryStore, RecordStore, Result, StoreError};
use stride_protocol::{
    AggregateResult, Change, ChangeToken, ChangesResponse, DataOrigin, ExerciseType, MetricKey,
    Record, RecordPayload, RecordType, SeriesSample, SessionRecord, TimeWindow, ZoneOffset,
};

/// Store that replays scripted change pages and records every query it sees.
///
/// Everything that is not scripted is answered by an inner [`MemoryStore`].
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    polls: Mutex<VecDeque<Result<ChangesResponse>>>,
    pub polled_tokens: Mutex<Vec<ChangeToken>>,
    pub aggregate_calls: Mutex<Vec<(BTreeSet<MetricKey>, TimeWindow)>>,
    pub read_calls: Mutex<Vec<(RecordType, TimeWindow)>>,
    pub aggregate_override: Option<AggregateResult>,
    pub fail_aggregate_call: Option<(usize, StoreError)>,
}

impl ScriptedStore {
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            inner: MemoryStore::with_records(records),
            ..Self::default()
        }
    }

    pub fn with_polls(polls: impl IntoIterator<Item = Result<ChangesResponse>>) -> Self {
        Self {
            polls: Mutex::new(polls.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn poll_count(&self) -> usize {
        self.polled_tokens.lock().unwrap().len()
    }

    pub fn aggregate_calls(&self) -> Vec<(BTreeSet<MetricKey>, TimeWindow)> {
        self.aggregate_calls.lock().unwrap().clone()
    }
}

impl RecordStore for ScriptedStore {
    fn read_window(&self, record_type: RecordType, window: &TimeWindow) -> Result<Vec<Record>> {
        self.read_calls
            .lock()
            .unwrap()
            .push((record_type, window.clone()));
        self.inner.read_window(record_type, window)
    }

    fn aggregate(
        &self,
        metrics: &BTreeSet<MetricKey>,
        window: &TimeWindow,
    ) -> Result<AggregateResult> {
        let call = {
            let mut calls = self.aggregate_calls.lock().unwrap();
            calls.push((metrics.clone(), window.clone()));
            calls.len()
        };
        if let Some((failing_call, err)) = &self.fail_aggregate_call {
            if *failing_call == call {
                return Err(err.clone());
            }
        }
        match &self.aggregate_override {
            Some(result) => Ok(result.clone()),
            None => self.inner.aggregate(metrics, window),
        }
    }

    fn get_change_token(&self, watched: &BTreeSet<RecordType>) -> Result<ChangeToken> {
        self.inner.get_change_token(watched)
    }

    fn poll_changes(&self, token: &ChangeToken) -> Result<ChangesResponse> {
        self.polled_tokens.lock().unwrap().push(token.clone());
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StoreError::Unavailable("no scripted page left".to_string())))
    }

    fn resolve_session(&self, session_id: &str) -> Result<SessionRecord> {
        self.inner.resolve_session(session_id)
    }

    fn insert_records(&self, records: &[Record]) -> Result<usize> {
        self.inner.insert_records(records)
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete_records(ids)
    }
}

pub fn page(ids: &[&str], next_token: &str, has_more: bool) -> Result<ChangesResponse> {
    Ok(ChangesResponse {
        changes: ids
            .iter()
            .map(|id| Change::Deletion {
                record_id: id.to_string(),
            })
            .collect(),
        next_token: ChangeToken::new(next_token),
        has_more,
        token_expired: false,
    })
}

pub fn expired(token: &str) -> Result<ChangesResponse> {
    Ok(ChangesResponse::expired(ChangeToken::new(token)))
}

pub const RUN_APP: &str = "com.example.run";
pub const PEDOMETER: &str = "com.example.pedometer";

/// 2024-03-05 at `hour:minute` in UTC+9, as a UTC instant.
pub fn kst(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap() + Duration::hours(hour as i64 - 9)
        + Duration::minutes(minute as i64)
}

pub fn plus_nine() -> Option<ZoneOffset> {
    ZoneOffset::from_hours(9)
}

pub fn record(
    id: &str,
    origin: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    payload: RecordPayload,
) -> Record {
    Record {
        id: id.to_string(),
        origin: DataOrigin::new(origin),
        start,
        end,
        start_offset: plus_nine(),
        end_offset: plus_nine(),
        payload,
    }
}

pub fn session(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Record {
    record(
        id,
        RUN_APP,
        start,
        end,
        RecordPayload::ExerciseSession {
            exercise_type: ExerciseType::Running,
            title: Some("Morning run".to_string()),
        },
    )
}

pub fn steps(id: &str, origin: &str, start: DateTime<Utc>, end: DateTime<Utc>, count: u64) -> Record {
    record(id, origin, start, end, RecordPayload::Steps { count })
}

pub fn heart_rate(id: &str, origin: &str, samples: &[(DateTime<Utc>, f64)]) -> Record {
    let start = samples.iter().map(|s| s.0).min().unwrap_or_else(|| kst(8, 0));
    let end = samples.iter().map(|s| s.0).max().unwrap_or(start);
    record(
        id,
        origin,
        start,
        end,
        RecordPayload::HeartRate {
            samples: samples
                .iter()
                .map(|(time, value)| SeriesSample::new(*time, *value))
                .collect(),
        },
    )
}
