//! In-process record store.
//!
//! Keeps everything in memory behind a mutex. Used by tests and by callers that
//! want to run the engine over data they already hold.
//!
//! Polling a token retires the token it was issued from, and the change log
//! only keeps entries some live token can still ask for.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use stride_protocol::{
    AggregateResult, Change, ChangeToken, ChangesResponse, MetricKey, Record, RecordType,
    SessionRecord, TimeWindow,
};
use tracing::debug;

use crate::aggregate::aggregate_records;
use crate::error::{Result, StoreError};
use crate::store::RecordStore;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct TokenState {
    watched: BTreeSet<RecordType>,
    last_seq: u64,
    expired: bool,
    parent: Option<String>,
}

#[derive(Debug, Clone)]
struct LoggedChange {
    seq: u64,
    record_type: RecordType,
    change: Change,
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, Record>,
    log: Vec<LoggedChange>,
    tokens: HashMap<String, TokenState>,
    next_seq: u64,
    next_token: u64,
}

impl State {
    fn append(&mut self, record_type: RecordType, change: Change) {
        self.next_seq += 1;
        self.log.push(LoggedChange {
            seq: self.next_seq,
            record_type,
            change,
        });
    }

    fn issue_token(
        &mut self,
        watched: BTreeSet<RecordType>,
        last_seq: u64,
        parent: Option<String>,
    ) -> ChangeToken {
        self.next_token += 1;
        let token = format!("mem-{}-{}", self.next_token, last_seq);
        self.tokens.insert(
            token.clone(),
            TokenState {
                watched,
                last_seq,
                expired: false,
                parent,
            },
        );
        ChangeToken::new(token)
    }

    fn compact_log(&mut self) {
        let oldest = self
            .tokens
            .values()
            .map(|t| t.last_seq)
            .min()
            .unwrap_or(self.next_seq);
        self.log.retain(|c| c.seq > oldest);
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Store pre-filled with `records`. The initial load is not part of the change feed.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for record in records {
                state.records.insert(record.id.clone(), record);
            }
        }
        store
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Marks `token` as expired, as the platform does for stale tokens.
    pub fn expire_token(&self, token: &ChangeToken) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(entry) = state.tokens.get_mut(token.as_str()) {
            entry.expired = true;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn read_window(&self, record_type: RecordType, window: &TimeWindow) -> Result<Vec<Record>> {
        let state = self.lock()?;
        let mut records: Vec<Record> = state
            .records
            .values()
            .filter(|r| {
                r.record_type() == record_type
                    && r.overlaps(window)
                    && window.accepts_origin(&r.origin)
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.start);
        Ok(records)
    }

    fn aggregate(
        &self,
        metrics: &BTreeSet<MetricKey>,
        window: &TimeWindow,
    ) -> Result<AggregateResult> {
        let state = self.lock()?;
        Ok(aggregate_records(metrics, window, state.records.values()))
    }

    fn get_change_token(&self, watched: &BTreeSet<RecordType>) -> Result<ChangeToken> {
        let mut state = self.lock()?;
        let last_seq = state.next_seq;
        Ok(state.issue_token(watched.clone(), last_seq, None))
    }

    fn poll_changes(&self, token: &ChangeToken) -> Result<ChangesResponse> {
        let mut state = self.lock()?;

        let Some(token_state) = state.tokens.get(token.as_str()).cloned() else {
            debug!(token = %token, "Unknown change token");
            return Ok(ChangesResponse::expired(token.clone()));
        };
        if token_state.expired {
            return Ok(ChangesResponse::expired(token.clone()));
        }

        let pending: Vec<&LoggedChange> = state
            .log
            .iter()
            .filter(|c| c.seq > token_state.last_seq && token_state.watched.contains(&c.record_type))
            .collect();

        let has_more = pending.len() > self.page_size;
        let page: Vec<&LoggedChange> = pending.into_iter().take(self.page_size).collect();
        let last_seq = page.last().map(|c| c.seq).unwrap_or(token_state.last_seq);
        let changes: Vec<Change> = page.into_iter().map(|c| c.change.clone()).collect();

        let next_token = state.issue_token(
            token_state.watched,
            last_seq,
            Some(token.as_str().to_string()),
        );
        if let Some(parent) = &token_state.parent {
            state.tokens.remove(parent);
        }
        state.compact_log();

        Ok(ChangesResponse {
            changes,
            next_token,
            has_more,
            token_expired: false,
        })
    }

    fn resolve_session(&self, session_id: &str) -> Result<SessionRecord> {
        let state = self.lock()?;
        state
            .records
            .get(session_id)
            .and_then(SessionRecord::from_record)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
    }

    fn insert_records(&self, records: &[Record]) -> Result<usize> {
        for record in records {
            record.validate().map_err(StoreError::InvalidRecord)?;
        }

        let mut state = self.lock()?;
        for record in records {
            state.records.insert(record.id.clone(), record.clone());
            state.append(record.record_type(), Change::Upsert(record.clone()));
        }
        Ok(records.len())
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        let mut state = self.lock()?;
        let mut deleted = 0;
        for id in ids {
            if let Some(record) = state.records.remove(id) {
                state.append(
                    record.record_type(),
                    Change::Deletion {
                        record_id: id.clone(),
                    },
                );
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
