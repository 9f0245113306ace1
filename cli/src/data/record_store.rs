//! SQLite-backed record store.
//!
//! Plays the part of the health platform for the CLI: it keeps records, a
//! change log and the change tokens handed out to clients. Uses WAL mode so a
//! long-running sync and ad-hoc queries can share the file.
//!
//! Tokens read `st-<store id>-<row id>-<last seq>`. The store id is generated
//! once per database, so a token never resolves against another database.
//! Polling a token retires the token it was issued from; the change log is
//! trimmed below the oldest position a live token can still ask for.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use stride_platform::{aggregate_records, RecordStore, StoreError};
use stride_protocol::{
    AggregateResult, Change, ChangeToken, ChangesResponse, MetricKey, Record, RecordType,
    SessionRecord, TimeWindow,
};
use tracing::{debug, info};
use uuid::Uuid;

const CURRENT_SCHEMA_VERSION: i32 = 2;
const DEFAULT_PAGE_SIZE: usize = 100;
const TOKEN_PREFIX: &str = "st";

/// Errors that can occur inside the SQLite store
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RecordStoreError> for StoreError {
    fn from(err: RecordStoreError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecordStoreError>;

struct TokenRow {
    id: i64,
    watched: String,
    last_seq: i64,
    issued_at: i64,
    parent_id: Option<i64>,
}

pub struct SqliteRecordStore {
    conn: Connection,
    path: PathBuf,
    store_id: String,
    page_size: usize,
    token_ttl: Option<Duration>,
}

impl SqliteRecordStore {
    /// Open or create the record database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::from_connection(conn, path.to_path_buf())
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        let mut store = Self {
            conn,
            path,
            store_id: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            token_ttl: None,
        };
        store.initialize_schema()?;
        store.store_id = store
            .conn
            .query_row("SELECT store_id FROM store_info LIMIT 1", [], |row| row.get(0))?;
        Ok(store)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Tokens unused for longer than `days` are reported expired. 0 disables expiry.
    pub fn with_token_ttl_days(mut self, days: u32) -> Self {
        self.token_ttl = (days > 0).then(|| Duration::days(days as i64));
        self
    }

    pub fn record_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
    }

    fn initialize_schema(&mut self) -> Result<()> {
        let version = self.get_schema_version()?;

        if version == 0 {
            self.create_initial_schema()?;
        } else if version < CURRENT_SCHEMA_VERSION {
            self.run_migrations(version)?;
        }

        Ok(())
    }

    fn get_schema_version(&self) -> Result<i32> {
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )?;

        if !exists {
            return Ok(0);
        }

        let version: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        Ok(version)
    }

    fn create_initial_schema(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute_batch(
            r#"
            CREATE TABLE schema_version (
                version INTEGER NOT NULL
            );

            CREATE TABLE store_info (
                store_id TEXT NOT NULL
            );

            -- Current state; body is the full record as JSON
            CREATE TABLE records (
                id TEXT PRIMARY KEY,
                record_type TEXT NOT NULL,
                origin TEXT NOT NULL,
                start_ms INTEGER NOT NULL,
                end_ms INTEGER NOT NULL,
                body TEXT NOT NULL
            );

            -- Change log, trimmed below the oldest live token; body is NULL for deletions
            CREATE TABLE changes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id TEXT NOT NULL,
                record_type TEXT NOT NULL,
                body TEXT
            );

            CREATE TABLE change_tokens (
                id INTEGER PRIMARY KEY,
                watched TEXT NOT NULL,
                last_seq INTEGER NOT NULL,
                issued_at INTEGER NOT NULL,
                parent_id INTEGER
            );

            CREATE INDEX idx_records_type_time ON records(record_type, start_ms, end_ms);
            CREATE INDEX idx_changes_type ON changes(record_type, seq);
            "#,
        )?;

        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [CURRENT_SCHEMA_VERSION],
        )?;
        tx.execute(
            "INSERT INTO store_info (store_id) VALUES (?)",
            [new_store_id()],
        )?;

        tx.commit()?;
        info!(path = %self.path.display(), "Created record database");
        Ok(())
    }

    fn run_migrations(&mut self, from_version: i32) -> Result<()> {
        let tx = self.conn.transaction()?;
        debug!(from_version, to_version = CURRENT_SCHEMA_VERSION, "Migrating record database");

        // Version 1 tokens carry no store id and stop resolving after this.
        if from_version < 2 {
            tx.execute_batch(
                r#"
                ALTER TABLE change_tokens ADD COLUMN parent_id INTEGER;
                CREATE TABLE store_info (
                    store_id TEXT NOT NULL
                );
                "#,
            )?;
            tx.execute(
                "INSERT INTO store_info (store_id) VALUES (?)",
                [new_store_id()],
            )?;
        }

        tx.execute(
            "UPDATE schema_version SET version = ?",
            [CURRENT_SCHEMA_VERSION],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn records_in_window(&self, types: &[RecordType], window: &TimeWindow) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM records
             WHERE record_type IN (SELECT value FROM json_each(?1))
               AND start_ms <= ?2 AND end_ms >= ?3
             ORDER BY start_ms ASC, id ASC",
        )?;

        let bodies = stmt
            .query_map(
                params![
                    serde_json::to_string(types)?,
                    window.end().timestamp_millis(),
                    window.start().timestamp_millis(),
                ],
                |row| row.get::<_, String>(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(bodies.len());
        for body in bodies {
            let record: Record = serde_json::from_str(&body)?;
            if window.accepts_origin(&record.origin) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn find_record(&self, id: &str) -> Result<Option<Record>> {
        let body: Option<String> = self
            .conn
            .query_row("SELECT body FROM records WHERE id = ?", [id], |row| row.get(0))
            .optional()?;

        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    /// Highest sequence ever assigned, including rows already trimmed.
    fn latest_seq(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'changes'), 0)",
            [],
            |row| row.get(0),
        )?)
    }

    fn issue_token(&self, watched: &str, last_seq: i64, parent_id: Option<i64>) -> Result<ChangeToken> {
        self.conn.execute(
            "INSERT INTO change_tokens (watched, last_seq, issued_at, parent_id) VALUES (?, ?, ?, ?)",
            params![watched, last_seq, Utc::now().timestamp_millis(), parent_id],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(ChangeToken::new(format!(
            "{}-{}-{}-{}",
            TOKEN_PREFIX, self.store_id, id, last_seq
        )))
    }

    fn find_token(&self, token: &ChangeToken) -> Result<Option<TokenRow>> {
        let Some((store_id, id, encoded_seq)) = parse_token(token) else {
            return Ok(None);
        };
        if store_id != self.store_id {
            debug!(token = %token, "Change token was issued by another database");
            return Ok(None);
        }

        let row = self
            .conn
            .query_row(
                "SELECT id, watched, last_seq, issued_at, parent_id FROM change_tokens WHERE id = ?",
                [id],
                |row| {
                    Ok(TokenRow {
                        id: row.get(0)?,
                        watched: row.get(1)?,
                        last_seq: row.get(2)?,
                        issued_at: row.get(3)?,
                        parent_id: row.get(4)?,
                    })
                },
            )
            .optional()?;

        Ok(row.filter(|r| r.last_seq == encoded_seq))
    }

    /// Drops tokens past their lifetime, then change rows no live token can
    /// still ask for. With no live tokens the whole log goes.
    fn prune(&self, now: DateTime<Utc>) -> Result<()> {
        let expired_tokens = match self.token_ttl {
            Some(ttl) => self.conn.execute(
                "DELETE FROM change_tokens WHERE issued_at < ?",
                [now.timestamp_millis() - ttl.num_milliseconds()],
            )?,
            None => 0,
        };

        let trimmed_changes = self.conn.execute(
            "DELETE FROM changes
             WHERE seq <= COALESCE((SELECT MIN(last_seq) FROM change_tokens), seq)",
            [],
        )?;

        if expired_tokens > 0 || trimmed_changes > 0 {
            debug!(expired_tokens, trimmed_changes, "Pruned change feed");
        }
        Ok(())
    }

    fn is_stale(&self, row: &TokenRow, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.token_ttl else {
            return false;
        };
        now.timestamp_millis() - row.issued_at > ttl.num_milliseconds()
    }

    fn read_changes(&self, token: &ChangeToken) -> Result<ChangesResponse> {
        let Some(row) = self.find_token(token)? else {
            debug!(token = %token, "Unknown change token");
            return Ok(ChangesResponse::expired(token.clone()));
        };
        if self.is_stale(&row, Utc::now()) {
            debug!(token = %token, "Change token past its lifetime");
            return Ok(ChangesResponse::expired(token.clone()));
        }

        let mut stmt = self.conn.prepare(
            "SELECT seq, record_id, body FROM changes
             WHERE seq > ?1 AND record_type IN (SELECT value FROM json_each(?2))
             ORDER BY seq ASC
             LIMIT ?3",
        )?;

        let mut rows = stmt
            .query_map(
                params![row.last_seq, row.watched, (self.page_size + 1) as i64],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, Option<String>>(2)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let has_more = rows.len() > self.page_size;
        rows.truncate(self.page_size);
        let last_seq = rows.last().map(|(seq, _, _)| *seq).unwrap_or(row.last_seq);

        let mut changes = Vec::with_capacity(rows.len());
        for (_, record_id, body) in rows {
            changes.push(match body {
                Some(body) => Change::Upsert(serde_json::from_str(&body)?),
                None => Change::Deletion { record_id },
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        let next_token = self.issue_token(&row.watched, last_seq, Some(row.id))?;
        // Holding the successor proves the parent's page arrived.
        if let Some(parent_id) = row.parent_id {
            tx.execute("DELETE FROM change_tokens WHERE id = ?", [parent_id])?;
        }
        self.prune(Utc::now())?;
        tx.commit()?;

        Ok(ChangesResponse {
            changes,
            next_token,
            has_more,
            token_expired: false,
        })
    }

    fn write_records(&self, records: &[Record]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        for record in records {
            let body = serde_json::to_string(record)?;
            let record_type = record.record_type().as_str();

            tx.execute(
                "INSERT INTO records (id, record_type, origin, start_ms, end_ms, body)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    record_type = excluded.record_type,
                    origin = excluded.origin,
                    start_ms = excluded.start_ms,
                    end_ms = excluded.end_ms,
                    body = excluded.body",
                params![
                    record.id,
                    record_type,
                    record.origin.as_str(),
                    record.start.timestamp_millis(),
                    record.end.timestamp_millis(),
                    body,
                ],
            )?;
            tx.execute(
                "INSERT INTO changes (record_id, record_type, body) VALUES (?, ?, ?)",
                params![record.id, record_type, body],
            )?;
        }

        tx.commit()?;
        Ok(records.len())
    }

    fn remove_records(&self, ids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;

        for id in ids {
            let record_type: Option<String> = tx
                .query_row("SELECT record_type FROM records WHERE id = ?", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(record_type) = record_type else {
                continue;
            };

            tx.execute("DELETE FROM records WHERE id = ?", [id])?;
            tx.execute(
                "INSERT INTO changes (record_id, record_type, body) VALUES (?, ?, NULL)",
                params![id, record_type],
            )?;
            deleted += 1;
        }

        tx.commit()?;
        Ok(deleted)
    }
}

fn new_store_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn parse_token(token: &ChangeToken) -> Option<(&str, i64, i64)> {
    let mut parts = token.as_str().splitn(4, '-');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let store_id = parts.next()?;
    let id = parts.next()?.parse().ok()?;
    let seq = parts.next()?.parse().ok()?;
    Some((store_id, id, seq))
}

impl RecordStore for SqliteRecordStore {
    fn read_window(
        &self,
        record_type: RecordType,
        window: &TimeWindow,
    ) -> stride_platform::Result<Vec<Record>> {
        Ok(self.records_in_window(&[record_type], window)?)
    }

    fn aggregate(
        &self,
        metrics: &BTreeSet<MetricKey>,
        window: &TimeWindow,
    ) -> stride_platform::Result<AggregateResult> {
        let types: Vec<RecordType> = metrics
            .iter()
            .map(|m| m.record_type())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let records = self.records_in_window(&types, window)?;
        Ok(aggregate_records(metrics, window, &records))
    }

    fn get_change_token(
        &self,
        watched: &BTreeSet<RecordType>,
    ) -> stride_platform::Result<ChangeToken> {
        let watched = serde_json::to_string(watched).map_err(RecordStoreError::from)?;
        let last_seq = self.latest_seq()?;
        let token = self.issue_token(&watched, last_seq, None)?;
        self.prune(Utc::now())?;
        Ok(token)
    }

    fn poll_changes(&self, token: &ChangeToken) -> stride_platform::Result<ChangesResponse> {
        Ok(self.read_changes(token)?)
    }

    fn resolve_session(&self, session_id: &str) -> stride_platform::Result<SessionRecord> {
        self.find_record(session_id)?
            .as_ref()
            .and_then(SessionRecord::from_record)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
    }

    fn insert_records(&self, records: &[Record]) -> stride_platform::Result<usize> {
        for record in records {
            record
                .validate()
                .map_err(|reason| StoreError::InvalidRecord(format!("{}: {}", record.id, reason)))?;
        }
        let written = self.write_records(records)?;
        debug!(written, "Inserted records");
        Ok(written)
    }

    fn delete_records(&self, ids: &[String]) -> stride_platform::Result<usize> {
        let deleted = self.remove_records(ids)?;
        debug!(requested = ids.len(), deleted, "Deleted records");
        Ok(deleted)
    }
}
