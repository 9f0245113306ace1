use std::fmt;

use serde::{Deserialize, Serialize};

use crate::records::Record;

/// Opaque continuation handle into the platform's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(String);

impl ChangeToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// Record inserted or updated; carries the record as of the change.
    Upsert(Record),
    Deletion { record_id: String },
}

impl Change {
    pub fn record_id(&self) -> &str {
        match self {
            Change::Upsert(record) => &record.id,
            Change::Deletion { record_id } => record_id,
        }
    }
}

/// One page of the change feed as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub changes: Vec<Change>,
    pub next_token: ChangeToken,
    pub has_more: bool,
    pub token_expired: bool,
}

impl ChangesResponse {
    /// Response for a token the store no longer honours.
    pub fn expired(token: ChangeToken) -> Self {
        Self {
            changes: Vec::new(),
            next_token: token,
            has_more: false,
            token_expired: true,
        }
    }
}

/// Message produced for the caller while polling the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMessage {
    ChangeList(Vec<Change>),
    /// Last message of a poll cycle; the token to persist for the next one.
    NoMoreChanges(ChangeToken),
}
