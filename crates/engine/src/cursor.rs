//! Incremental change polling.
//!
//! A [`ChangeCursor`] walks a store's change feed one page per `next()` call,
//! starting from a previously issued [`ChangeToken`]. It yields a
//! [`ChangeMessage::ChangeList`] for every page and finishes with a single
//! [`ChangeMessage::NoMoreChanges`] carrying the token to persist for the next
//! sync. An expired token ends the sequence with [`EngineError::TokenExpired`].

use stride_platform::RecordStore;
use stride_protocol::{Change, ChangeMessage, ChangeToken};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Polling,
    Draining,
    Done,
}

/// Lazy, pull-based walk over a change feed.
///
/// Each call to `next()` performs at most one store round trip. Dropping the
/// cursor early is fine; [`current_token`](Self::current_token) always holds the
/// last token the store handed back.
pub struct ChangeCursor<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    token: ChangeToken,
    state: CursorState,
    pages: usize,
}

/// Starts polling `store` from `token`.
pub fn poll<S: RecordStore + ?Sized>(store: &S, token: ChangeToken) -> ChangeCursor<'_, S> {
    ChangeCursor::new(store, token)
}

impl<'a, S: RecordStore + ?Sized> ChangeCursor<'a, S> {
    pub fn new(store: &'a S, token: ChangeToken) -> Self {
        Self {
            store,
            token,
            state: CursorState::Polling,
            pages: 0,
        }
    }

    pub fn current_token(&self) -> &ChangeToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.state == CursorState::Done
    }

    /// Consumes the cursor, returning every change in feed order and the final token.
    pub fn drain(self) -> Result<(Vec<Change>, ChangeToken)> {
        let mut changes = Vec::new();
        let mut final_token = None;

        for message in self {
            match message? {
                ChangeMessage::ChangeList(page) => changes.extend(page),
                ChangeMessage::NoMoreChanges(token) => final_token = Some(token),
            }
        }

        final_token
            .map(|token| (changes, token))
            .ok_or_else(|| EngineError::Unavailable("change feed ended without a final token".to_string()))
    }

    fn fetch_page(&mut self) -> Result<ChangeMessage> {
        let response = self.store.poll_changes(&self.token)?;

        if response.token_expired {
            warn!(token = %self.token, "Change token expired, history must be resynced");
            return Err(EngineError::TokenExpired);
        }

        self.pages += 1;
        debug!(
            page = self.pages,
            changes = response.changes.len(),
            has_more = response.has_more,
            "Pulled change page"
        );

        self.token = response.next_token;
        if !response.has_more {
            self.state = CursorState::Draining;
        }
        Ok(ChangeMessage::ChangeList(response.changes))
    }
}

impl<S: RecordStore + ?Sized> Iterator for ChangeCursor<'_, S> {
    type Item = Result<ChangeMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            CursorState::Done => None,
            CursorState::Draining => {
                self.state = CursorState::Done;
                debug!(pages = self.pages, "Change feed exhausted");
                Some(Ok(ChangeMessage::NoMoreChanges(self.token.clone())))
            }
            CursorState::Polling => {
                let message = self.fetch_page();
                if message.is_err() {
                    self.state = CursorState::Done;
                }
                Some(message)
            }
        }
    }
}

impl<S: RecordStore + ?Sized> std::iter::FusedIterator for ChangeCursor<'_, S> {}
