use std::collections::BTreeSet;

use color_eyre::eyre::Result;
use serde_json::json;
use stride_engine::{poll, EngineError};
use stride_platform::RecordStore;
use stride_protocol::{Change, ChangeMessage, ChangeToken, RecordType};
use tracing::{info, warn};

use crate::config::UserConfig;
use crate::data::TokenFile;

/// Result of one sync run.
#[derive(Debug)]
pub enum SyncOutcome {
    /// First run against this database; nothing to report yet.
    Subscribed(ChangeToken),
    Synced {
        changes: Vec<Change>,
        next_token: ChangeToken,
    },
    /// The saved token was rejected and a new one issued. Changes in between are lost.
    Resubscribed(ChangeToken),
}

pub fn run<S: RecordStore + ?Sized>(
    store: &S,
    config: &UserConfig,
    token_file: &TokenFile,
    reset: bool,
    json: bool,
) -> Result<()> {
    let watched = config.sync.watched();
    let outcome = sync(store, &watched, token_file, reset)?;

    if json {
        let (changes, next_token, expired) = match &outcome {
            SyncOutcome::Subscribed(token) => (&[][..], token, false),
            SyncOutcome::Synced {
                changes,
                next_token,
            } => (changes.as_slice(), next_token, false),
            SyncOutcome::Resubscribed(token) => (&[][..], token, true),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "token_expired": expired,
                "next_token": next_token,
                "changes": changes,
            }))?
        );
        return Ok(());
    }

    match outcome {
        SyncOutcome::Subscribed(_) => {
            println!("Subscribed to changes for: {}", watched_list(&watched));
        }
        SyncOutcome::Synced { changes, .. } => print_changes(&changes),
        SyncOutcome::Resubscribed(_) => {
            eprintln!("The saved change token has expired.");
            eprintln!("Changes made since the last sync were not delivered; a full re-read is needed.");
            println!("Subscribed again from now.");
        }
    }

    Ok(())
}

/// Pulls every pending change. The token file is updated after each page, so
/// an interrupted run resumes from the last page it received.
pub fn sync<S: RecordStore + ?Sized>(
    store: &S,
    watched: &BTreeSet<RecordType>,
    token_file: &TokenFile,
    reset: bool,
) -> Result<SyncOutcome> {
    if reset {
        token_file.clear()?;
        info!(path = %token_file.path().display(), "Cleared saved change token");
    }

    let Some(token) = token_file.load()? else {
        let token = subscribe(store, watched, token_file)?;
        return Ok(SyncOutcome::Subscribed(token));
    };

    let mut cursor = poll(store, token);
    let mut changes = Vec::new();
    while let Some(message) = cursor.next() {
        match message {
            Ok(ChangeMessage::ChangeList(page)) => {
                token_file.save(cursor.current_token())?;
                changes.extend(page);
            }
            Ok(ChangeMessage::NoMoreChanges(next_token)) => {
                info!(changes = changes.len(), "Sync complete");
                return Ok(SyncOutcome::Synced {
                    changes,
                    next_token,
                });
            }
            Err(EngineError::TokenExpired) => {
                warn!("Saved change token expired, subscribing again");
                let token = subscribe(store, watched, token_file)?;
                return Ok(SyncOutcome::Resubscribed(token));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(EngineError::Unavailable("change feed ended without a final token".to_string()).into())
}

fn subscribe<S: RecordStore + ?Sized>(
    store: &S,
    watched: &BTreeSet<RecordType>,
    token_file: &TokenFile,
) -> Result<ChangeToken> {
    let token = store.get_change_token(watched)?;
    token_file.save(&token)?;
    Ok(token)
}

fn watched_list(watched: &BTreeSet<RecordType>) -> String {
    watched
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_changes(changes: &[Change]) {
    if changes.is_empty() {
        println!("No new changes.");
        return;
    }

    for change in changes {
        println!("{}", describe(change));
    }
    println!();
    println!("{} change(s)", changes.len());
}

fn describe(change: &Change) -> String {
    match change {
        Change::Upsert(record) => format!(
            "+ {:<22} {}  {}",
            record.record_type().as_str(),
            record.start.format("%Y-%m-%d %H:%M"),
            record.id
        ),
        Change::Deletion { record_id } => format!("- {:<22} {}", "deleted", record_id),
    }
}
