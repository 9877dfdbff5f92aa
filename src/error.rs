//! Error types for routing and ledger operations.
//!
//! Only two conditions are fatal to their caller: a failed team lookup
//! (no identity can be computed without a team record) and a duplicate
//! correlation key (signals double-posting upstream). Everything else is
//! absorbed where it happens: optional routing sources log and yield
//! nothing, and a reply for an unknown key is silence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from an on-call resolution call.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The team directory has no record for the requested id.
    #[error("Team not found: {0}")]
    TeamNotFound(String),

    /// The team directory itself could not be reached. Distinct from
    /// `TeamNotFound` so callers can tell "no such team" from
    /// "directory down"; both are fatal because the team record is a
    /// precondition for every later routing step.
    #[error("Team lookup failed: {0}")]
    TeamLookup(String),
}

/// Errors from ticket ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A row for this correlation key already exists. Submission is
    /// expected at most once per source message.
    #[error("Duplicate correlation key: {0}")]
    DuplicateKey(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create ledger directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
}

impl LedgerError {
    /// True when the error is a duplicate-key rejection rather than a
    /// storage failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::DuplicateKey(_))
    }
}
