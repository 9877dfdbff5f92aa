//! Ticket ledger store: the trait the correlator writes through, plus an
//! in-memory implementation.
//!
//! The ledger is an arena of rows indexed by correlation key. The only
//! semantics the correlator needs from a backing store are atomic
//! insert-if-absent and point lookup; anything providing those can be a
//! ledger (see [`crate::db::TicketDb`] for the SQLite one).

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LedgerError;
use crate::types::TicketRecord;

/// A partial update to a ledger row. Only fields that are `Some` are
/// applied; everything else is left untouched.
#[derive(Debug, Clone, Default)]
pub struct TicketPatch {
    pub first_reply_at: Option<String>,
}

/// Persistence operations for ticket records.
///
/// No component other than the correlator (and the CLI's read-only
/// views) should write through this.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a new row. Insert-if-absent: fails with
    /// [`LedgerError::DuplicateKey`] when a row for this correlation key
    /// already exists, and the existing row is left unchanged.
    async fn append_row(&self, row: TicketRecord) -> Result<(), LedgerError>;

    /// Point lookup by correlation key.
    async fn find_by_key(&self, key: &str) -> Result<Option<TicketRecord>, LedgerError>;

    /// Apply a patch to the row for `key`. Unknown keys are a no-op.
    async fn update_row(&self, key: &str, patch: TicketPatch) -> Result<(), LedgerError>;

    /// Rows that never received a reply, oldest first.
    async fn find_unanswered(&self) -> Result<Vec<TicketRecord>, LedgerError>;
}

/// Mutex-guarded key→row map. Backs tests and dev runs where the SQLite
/// ledger is overkill; insert-if-absent holds because every operation
/// runs under the one lock.
#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<HashMap<String, TicketRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn append_row(&self, row: TicketRecord) -> Result<(), LedgerError> {
        let mut rows = self.rows.lock();
        match rows.entry(row.correlation_key.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateKey(row.correlation_key)),
            Entry::Vacant(slot) => {
                slot.insert(row);
                Ok(())
            }
        }
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<TicketRecord>, LedgerError> {
        Ok(self.rows.lock().get(key).cloned())
    }

    async fn update_row(&self, key: &str, patch: TicketPatch) -> Result<(), LedgerError> {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get_mut(key) {
            if let Some(replied_at) = patch.first_reply_at {
                row.first_reply_at = Some(replied_at);
            }
        }
        Ok(())
    }

    async fn find_unanswered(&self) -> Result<Vec<TicketRecord>, LedgerError> {
        let rows = self.rows.lock();
        let mut open: Vec<TicketRecord> = rows
            .values()
            .filter(|r| r.first_reply_at.is_none())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }
}
