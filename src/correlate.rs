//! Ticket correlation: stable keys for posted messages, plus lifecycle
//! recording against the ledger.
//!
//! Platform message ids are timestamp-derived and show up in more than one
//! shape (`"1700000000.123456"` in API payloads, `"1700000000123456"` in
//! permalinks). Keys are derived from the separator-stripped id so every
//! shape of the same message lands on the same ledger row, and the digest
//! is salt-free so a reply arriving after a process restart still matches
//! the original submission.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::ledger::{LedgerStore, TicketPatch};
use crate::types::{OnCallIdentity, TicketRecord};

/// Compute the correlation key for a raw platform message id.
///
/// Deterministic, one-way, fixed-length: non-alphanumeric separators are
/// stripped, then the remainder is SHA-256 hashed and hex-encoded.
pub fn derive_key(raw_message_id: &str) -> String {
    let normalized: String = raw_message_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Records ticket submissions and replies in the ledger. The correlator
/// is the only writer; everything else reads.
pub struct TicketCorrelator {
    ledger: Arc<dyn LedgerStore>,
}

impl TicketCorrelator {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Record a newly posted support request.
    ///
    /// Expected at most once per source message; a second call with the
    /// same key fails with [`LedgerError::DuplicateKey`] and leaves the
    /// original row intact.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_submission(
        &self,
        key: &str,
        submitter: &str,
        recipients: &[OnCallIdentity],
        team: &str,
        summary: &str,
        message_link: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let row = TicketRecord {
            correlation_key: key.to_string(),
            submitter: submitter.to_string(),
            created_at: created_at.to_rfc3339(),
            recipients: recipients.to_vec(),
            team: team.to_string(),
            summary: summary.to_string(),
            message_link: message_link.to_string(),
            first_reply_at: None,
        };

        self.ledger.append_row(row).await?;
        log::info!("Recorded support ticket for team {} (key {})", team, key);
        Ok(())
    }

    /// Record a threaded reply to a tracked message.
    ///
    /// Only the first reply timestamp is retained. A reply to a message
    /// the ledger never tracked (e.g. from before deployment) is ignored,
    /// not an error.
    pub async fn record_reply(
        &self,
        key: &str,
        replied_at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let Some(row) = self.ledger.find_by_key(key).await? else {
            log::debug!("Reply for untracked message (key {}), ignoring", key);
            return Ok(());
        };

        if row.first_reply_at.is_some() {
            return Ok(());
        }

        self.ledger
            .update_row(
                key,
                TicketPatch {
                    first_reply_at: Some(replied_at.to_rfc3339()),
                },
            )
            .await?;
        log::info!("First reply recorded for ticket {}", key);
        Ok(())
    }
}
