//! SQLite-backed ticket ledger.
//!
//! The database lives at `~/.frontdesk/frontdesk.db`. One table, keyed by
//! correlation key; the PRIMARY KEY constraint is what makes `append_row`
//! an atomic insert-if-absent, so two concurrent submissions for the same
//! source message cannot both create a row. Recipients are stored as a
//! JSON column.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::LedgerError;
use crate::ledger::{LedgerStore, TicketPatch};
use crate::types::{OnCallIdentity, TicketRecord};

const TICKET_COLUMNS: &str = "correlation_key, submitter, created_at, recipients,
             team, summary, message_link, first_reply_at";

pub struct TicketDb {
    // The rusqlite connection is not Sync; the ledger trait is shared
    // across tasks, so all access goes through one lock.
    conn: Mutex<Connection>,
}

impl TicketDb {
    /// Open (or create) the database at `~/.frontdesk/frontdesk.db` and
    /// apply the schema.
    pub fn open() -> Result<Self, LedgerError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open (or create) a database at an explicit path. Used by tests and
    /// by deployments that keep the ledger somewhere else.
    pub fn open_at(path: PathBuf) -> Result<Self, LedgerError> {
        let conn = Connection::open(&path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn db_path() -> Result<PathBuf, LedgerError> {
        let home = dirs::home_dir().ok_or(LedgerError::HomeDirNotFound)?;
        let dir = home.join(".frontdesk");
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| LedgerError::CreateDir(dir.clone(), e))?;
        }
        Ok(dir.join("frontdesk.db"))
    }

    fn init_schema(&self) -> Result<(), LedgerError> {
        self.conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS tickets (
                correlation_key TEXT PRIMARY KEY,
                submitter       TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                recipients      TEXT NOT NULL,
                team            TEXT NOT NULL,
                summary         TEXT NOT NULL,
                message_link    TEXT NOT NULL,
                first_reply_at  TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tickets_first_reply
                ON tickets(first_reply_at);",
        )?;
        Ok(())
    }
}

/// Intermediate row shape: recipients come out of SQLite as raw JSON and
/// are decoded after the statement completes, keeping serde errors out of
/// the rusqlite row-mapping closure.
struct RawTicketRow {
    correlation_key: String,
    submitter: String,
    created_at: String,
    recipients_json: String,
    team: String,
    summary: String,
    message_link: String,
    first_reply_at: Option<String>,
}

fn map_raw_row(row: &rusqlite::Row) -> rusqlite::Result<RawTicketRow> {
    Ok(RawTicketRow {
        correlation_key: row.get(0)?,
        submitter: row.get(1)?,
        created_at: row.get(2)?,
        recipients_json: row.get(3)?,
        team: row.get(4)?,
        summary: row.get(5)?,
        message_link: row.get(6)?,
        first_reply_at: row.get(7)?,
    })
}

fn decode_row(raw: RawTicketRow) -> Result<TicketRecord, LedgerError> {
    let recipients: Vec<OnCallIdentity> = serde_json::from_str(&raw.recipients_json)?;
    Ok(TicketRecord {
        correlation_key: raw.correlation_key,
        submitter: raw.submitter,
        created_at: raw.created_at,
        recipients,
        team: raw.team,
        summary: raw.summary,
        message_link: raw.message_link,
        first_reply_at: raw.first_reply_at,
    })
}

#[async_trait]
impl LedgerStore for TicketDb {
    async fn append_row(&self, row: TicketRecord) -> Result<(), LedgerError> {
        let recipients_json = serde_json::to_string(&row.recipients)?;
        let conn = self.conn.lock();

        let result = conn.execute(
            "INSERT INTO tickets (correlation_key, submitter, created_at, recipients,
                                  team, summary, message_link, first_reply_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.correlation_key,
                row.submitter,
                row.created_at,
                recipients_json,
                row.team,
                row.summary,
                row.message_link,
                row.first_reply_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::DuplicateKey(row.correlation_key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<TicketRecord>, LedgerError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE correlation_key = ?1"
        ))?;

        let mut rows = stmt.query_map(params![key], map_raw_row)?;
        match rows.next() {
            Some(raw) => Ok(Some(decode_row(raw?)?)),
            None => Ok(None),
        }
    }

    async fn update_row(&self, key: &str, patch: TicketPatch) -> Result<(), LedgerError> {
        let Some(replied_at) = patch.first_reply_at else {
            return Ok(());
        };

        self.conn.lock().execute(
            "UPDATE tickets SET first_reply_at = ?2 WHERE correlation_key = ?1",
            params![key, replied_at],
        )?;
        Ok(())
    }

    async fn find_unanswered(&self) -> Result<Vec<TicketRecord>, LedgerError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets
             WHERE first_reply_at IS NULL
             ORDER BY created_at ASC"
        ))?;

        let raw_rows = stmt.query_map([], map_raw_row)?;
        let mut tickets = Vec::new();
        for raw in raw_rows {
            tickets.push(decode_row(raw?)?);
        }
        Ok(tickets)
    }
}
