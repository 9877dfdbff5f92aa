//! Frontdesk — support routing core for team chat.
//!
//! Two pieces do the real work: the on-call resolver, which turns a team
//! id into the identity to notify (channel topic override, then the
//! on-call schedule, then the team's fallback group), and the ticket
//! correlator, which keys every posted support request into a persisted
//! ledger so unanswered requests can be found later. Everything external
//! (chat platform, schedule service, ledger storage) sits behind a
//! trait and is injected.

pub mod clients;
pub mod config;
pub mod correlate;
pub mod db;
pub mod error;
pub mod ledger;
pub mod routing;
pub mod teams;
pub mod topic;
pub mod types;

pub use correlate::{derive_key, TicketCorrelator};
pub use error::{LedgerError, RoutingError};
pub use routing::OnCallResolver;
pub use types::{OnCallIdentity, PlatformUserRef, TeamRecord, TicketRecord};
