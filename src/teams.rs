//! Config-backed team directory.
//!
//! Deployments list their teams in `config.json`; the roster serves those
//! records verbatim. Anything implementing [`TeamDirectory`] (a database,
//! a spreadsheet sync, an HR system) can stand in for it without the
//! resolver noticing.

use async_trait::async_trait;

use crate::error::RoutingError;
use crate::routing::TeamDirectory;
use crate::types::TeamRecord;

#[derive(Debug, Clone, Default)]
pub struct TeamRoster {
    teams: Vec<TeamRecord>,
}

impl TeamRoster {
    pub fn new(teams: Vec<TeamRecord>) -> Self {
        Self { teams }
    }

    pub fn teams(&self) -> &[TeamRecord] {
        &self.teams
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

#[async_trait]
impl TeamDirectory for TeamRoster {
    async fn team_by_id(&self, team_id: &str) -> Result<TeamRecord, RoutingError> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .cloned()
            .ok_or_else(|| RoutingError::TeamNotFound(team_id.to_string()))
    }
}
