//! On-call resolution.
//!
//! Routing tries three sources in strict priority order and takes the
//! first that produces an identity:
//!
//! 1. Channel topic: the fastest and most locally overridable source; a
//!    channel owner can hand-edit the topic to reroute.
//! 2. On-call schedule: the automated ground truth. The schedule gives an
//!    email, the identity directory gives the platform user for it.
//! 3. The team's static fallback group, the always-available last resort.
//!
//! A failure or empty result from one source never aborts the later ones.
//! The only fatal condition is the team lookup itself: without a team
//! record there is nothing to route to. Resolution always terminates with
//! an identity or `Unresolved`, never with an error from an optional
//! source.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::ClientError;
use crate::error::RoutingError;
use crate::topic;
use crate::types::{OnCallIdentity, PlatformUserRef, TeamRecord};

/// Bound on each optional routing source call. A source that hangs past
/// this counts as a failed step, not a hung resolution.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Collaborator interfaces
// ============================================================================

#[async_trait]
pub trait TopicSource: Send + Sync {
    /// Current topic of a channel. Empty string when none is set.
    async fn channel_topic(&self, channel: &str) -> Result<String, ClientError>;
}

#[async_trait]
pub trait ScheduleService: Send + Sync {
    /// Email of the person currently on call for a schedule, if anyone is.
    async fn oncall_email(&self, schedule_ref: &str) -> Result<Option<String>, ClientError>;
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Platform identity registered for an email address, if any.
    async fn user_by_email(&self, email: &str) -> Result<Option<PlatformUserRef>, ClientError>;
}

#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Team record by id. Absence is [`RoutingError::TeamNotFound`].
    async fn team_by_id(&self, team_id: &str) -> Result<TeamRecord, RoutingError>;
}

// ============================================================================
// Resolver
// ============================================================================

pub struct OnCallResolver {
    teams: Arc<dyn TeamDirectory>,
    topics: Arc<dyn TopicSource>,
    schedules: Arc<dyn ScheduleService>,
    identities: Arc<dyn IdentityDirectory>,
    support_channel: String,
    step_timeout: Duration,
}

impl OnCallResolver {
    pub fn new(
        teams: Arc<dyn TeamDirectory>,
        topics: Arc<dyn TopicSource>,
        schedules: Arc<dyn ScheduleService>,
        identities: Arc<dyn IdentityDirectory>,
        support_channel: impl Into<String>,
    ) -> Self {
        Self {
            teams,
            topics,
            schedules,
            identities,
            support_channel: support_channel.into(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Resolve the current on-call identity for a team.
    ///
    /// Sources are evaluated left-to-right, first non-empty result wins;
    /// adding a source is one more step method and one more line here.
    pub async fn resolve(&self, team_id: &str) -> Result<OnCallIdentity, RoutingError> {
        let team = self.teams.team_by_id(team_id).await?;

        if let Some(identity) = self.from_channel_topic(&team).await {
            log::info!("On-call for {} taken from channel topic", team.title);
            return Ok(identity);
        }

        if let Some(identity) = self.from_schedule(&team).await {
            log::info!("On-call for {} taken from schedule", team.title);
            return Ok(identity);
        }

        if let Some(identity) = self.from_fallback_group(&team) {
            log::info!("On-call for {} falls back to the team group", team.title);
            return Ok(identity);
        }

        log::warn!("No on-call identity could be determined for {}", team.title);
        Ok(OnCallIdentity::Unresolved)
    }

    /// Run one optional source call: bound it by the step timeout and
    /// absorb failure into `None` so later sources still get their turn.
    async fn step<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.step_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                log::warn!("{} failed: {}", what, e);
                None
            }
            Err(_) => {
                log::warn!("{} timed out after {:?}", what, self.step_timeout);
                None
            }
        }
    }

    // The topic is fetched and parsed fresh on every resolution; a cached
    // table would silently misroute after a topic edit.
    async fn from_channel_topic(&self, team: &TeamRecord) -> Option<OnCallIdentity> {
        let topic_text = self
            .step(
                "Channel topic fetch",
                self.topics.channel_topic(&self.support_channel),
            )
            .await?;

        let table = topic::parse(&topic_text)?;
        let user = table.get(&team.title.to_lowercase())?;
        Some(OnCallIdentity::PlatformUser {
            id: user.id.clone(),
        })
    }

    async fn from_schedule(&self, team: &TeamRecord) -> Option<OnCallIdentity> {
        let schedule_ref = team.schedule_ref.as_deref().filter(|s| !s.is_empty())?;

        let email = self
            .step(
                "Schedule lookup",
                self.schedules.oncall_email(schedule_ref),
            )
            .await??;

        let user = self
            .step("Directory lookup", self.identities.user_by_email(&email))
            .await??;

        Some(OnCallIdentity::PlatformUser { id: user.id })
    }

    fn from_fallback_group(&self, team: &TeamRecord) -> Option<OnCallIdentity> {
        let group = team.fallback_group.as_deref().filter(|g| !g.is_empty())?;
        Some(OnCallIdentity::GroupMention {
            id: group.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::teams::TeamRoster;

    // ------------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeTopicSource {
        topic: Option<String>, // None simulates a failing source
        hang: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TopicSource for FakeTopicSource {
        async fn channel_topic(&self, _channel: &str) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            match &self.topic {
                Some(t) => Ok(t.clone()),
                None => Err(ClientError::Api {
                    status: 503,
                    message: "service unavailable".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct FakeSchedule {
        email: Option<String>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScheduleService for FakeSchedule {
        async fn oncall_email(&self, _schedule_ref: &str) -> Result<Option<String>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(self.email.clone())
        }
    }

    #[derive(Default)]
    struct FakeDirectory {
        user: Option<PlatformUserRef>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityDirectory for FakeDirectory {
        async fn user_by_email(
            &self,
            _email: &str,
        ) -> Result<Option<PlatformUserRef>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.user.clone())
        }
    }

    // ------------------------------------------------------------------------
    // Harness
    // ------------------------------------------------------------------------

    fn platform_team() -> TeamRecord {
        TeamRecord {
            id: "platform".to_string(),
            title: "Platform".to_string(),
            schedule_ref: Some("PX7F2R4".to_string()),
            fallback_group: Some("S0614TZR7".to_string()),
        }
    }

    struct Harness {
        topics: Arc<FakeTopicSource>,
        schedules: Arc<FakeSchedule>,
        identities: Arc<FakeDirectory>,
        resolver: OnCallResolver,
    }

    fn harness(
        team: TeamRecord,
        topics: FakeTopicSource,
        schedules: FakeSchedule,
        identities: FakeDirectory,
    ) -> Harness {
        let topics = Arc::new(topics);
        let schedules = Arc::new(schedules);
        let identities = Arc::new(identities);
        let resolver = OnCallResolver::new(
            Arc::new(TeamRoster::new(vec![team])),
            topics.clone(),
            schedules.clone(),
            identities.clone(),
            "C_SUPPORT",
        );
        Harness {
            topics,
            schedules,
            identities,
            resolver,
        }
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_topic_entry_short_circuits() {
        let h = harness(
            platform_team(),
            FakeTopicSource {
                topic: Some("platform: @alice".to_string()),
                ..Default::default()
            },
            FakeSchedule::default(),
            FakeDirectory::default(),
        );

        let identity = h.resolver.resolve("platform").await.unwrap();
        assert_eq!(
            identity,
            OnCallIdentity::PlatformUser {
                id: "alice".to_string()
            }
        );
        assert_eq!(h.schedules.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.identities.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schedule_called_once_on_topic_miss() {
        let h = harness(
            platform_team(),
            FakeTopicSource {
                topic: Some("infra: @bob".to_string()),
                ..Default::default()
            },
            FakeSchedule {
                email: Some("alice@example.com".to_string()),
                ..Default::default()
            },
            FakeDirectory {
                user: Some(PlatformUserRef::new("U024BE7LH")),
                ..Default::default()
            },
        );

        let identity = h.resolver.resolve("platform").await.unwrap();
        assert_eq!(
            identity,
            OnCallIdentity::PlatformUser {
                id: "U024BE7LH".to_string()
            }
        );
        assert_eq!(h.schedules.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_email_without_directory_user_falls_to_group() {
        let h = harness(
            platform_team(),
            FakeTopicSource {
                topic: Some(String::new()),
                ..Default::default()
            },
            FakeSchedule {
                email: Some("ghost@example.com".to_string()),
                ..Default::default()
            },
            FakeDirectory::default(),
        );

        let identity = h.resolver.resolve("platform").await.unwrap();
        assert_eq!(
            identity,
            OnCallIdentity::GroupMention {
                id: "S0614TZR7".to_string()
            }
        );
        assert_eq!(h.identities.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_schedule_falls_to_group() {
        let h = harness(
            platform_team(),
            FakeTopicSource {
                topic: Some(String::new()),
                ..Default::default()
            },
            FakeSchedule::default(),
            FakeDirectory::default(),
        );

        let identity = h.resolver.resolve("platform").await.unwrap();
        assert_eq!(
            identity,
            OnCallIdentity::GroupMention {
                id: "S0614TZR7".to_string()
            }
        );
        // No email means the directory is never consulted.
        assert_eq!(h.identities.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_sources_empty_is_unresolved() {
        let team = TeamRecord {
            id: "data".to_string(),
            title: "Data".to_string(),
            schedule_ref: None,
            fallback_group: None,
        };
        let h = harness(
            team,
            FakeTopicSource {
                topic: Some(String::new()),
                ..Default::default()
            },
            FakeSchedule::default(),
            FakeDirectory::default(),
        );

        let identity = h.resolver.resolve("data").await.unwrap();
        assert_eq!(identity, OnCallIdentity::Unresolved);
        // No schedule ref means the schedule service is never called.
        assert_eq!(h.schedules.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_fallback_group_is_unresolved() {
        let team = TeamRecord {
            id: "data".to_string(),
            title: "Data".to_string(),
            schedule_ref: None,
            fallback_group: Some(String::new()),
        };
        let h = harness(
            team,
            FakeTopicSource {
                topic: Some(String::new()),
                ..Default::default()
            },
            FakeSchedule::default(),
            FakeDirectory::default(),
        );

        assert_eq!(
            h.resolver.resolve("data").await.unwrap(),
            OnCallIdentity::Unresolved
        );
    }

    #[tokio::test]
    async fn test_unknown_team_is_fatal() {
        let h = harness(
            platform_team(),
            FakeTopicSource::default(),
            FakeSchedule::default(),
            FakeDirectory::default(),
        );

        let err = h.resolver.resolve("nonexistent").await.unwrap_err();
        assert!(matches!(err, RoutingError::TeamNotFound(_)));
        // The team lookup is a precondition; no source is consulted.
        assert_eq!(h.topics.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_topic_source_does_not_abort_resolution() {
        let h = harness(
            platform_team(),
            FakeTopicSource {
                topic: None, // fails with a 503
                ..Default::default()
            },
            FakeSchedule {
                email: Some("alice@example.com".to_string()),
                ..Default::default()
            },
            FakeDirectory {
                user: Some(PlatformUserRef::new("U024BE7LH")),
                ..Default::default()
            },
        );

        let identity = h.resolver.resolve("platform").await.unwrap();
        assert_eq!(
            identity,
            OnCallIdentity::PlatformUser {
                id: "U024BE7LH".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failing_schedule_falls_to_group() {
        let h = harness(
            platform_team(),
            FakeTopicSource {
                topic: Some(String::new()),
                ..Default::default()
            },
            FakeSchedule {
                fail: true,
                ..Default::default()
            },
            FakeDirectory::default(),
        );

        assert_eq!(
            h.resolver.resolve("platform").await.unwrap(),
            OnCallIdentity::GroupMention {
                id: "S0614TZR7".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_hanging_source_is_bounded_by_step_timeout() {
        let topics = Arc::new(FakeTopicSource {
            hang: true,
            ..Default::default()
        });
        let resolver = OnCallResolver::new(
            Arc::new(TeamRoster::new(vec![platform_team()])),
            topics,
            Arc::new(FakeSchedule::default()),
            Arc::new(FakeDirectory::default()),
            "C_SUPPORT",
        )
        .with_step_timeout(Duration::from_millis(20));

        // The hung topic fetch times out and resolution proceeds to the
        // fallback group instead of hanging.
        let identity = resolver.resolve("platform").await.unwrap();
        assert_eq!(
            identity,
            OnCallIdentity::GroupMention {
                id: "S0614TZR7".to_string()
            }
        );
    }
}
