//! On-call schedule service client.
//!
//! PagerDuty-style REST API: `GET /oncalls` filtered by schedule id gives
//! the user currently on call, `GET /users/{id}` gives that user's email.
//! The email is what routing needs: it is the join key into the chat
//! platform's identity directory.

use async_trait::async_trait;
use serde::Deserialize;

use super::{endpoint, send_with_retry, ClientError, RetryPolicy};
use crate::routing::ScheduleService;

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OncallsResponse {
    #[serde(default)]
    oncalls: Vec<RawOncall>,
}

#[derive(Debug, Deserialize)]
struct RawOncall {
    user: Option<RawOncallUser>,
}

#[derive(Debug, Deserialize)]
struct RawOncallUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    email: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct ScheduleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ScheduleClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Email of the person currently on call for `schedule_ref`, or
    /// `Ok(None)` when the schedule has nobody on call right now.
    pub async fn fetch_oncall_email(
        &self,
        schedule_ref: &str,
    ) -> Result<Option<String>, ClientError> {
        let Some(user_id) = self.current_oncall_user(schedule_ref).await? else {
            return Ok(None);
        };

        let url = endpoint(&self.base_url, &format!("users/{}", user_id))?;
        let resp = send_with_retry(self.get(url), &RetryPolicy::default()).await?;
        let body: UserResponse = Self::read_body(resp).await?;

        if let Some(email) = &body.user.email {
            log::debug!(
                "Schedule {} on-call is user {} ({})",
                schedule_ref,
                user_id,
                email
            );
        }
        Ok(body.user.email)
    }

    async fn current_oncall_user(&self, schedule_ref: &str) -> Result<Option<String>, ClientError> {
        let url = endpoint(&self.base_url, "oncalls")?;
        let request = self.get(url).query(&[
            ("schedule_ids[]", schedule_ref),
            ("earliest", "true"),
            ("limit", "1"),
        ]);

        let resp = send_with_retry(request, &RetryPolicy::default()).await?;
        let body: OncallsResponse = Self::read_body(resp).await?;

        Ok(body
            .oncalls
            .into_iter()
            .find_map(|oncall| oncall.user.map(|u| u.id)))
    }

    fn get(&self, url: url::Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token token={}", self.api_key),
            )
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn read_body<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthFailed);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ScheduleService for ScheduleClient {
    async fn oncall_email(&self, schedule_ref: &str) -> Result<Option<String>, ClientError> {
        self.fetch_oncall_email(schedule_ref).await
    }
}
