//! Chat platform Web API client.
//!
//! Covers the two read operations routing needs: the support channel's
//! topic and user lookup by email. The API shape is the Slack Web API:
//! GET methods, bearer token, an `ok`/`error` envelope around every
//! response body.

use async_trait::async_trait;
use serde::Deserialize;

use super::{endpoint, send_with_retry, ClientError, RetryPolicy};
use crate::routing::{IdentityDirectory, TopicSource};
use crate::types::PlatformUserRef;

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChannelInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    channel: Option<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(default)]
    topic: Option<RawTopic>,
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct UserLookupResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    real_name: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Fetch a channel's current topic. Empty string when the channel
    /// has no topic set.
    pub async fn fetch_channel_topic(&self, channel: &str) -> Result<String, ClientError> {
        let url = endpoint(&self.base_url, "conversations.info")?;
        let request = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("channel", channel)]);

        let resp = send_with_retry(request, &RetryPolicy::default()).await?;
        let body: ChannelInfoResponse = Self::read_body(resp).await?;

        if !body.ok {
            return Err(envelope_error(body.error));
        }

        Ok(body
            .channel
            .and_then(|c| c.topic)
            .map(|t| t.value)
            .unwrap_or_default())
    }

    /// Look up a platform user by email. `Ok(None)` when no account is
    /// registered under that address.
    pub async fn fetch_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PlatformUserRef>, ClientError> {
        let url = endpoint(&self.base_url, "users.lookupByEmail")?;
        let request = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("email", email)]);

        let resp = send_with_retry(request, &RetryPolicy::default()).await?;
        let body: UserLookupResponse = Self::read_body(resp).await?;

        if !body.ok {
            if body.error.as_deref() == Some("users_not_found") {
                return Ok(None);
            }
            return Err(envelope_error(body.error));
        }

        Ok(body.user.map(|u| PlatformUserRef {
            id: u.id,
            name: u.real_name,
        }))
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

// The chat API signals application errors with HTTP 200 and ok=false.
fn envelope_error(error: Option<String>) -> ClientError {
    ClientError::Api {
        status: 200,
        message: error.unwrap_or_else(|| "unknown error".to_string()),
    }
}

#[async_trait]
impl TopicSource for ChatClient {
    async fn channel_topic(&self, channel: &str) -> Result<String, ClientError> {
        self.fetch_channel_topic(channel).await
    }
}

#[async_trait]
impl IdentityDirectory for ChatClient {
    async fn user_by_email(&self, email: &str) -> Result<Option<PlatformUserRef>, ClientError> {
        self.fetch_user_by_email(email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_info_parsing() {
        let json = r#"{
            "ok": true,
            "channel": {
                "id": "C012AB3CD",
                "name": "support",
                "topic": {
                    "value": "platform: @alice | infra: @bob",
                    "creator": "U012A3CDE",
                    "last_set": 1609459200
                }
            }
        }"#;

        let body: ChannelInfoResponse = serde_json::from_str(json).unwrap();
        assert!(body.ok);
        let topic = body.channel.and_then(|c| c.topic).unwrap();
        assert_eq!(topic.value, "platform: @alice | infra: @bob");
    }

    #[test]
    fn test_channel_info_without_topic() {
        let json = r#"{ "ok": true, "channel": { "id": "C012AB3CD" } }"#;
        let body: ChannelInfoResponse = serde_json::from_str(json).unwrap();
        assert!(body.channel.unwrap().topic.is_none());
    }

    #[test]
    fn test_error_envelope_parsing() {
        let json = r#"{ "ok": false, "error": "channel_not_found" }"#;
        let body: ChannelInfoResponse = serde_json::from_str(json).unwrap();
        assert!(!body.ok);
        assert_eq!(body.error.as_deref(), Some("channel_not_found"));
    }

    #[test]
    fn test_user_lookup_parsing() {
        let json = r#"{
            "ok": true,
            "user": {
                "id": "U024BE7LH",
                "team_id": "T021F9ZE2",
                "name": "alice",
                "real_name": "Alice Doe"
            }
        }"#;

        let body: UserLookupResponse = serde_json::from_str(json).unwrap();
        let user = body.user.unwrap();
        assert_eq!(user.id, "U024BE7LH");
        assert_eq!(user.real_name.as_deref(), Some("Alice Doe"));
    }

    #[test]
    fn test_users_not_found_envelope() {
        let json = r#"{ "ok": false, "error": "users_not_found" }"#;
        let body: UserLookupResponse = serde_json::from_str(json).unwrap();
        assert!(!body.ok);
        assert_eq!(body.error.as_deref(), Some("users_not_found"));
    }
}
