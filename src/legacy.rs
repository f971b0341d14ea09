//! Client for the browser-session endpoints.
//!
//! Converting a channel between public and private and listing channel
//! managers are not available to bot tokens. These calls are made with a
//! token and `d` cookie lifted from a logged-in browser session, sent as a
//! form-encoded body plus a `Cookie` header.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::slack::api::decode_response;
use crate::slack::types::{ApiEnvelope, RoleAssignmentsResponse};
use crate::slack::SlackApiError;
use crate::visibility::{ConversionOutcome, Visibility};

pub const LIST_ASSIGNMENTS_METHOD: &str = "admin.roles.entity.listAssignments";
pub const CONVERT_TO_PUBLIC_METHOD: &str = "conversations.convertToPublic";
pub const CONVERT_TO_PRIVATE_METHOD: &str = "conversations.convertToPrivate";

/// Operations that need the browser session credentials
#[async_trait]
pub trait VisibilityApi: Send + Sync {
    /// User IDs holding the channel manager role. Empty when the lookup is refused.
    async fn list_channel_managers(&self, channel_id: &str) -> Result<Vec<String>, SlackApiError>;

    async fn convert_to_public(&self, channel_id: &str) -> Result<ConversionOutcome, SlackApiError>;

    async fn convert_to_private(&self, channel_id: &str)
        -> Result<ConversionOutcome, SlackApiError>;

    /// Convert towards `target`
    async fn convert(
        &self,
        channel_id: &str,
        target: Visibility,
    ) -> Result<ConversionOutcome, SlackApiError> {
        match target {
            Visibility::Public => self.convert_to_public(channel_id).await,
            Visibility::Private => self.convert_to_private(channel_id).await,
        }
    }
}

/// Whether an `ok: false` error code means the channel already had the
/// requested visibility (`already_public`, `channel_already_private`, ...)
pub fn is_already_in_state(error: &str) -> bool {
    error.contains("already")
}

pub struct LegacyVisibilityClient {
    http: Client,
    browser_token: String,
    base_url: String,
}

impl LegacyVisibilityClient {
    pub fn new(
        browser_token: impl Into<String>,
        session_cookie: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut cookie = HeaderValue::from_str(&format!("d={}", session_cookie.trim()))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            browser_token: browser_token.into().trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(
        &self,
        method: &'static str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, SlackApiError> {
        let mut body = vec![("token", self.browser_token.as_str())];
        body.extend_from_slice(form);

        self.http
            .post(format!("{}/{}", self.base_url, method))
            .form(&body)
            .send()
            .await
            .map_err(|source| SlackApiError::Http { method, source })
    }

    async fn convert_channel(
        &self,
        method: &'static str,
        channel_id: &str,
    ) -> Result<ConversionOutcome, SlackApiError> {
        debug!(channel_id = %channel_id, method, "requesting visibility conversion");

        let response = self.post(method, &[("channel", channel_id)]).await?;
        match decode_response::<ApiEnvelope>(method, response).await {
            Ok(_) => Ok(ConversionOutcome::Converted),
            Err(SlackApiError::Api { error, .. }) if is_already_in_state(&error) => {
                Ok(ConversionOutcome::AlreadyInState { error })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl VisibilityApi for LegacyVisibilityClient {
    async fn list_channel_managers(&self, channel_id: &str) -> Result<Vec<String>, SlackApiError> {
        let response = self
            .post(LIST_ASSIGNMENTS_METHOD, &[("entity_id", channel_id)])
            .await?;

        match decode_response::<RoleAssignmentsResponse>(LIST_ASSIGNMENTS_METHOD, response).await
        {
            Ok(assignments) => Ok(assignments
                .role_assignments
                .into_iter()
                .next()
                .map(|assignment| assignment.users)
                .unwrap_or_default()),
            Err(SlackApiError::Api { error, .. }) => {
                warn!(
                    channel_id = %channel_id,
                    error = %error,
                    "Role assignment lookup refused, treating channel as having no managers"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn convert_to_public(&self, channel_id: &str) -> Result<ConversionOutcome, SlackApiError> {
        self.convert_channel(CONVERT_TO_PUBLIC_METHOD, channel_id)
            .await
    }

    async fn convert_to_private(
        &self,
        channel_id: &str,
    ) -> Result<ConversionOutcome, SlackApiError> {
        self.convert_channel(CONVERT_TO_PRIVATE_METHOD, channel_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> LegacyVisibilityClient {
        LegacyVisibilityClient::new(
            "xoxc-browser",
            "session-cookie",
            server.base_url(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_is_already_in_state() {
        assert!(is_already_in_state("already_public"));
        assert!(is_already_in_state("channel_already_private"));
        assert!(!is_already_in_state("not_authed"));
    }

    #[test]
    fn test_invalid_cookie_is_rejected() {
        let result = LegacyVisibilityClient::new(
            "xoxc",
            "bad\ncookie",
            "http://localhost",
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_managers_sends_session_credentials() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/admin.roles.entity.listAssignments")
                .header("cookie", "d=session-cookie")
                .body_includes("token=xoxc-browser")
                .body_includes("entity_id=C1");
            then.status(200).json_body(json!({
                "ok": true,
                "role_assignments": [
                    {"role_id": "Rl0A", "users": ["U1", "U2"]},
                    {"role_id": "Rl0B", "users": ["U9"]}
                ]
            }));
        });

        let managers = client(&server).list_channel_managers("C1").await.unwrap();
        assert_eq!(managers, vec!["U1", "U2"]);
        mock.assert();
    }

    #[tokio::test]
    async fn test_list_managers_not_ok_is_empty() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/admin.roles.entity.listAssignments");
            then.status(200)
                .json_body(json!({"ok": false, "error": "not_allowed_token_type"}));
        });

        let managers = client(&server).list_channel_managers("C1").await.unwrap();
        assert!(managers.is_empty());
    }

    #[tokio::test]
    async fn test_list_managers_without_assignments_is_empty() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/admin.roles.entity.listAssignments");
            then.status(200)
                .json_body(json!({"ok": true, "role_assignments": []}));
        });

        let managers = client(&server).list_channel_managers("C1").await.unwrap();
        assert!(managers.is_empty());
    }

    #[tokio::test]
    async fn test_list_managers_transport_failure_is_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/admin.roles.entity.listAssignments");
            then.status(502).body("bad gateway");
        });

        assert!(client(&server).list_channel_managers("C1").await.is_err());
    }

    #[tokio::test]
    async fn test_convert_to_public() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/conversations.convertToPublic")
                .header("cookie", "d=session-cookie")
                .body_includes("channel=C1");
            then.status(200).json_body(json!({"ok": true}));
        });

        let outcome = client(&server).convert_to_public("C1").await.unwrap();
        assert_eq!(outcome, ConversionOutcome::Converted);
        mock.assert();
    }

    #[tokio::test]
    async fn test_convert_to_state_already_held() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/conversations.convertToPrivate");
            then.status(200)
                .json_body(json!({"ok": false, "error": "channel_already_private"}));
        });

        let outcome = client(&server)
            .convert("C1", Visibility::Private)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ConversionOutcome::AlreadyInState {
                error: "channel_already_private".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_convert_other_error_is_surfaced() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/conversations.convertToPublic");
            then.status(200)
                .json_body(json!({"ok": false, "error": "invalid_auth"}));
        });

        let err = client(&server).convert_to_public("C1").await.unwrap_err();
        assert_eq!(err.api_error(), Some("invalid_auth"));
    }
}
