use serde_json::Value;
use std::time::Duration;

use super::{DEFAULT_UPSTREAM_TIMEOUT, build_http_client};
use crate::error::{IdentityError, IdentityResult};

const SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Per-request Slack API client, constructed from a stored access token.
///
/// Slack reports failures inside a 200 body (`ok: false`), so every
/// response is checked for the flag as well as the HTTP status.
pub struct SlackClient {
    http: reqwest::Client,
    access_token: String,
}

impl SlackClient {
    pub fn new(access_token: &str) -> IdentityResult<Self> {
        Self::with_timeout(access_token, DEFAULT_UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(access_token: &str, timeout: Duration) -> IdentityResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            access_token: access_token.to_string(),
        })
    }

    fn check_ok(method: &str, body: Value) -> IdentityResult<Value> {
        if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            Ok(body)
        } else {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            Err(IdentityError::Upstream(format!(
                "Slack API error on {}: {}",
                method, code
            )))
        }
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> IdentityResult<Value> {
        let response = self
            .http
            .get(format!("{}/{}", SLACK_API_BASE_URL, method))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Slack request failed: {}", e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Slack response parse error: {}", e)))?;

        Self::check_ok(method, body)
    }

    async fn post(&self, method: &str, body: Value) -> IdentityResult<Value> {
        let response = self
            .http
            .post(format!("{}/{}", SLACK_API_BASE_URL, method))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Slack request failed: {}", e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Slack response parse error: {}", e)))?;

        Self::check_ok(method, body)
    }

    /// Channels visible to the user.
    pub async fn channels(&self) -> IdentityResult<Value> {
        self.get("conversations.list", &[("limit", "100")]).await
    }

    /// Recent message history for a channel.
    pub async fn channel_history(&self, channel_id: &str) -> IdentityResult<Value> {
        self.get(
            "conversations.history",
            &[("channel", channel_id), ("limit", "50")],
        )
        .await
    }

    /// Post a message, optionally threaded.
    pub async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> IdentityResult<Value> {
        let mut body = serde_json::json!({
            "channel": channel_id,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = Value::String(ts.to_string());
        }
        self.post("chat.postMessage", body).await
    }

    /// The linked workspace's info.
    pub async fn team_info(&self) -> IdentityResult<Value> {
        self.get("team.info", &[]).await
    }
}
