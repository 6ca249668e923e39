//! REST implementation of [`PlatformClient`].
//!
//! The platform exposes a uniform POST-JSON API; every endpoint takes a
//! JSON body with the bearer token in the Authorization header. Error
//! handling maps HTTP failures into [`PlatformError`] -- no retries at this
//! layer.
//!
//! [`PlatformClient`]: corvid_core::platform::PlatformClient

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use corvid_core::platform::PlatformClient;
use corvid_types::error::PlatformError;
use corvid_types::platform::{Post, ReplyOptions, SearchFilters, SentMessage, UserProfile};

/// HTTP platform client with bearer-token auth.
pub struct RestPlatformClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl RestPlatformClient {
    pub fn new(base_url: String, token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// One POST-JSON round trip with uniform status mapping.
    async fn post(&self, path: &str, body: Value) -> Result<Value, PlatformError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout
                } else {
                    PlatformError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if status.as_u16() == 204 {
            return Ok(Value::Null);
        }

        response
            .json()
            .await
            .map_err(|e| PlatformError::Deserialization(e.to_string()))
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, PlatformError> {
        serde_json::from_value(value).map_err(|e| PlatformError::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl PlatformClient for RestPlatformClient {
    async fn me(&self) -> Result<UserProfile, PlatformError> {
        let value = self.post("/users/me", json!({})).await?;
        Self::parse(value)
    }

    async fn user_info(&self, user_id: &str) -> Result<UserProfile, PlatformError> {
        let value = self
            .post("/users/show", json!({ "user_id": user_id }))
            .await?;
        Self::parse(value)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>, PlatformError> {
        let value = self
            .post("/users/search", json!({ "query": query, "limit": 5 }))
            .await?;
        Self::parse(value)
    }

    async fn send_reply(
        &self,
        text: &str,
        opts: &ReplyOptions,
    ) -> Result<SentMessage, PlatformError> {
        let mut body = json!({ "text": text });
        if let Some(reply_to) = &opts.reply_to {
            body["reply_id"] = json!(reply_to);
        }
        if let Some(channel_id) = &opts.channel_id {
            body["channel_id"] = json!(channel_id);
        }
        let value = self.post("/notes/create", body).await?;
        Self::parse(value)
    }

    async fn send_direct_message(
        &self,
        text: &str,
        user_id: &str,
    ) -> Result<SentMessage, PlatformError> {
        let value = self
            .post(
                "/messaging/messages/create",
                json!({ "user_id": user_id, "text": text }),
            )
            .await?;
        Self::parse(value)
    }

    async fn search_posts(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<Post>, PlatformError> {
        let mut body = json!({ "query": query });
        if let Some(from) = &filters.from_user_id {
            body["user_id"] = json!(from);
        }
        if let Some(limit) = filters.limit {
            body["limit"] = json!(limit);
        }
        let value = self.post("/notes/search", body).await?;
        Self::parse(value)
    }

    async fn follow_user(&self, user_id: &str) -> Result<(), PlatformError> {
        self.post("/following/create", json!({ "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn unfollow_user(&self, user_id: &str) -> Result<(), PlatformError> {
        self.post("/following/delete", json!({ "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn block_user(&self, user_id: &str) -> Result<(), PlatformError> {
        self.post("/blocking/create", json!({ "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn unblock_user(&self, user_id: &str) -> Result<(), PlatformError> {
        self.post("/blocking/delete", json!({ "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn join_group(&self, group_id: &str) -> Result<(), PlatformError> {
        self.post("/groups/join", json!({ "group_id": group_id }))
            .await?;
        Ok(())
    }

    async fn leave_group(&self, group_id: &str) -> Result<(), PlatformError> {
        self.post("/groups/leave", json!({ "group_id": group_id }))
            .await?;
        Ok(())
    }

    async fn conversation_thread(
        &self,
        root_id: &str,
        max_depth: u32,
    ) -> Result<Vec<Post>, PlatformError> {
        let value = self
            .post(
                "/notes/thread",
                json!({ "note_id": root_id, "depth": max_depth }),
            )
            .await?;
        Self::parse(value)
    }
}
