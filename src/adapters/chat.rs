//! `reqwest`-backed `Chat` adapter.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::Chat;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Ack, ChannelInfo, ChatUser};

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        ChatClient {
            http: reqwest::Client::builder()
                .timeout(config.adapter_timeout)
                .build()
                .expect("reqwest client builds with static config"),
            base_url: "https://app.chat.example/api".to_string(),
            token: config.chat_token.clone(),
        }
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::RemoteFailure {
            service: "chat",
            status,
            body,
        })
    }
}

#[derive(Deserialize)]
struct MembersResponse {
    members: Vec<ChatUser>,
}

#[derive(Deserialize)]
struct UsersResponse {
    users: Vec<ChatUser>,
}

#[async_trait]
impl Chat for ChatClient {
    async fn create_channel(&self, name: &str) -> Result<ChannelInfo> {
        let resp = self
            .http
            .post(format!("{}/channels.create", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "name": name.to_lowercase() }))
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        resp.json::<ChannelInfo>().await.map_err(|e| Error::ParseFailure {
            service: "chat",
            detail: e.to_string(),
        })
    }

    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<ChatUser>> {
        let resp = self
            .http
            .get(format!("{}/channels.members", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("channel", channel_id)])
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        let parsed: MembersResponse = resp.json().await.map_err(|e| Error::ParseFailure {
            service: "chat",
            detail: e.to_string(),
        })?;
        Ok(parsed.members)
    }

    async fn list_all_users(&self) -> Result<Vec<ChatUser>> {
        let resp = self
            .http
            .get(format!("{}/users.list", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        let parsed: UsersResponse = resp.json().await.map_err(|e| Error::ParseFailure {
            service: "chat",
            detail: e.to_string(),
        })?;
        Ok(parsed.users)
    }

    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> Result<Ack> {
        let resp = self
            .http
            .post(format!("{}/channels.invite", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channel": channel_id, "users": user_ids }))
            .send()
            .await?;
        self.check_status(resp).await?;
        Ok(Ack)
    }

    async fn set_channel_topic(&self, channel_id: &str, text: &str) -> Result<Ack> {
        let resp = self
            .http
            .post(format!("{}/channels.setTopic", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channel": channel_id, "topic": text }))
            .send()
            .await?;
        self.check_status(resp).await?;
        Ok(Ack)
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<Ack> {
        let resp = self
            .http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channel": channel_id, "text": text }))
            .send()
            .await?;
        self.check_status(resp).await?;
        Ok(Ack)
    }
}
