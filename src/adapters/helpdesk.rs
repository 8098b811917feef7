//! `reqwest`-backed `Helpdesk` adapter.
//!
//! Deliberately thin: one HTTP call per trait method, `?`-propagated through
//! the shared `Error` taxonomy. Retry policy, pagination, and TLS tuning are
//! out of scope (§1) and left to a future transport layer.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::Helpdesk;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Ack, Conversation, Operator};

pub struct HelpdeskClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HelpdeskClient {
    pub fn new(config: &Config) -> Self {
        HelpdeskClient {
            http: reqwest::Client::builder()
                .timeout(config.adapter_timeout)
                .build()
                .expect("reqwest client builds with static config"),
            base_url: "https://app.helpdesk.io/api/v1".to_string(),
            token: config.helpdesk_token.clone(),
        }
    }

    async fn check_status(&self, service: &'static str, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::RemoteFailure { service, status, body })
    }
}

#[derive(Deserialize)]
struct OperatorsResponse {
    operators: Vec<Operator>,
}

#[async_trait]
impl Helpdesk for HelpdeskClient {
    async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        let resp = self
            .http
            .get(format!("{}/conversations/{id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check_status("helpdesk", resp).await?;
        resp.json::<Conversation>().await.map_err(|e| Error::ParseFailure {
            service: "helpdesk",
            detail: e.to_string(),
        })
    }

    async fn get_participating_operators(&self, conversation_id: &str) -> Result<Vec<Operator>> {
        let resp = self
            .http
            .get(format!(
                "{}/conversations/{conversation_id}/operators",
                self.base_url
            ))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check_status("helpdesk", resp).await?;
        let parsed: OperatorsResponse = resp.json().await.map_err(|e| Error::ParseFailure {
            service: "helpdesk",
            detail: e.to_string(),
        })?;
        Ok(parsed.operators)
    }

    async fn reply_to_conversation(&self, conversation_id: &str, body: &str) -> Result<Ack> {
        let resp = self
            .http
            .post(format!("{}/conversations/{conversation_id}/reply", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        self.check_status("helpdesk", resp).await?;
        Ok(Ack)
    }
}
