//! `reqwest`-backed `Llm` adapter, the decision oracle (§4.1).

use async_trait::async_trait;

use crate::adapters::Llm;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{AIDecision, Conversation, Ticket};

pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    key: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        LlmClient {
            http: reqwest::Client::builder()
                .timeout(config.adapter_timeout)
                .build()
                .expect("reqwest client builds with static config"),
            endpoint: config.llm_endpoint.clone(),
            key: config.llm_key.clone(),
        }
    }
}

#[derive(serde::Serialize)]
struct DecisionRequest<'a> {
    candidates: &'a [Ticket],
    message_body: &'a str,
    conversation: &'a Conversation,
}

#[async_trait]
impl Llm for LlmClient {
    async fn find_or_create_ticket(
        &self,
        candidates: &[Ticket],
        message_body: &str,
        conversation: &Conversation,
    ) -> Result<AIDecision> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.key)
            .json(&DecisionRequest {
                candidates,
                message_body,
                conversation,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::RemoteFailure {
                service: "llm",
                status,
                body,
            });
        }

        resp.json::<AIDecision>().await.map_err(|e| Error::ParseFailure {
            service: "llm",
            detail: e.to_string(),
        })
    }
}
