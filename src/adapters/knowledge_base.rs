//! `reqwest`-backed `KnowledgeBase` adapter (tracker storage).

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::KnowledgeBase;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Ticket, TicketPatch};

pub struct KnowledgeBaseClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    database_id: String,
}

impl KnowledgeBaseClient {
    pub fn new(config: &Config) -> Self {
        KnowledgeBaseClient {
            http: reqwest::Client::builder()
                .timeout(config.adapter_timeout)
                .build()
                .expect("reqwest client builds with static config"),
            base_url: "https://api.knowledgebase.example/v1".to_string(),
            token: config.knowledge_base_token.clone(),
            database_id: config.knowledge_base_database_id.clone(),
        }
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::RemoteFailure {
            service: "knowledge_base",
            status,
            body,
        })
    }
}

#[derive(Deserialize)]
struct TicketsPage {
    tickets: Vec<Ticket>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[async_trait]
impl KnowledgeBase for KnowledgeBaseClient {
    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(format!("{}/databases/{}/tickets", self.base_url, self.database_id))
                .bearer_auth(&self.token);
            if let Some(c) = &cursor {
                req = req.query(&[("cursor", c.as_str())]);
            }
            let resp = self.check_status(req.send().await?).await?;
            let page: TicketsPage = resp.json().await.map_err(|e| Error::ParseFailure {
                service: "knowledge_base",
                detail: e.to_string(),
            })?;
            all.extend(page.tickets);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all)
    }

    async fn create_ticket(&self, ticket: Ticket) -> Result<Ticket> {
        let resp = self
            .http
            .post(format!("{}/databases/{}/tickets", self.base_url, self.database_id))
            .bearer_auth(&self.token)
            .json(&ticket)
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        resp.json::<Ticket>().await.map_err(|e| Error::ParseFailure {
            service: "knowledge_base",
            detail: e.to_string(),
        })
    }

    async fn update_ticket(&self, tracker_id: &str, patch: TicketPatch) -> Result<Ticket> {
        let resp = self
            .http
            .patch(format!("{}/tickets/{tracker_id}", self.base_url))
            .bearer_auth(&self.token)
            .json(&patch)
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        resp.json::<Ticket>().await.map_err(|e| Error::ParseFailure {
            service: "knowledge_base",
            detail: e.to_string(),
        })
    }

    async fn get_done_property(&self, tracker_id: &str, property: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct PropertyResponse {
            checked: bool,
        }

        let resp = self
            .http
            .get(format!("{}/tickets/{tracker_id}/properties/{property}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        let parsed: PropertyResponse = resp.json().await.map_err(|e| Error::ParseFailure {
            service: "knowledge_base",
            detail: e.to_string(),
        })?;
        Ok(parsed.checked)
    }
}
