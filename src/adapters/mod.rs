//! External Adapters (§4.1): one narrow, result-typed interface per remote
//! service. The pipeline depends only on these traits, never on a concrete
//! implementation, so a Request can be run against test doubles.

pub mod chat;
pub mod helpdesk;
pub mod knowledge_base;
pub mod llm;

pub use chat::ChatClient;
pub use helpdesk::HelpdeskClient;
pub use knowledge_base::KnowledgeBaseClient;
pub use llm::LlmClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AIDecision, Ack, ChannelInfo, ChatUser, Conversation, Operator, Ticket, TicketPatch};

#[async_trait]
pub trait Helpdesk: Send + Sync {
    async fn get_conversation(&self, id: &str) -> Result<Conversation>;
    async fn get_participating_operators(&self, conversation_id: &str) -> Result<Vec<Operator>>;
    async fn reply_to_conversation(&self, conversation_id: &str, body: &str) -> Result<Ack>;
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Full paginated enumeration; the pipeline relies on this returning
    /// every ticket the LLM should consider.
    async fn list_tickets(&self) -> Result<Vec<Ticket>>;
    async fn create_ticket(&self, ticket: Ticket) -> Result<Ticket>;
    async fn update_ticket(&self, tracker_id: &str, patch: TicketPatch) -> Result<Ticket>;
    /// Reads a single boolean page property. The preferred path for
    /// resolving the webhook's checkbox state (§6).
    async fn get_done_property(&self, tracker_id: &str, property: &str) -> Result<bool>;
}

#[async_trait]
pub trait Chat: Send + Sync {
    /// `name` is already formatted as `"{ticket_id}-{slug}"`, lowercased.
    async fn create_channel(&self, name: &str) -> Result<ChannelInfo>;
    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<ChatUser>>;
    async fn list_all_users(&self) -> Result<Vec<ChatUser>>;
    /// Idempotent at the adapter boundary: already-member is not an error.
    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> Result<Ack>;
    async fn set_channel_topic(&self, channel_id: &str, text: &str) -> Result<Ack>;
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<Ack>;
}

#[async_trait]
pub trait Llm: Send + Sync {
    /// Given existing tickets and the incoming message/conversation, either
    /// picks the most relevant existing ticket or proposes a new one. The
    /// pipeline treats this as a trusted oracle; it never re-validates the decision.
    async fn find_or_create_ticket(
        &self,
        candidates: &[Ticket],
        message_body: &str,
        conversation: &Conversation,
    ) -> Result<AIDecision>;
}

/// The set of adapters a single Request is run against. Grouped into one
/// record (rather than four separate function parameters threaded through
/// every step) per the design notes' "inject a record of adapters per Request".
#[derive(Clone)]
pub struct Adapters {
    pub helpdesk: std::sync::Arc<dyn Helpdesk>,
    pub knowledge_base: std::sync::Arc<dyn KnowledgeBase>,
    pub chat: std::sync::Arc<dyn Chat>,
    pub llm: std::sync::Arc<dyn Llm>,
}
