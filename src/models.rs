//! The Request/Step/Ticket data model (§3).
//!
//! `Request` owns exactly six `Step`s, one per `StepType`, always present in
//! canonical order. A step's `result` is a tagged `StepResult` rather than a
//! dynamic value, so later steps pattern-match instead of downcasting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The canonical tracker record (§3). Treated as immutable between steps;
/// a step that mutates a ticket returns a new value, it never mutates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub tracker_id: String,
    pub tracker_url: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub linked_conversations: Option<String>,
    #[serde(default)]
    pub chat_channel: Option<String>,
}

impl Ticket {
    /// Parses the comma-joined `linked_conversations` field into individual entries.
    pub fn linked_conversation_list(&self) -> Vec<String> {
        match &self.linked_conversations {
            Some(s) if !s.trim().is_empty() => {
                s.split(',').map(|p| p.trim().to_string()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn contains_conversation(&self, url: &str) -> bool {
        self.linked_conversation_list().iter().any(|c| c == url)
    }
}

/// Partial update accepted by `KnowledgeBase::update_ticket` (§4.1).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_conversations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_channel: Option<String>,
}

/// A new ticket specification proposed by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicketSpec {
    pub title: String,
    pub summary: String,
    /// Short URL-safe identifier used to name the chat channel.
    pub slug: String,
}

/// Tagged decision returned by the LLM step (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AIDecision {
    Existing { ticket: Ticket },
    New(NewTicketSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Marker return type for adapter calls whose only meaningful outcome is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack;

/// The six pipeline steps, in the fixed canonical execution order (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    CheckExistingTickets,
    AiAnalysis,
    CreateOrUpdateTracker,
    MaybeCreateChatChannel,
    MaybeUpdateTrackerWithChat,
    AddOperatorsToChat,
}

impl StepType {
    /// Canonical execution order. `Request::new` seeds steps in this order
    /// and the engine never deviates from it.
    pub const ORDER: [StepType; 6] = [
        StepType::CheckExistingTickets,
        StepType::AiAnalysis,
        StepType::CreateOrUpdateTracker,
        StepType::MaybeCreateChatChannel,
        StepType::MaybeUpdateTrackerWithChat,
        StepType::AddOperatorsToChat,
    ];

    pub fn index(&self) -> usize {
        Self::ORDER.iter().position(|s| s == self).expect("StepType::ORDER is exhaustive")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::CheckExistingTickets => "check_existing_tickets",
            StepType::AiAnalysis => "ai_analysis",
            StepType::CreateOrUpdateTracker => "create_or_update_tracker",
            StepType::MaybeCreateChatChannel => "maybe_create_chat_channel",
            StepType::MaybeUpdateTrackerWithChat => "maybe_update_tracker_with_chat",
            StepType::AddOperatorsToChat => "add_operators_to_chat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// The step-typed payload a completed step leaves behind (§6, "Step-result payloads").
///
/// Adjacently tagged rather than internally tagged: `Tickets` wraps a sequence,
/// and serde's internally-tagged representation cannot encode a newtype
/// variant whose payload is a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StepResult {
    Tickets(Vec<Ticket>),
    Decision(AIDecision),
    Ticket(Ticket),
    Channel(ChannelInfo),
    Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_type: StepType,
    pub status: StepStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<StepResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Step {
    pub fn pending(step_type: StepType) -> Self {
        Step {
            step_type,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.result = None;
        self.error = None;
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = StepStatus::Running;
        self.started_at = Some(now);
        self.completed_at = None;
        self.result = None;
        self.error = None;
    }

    pub fn complete(&mut self, now: DateTime<Utc>, result: StepResult) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(now);
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, now: DateTime<Utc>, error: String) {
        self.status = StepStatus::Failed;
        self.completed_at = Some(now);
        self.error = Some(error);
        self.result = None;
    }
}

/// The inbound trigger a `Request` is constructed from.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEvent {
    pub source_conversation_id: String,
    pub source_conversation_url: String,
    pub message_body: String,
}

/// One pipeline invocation (§3). `steps` always has exactly six entries,
/// one per `StepType::ORDER`, indexed by `StepType::index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub source_conversation_id: String,
    pub source_conversation_url: String,
    pub message_body: String,
    pub status: RequestStatus,
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn new(event: RequestEvent) -> Self {
        let now = Utc::now();
        Request {
            id: Uuid::new_v4(),
            source_conversation_id: event.source_conversation_id,
            source_conversation_url: event.source_conversation_url,
            message_body: event.message_body,
            status: RequestStatus::Pending,
            steps: StepType::ORDER.iter().map(|t| Step::pending(*t)).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self, step_type: StepType) -> &Step {
        &self.steps[step_type.index()]
    }

    pub fn step_mut(&mut self, step_type: StepType) -> &mut Step {
        &mut self.steps[step_type.index()]
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn has_failed(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    /// Reset `step_type` and every later step (canonical order) to pending,
    /// clear `status` back to pending. Earlier completed steps (and their
    /// results) are left untouched; this is the retry idempotence contract (§4.3).
    pub fn reset_from(&mut self, step_type: StepType) {
        let from = step_type.index();
        for step in &mut self.steps[from..] {
            step.reset();
        }
        self.status = RequestStatus::Pending;
        self.updated_at = Utc::now();
    }

    pub fn reset_all(&mut self) {
        self.reset_from(StepType::ORDER[0]);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_result_tickets_serializes_and_round_trips() {
        let ticket = Ticket {
            ticket_id: "JMP-10".to_string(),
            tracker_id: "tr-10".to_string(),
            tracker_url: "https://tracker.example/JMP-10".to_string(),
            title: "Known issue".to_string(),
            summary: "...".to_string(),
            linked_conversations: None,
            chat_channel: None,
        };
        let result = StepResult::Tickets(vec![ticket.clone()]);

        let value = serde_json::to_value(&result).expect("Tickets variant must serialize");
        assert_eq!(value["type"], "Tickets");

        let round_tripped: StepResult = serde_json::from_value(value).expect("Tickets variant must deserialize");
        match round_tripped {
            StepResult::Tickets(tickets) => assert_eq!(tickets, vec![ticket]),
            other => panic!("expected StepResult::Tickets, got {other:?}"),
        }
    }

    #[test]
    fn step_result_unit_variant_still_serializes() {
        let value = serde_json::to_value(StepResult::Unit).expect("Unit variant must serialize");
        assert_eq!(value["type"], "Unit");
    }

    #[test]
    fn request_serializes_past_step_one_without_error() {
        let mut request = Request::new(RequestEvent {
            source_conversation_id: "conv-1".to_string(),
            source_conversation_url: "https://app.hd.io/a/apps/x/conversations/1".to_string(),
            message_body: "help".to_string(),
        });
        request
            .step_mut(StepType::CheckExistingTickets)
            .complete(Utc::now(), StepResult::Tickets(vec![]));

        assert!(serde_json::to_value(&request).is_ok());
    }
}
