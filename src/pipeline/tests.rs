//! End-to-end scenario tests (§8) driven against hand-written mock adapters,
//! mirroring the teacher codebase's preference for in-process doubles over a
//! mocking framework.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{Adapters, Chat, Helpdesk, KnowledgeBase, Llm};
use crate::error::{Error, Result};
use crate::models::{
    Ack, AIDecision, ChannelInfo, ChatUser, Conversation, NewTicketSpec, Operator, Request, RequestEvent,
    RequestStatus, StepResult, StepStatus, StepType, Ticket, TicketPatch,
};

use super::Engine;

#[derive(Default)]
struct MockHelpdesk {
    conversation: Mutex<Option<Conversation>>,
    operators: Mutex<Vec<Operator>>,
}

#[async_trait]
impl Helpdesk for MockHelpdesk {
    async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        Ok(self.conversation.lock().unwrap().clone().unwrap_or(Conversation {
            id: id.to_string(),
            url: format!("https://app.hd.io/a/apps/x/conversations/{id}"),
            subject: None,
        }))
    }

    async fn get_participating_operators(&self, _conversation_id: &str) -> Result<Vec<Operator>> {
        Ok(self.operators.lock().unwrap().clone())
    }

    async fn reply_to_conversation(&self, _conversation_id: &str, _body: &str) -> Result<Ack> {
        Ok(Ack)
    }
}

#[derive(Default)]
struct MockKnowledgeBase {
    tickets: Mutex<Vec<Ticket>>,
    create_calls: Mutex<Vec<Ticket>>,
    update_calls: Mutex<Vec<(String, TicketPatch)>>,
    fail_update: Mutex<bool>,
}

#[async_trait]
impl KnowledgeBase for MockKnowledgeBase {
    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        Ok(self.tickets.lock().unwrap().clone())
    }

    async fn create_ticket(&self, ticket: Ticket) -> Result<Ticket> {
        self.create_calls.lock().unwrap().push(ticket.clone());
        let stored = Ticket {
            ticket_id: "JMP-42".to_string(),
            tracker_id: "tr-42".to_string(),
            tracker_url: "https://tracker.example/JMP-42".to_string(),
            ..ticket
        };
        self.tickets.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update_ticket(&self, tracker_id: &str, patch: TicketPatch) -> Result<Ticket> {
        if *self.fail_update.lock().unwrap() {
            return Err(Error::RemoteFailure {
                service: "knowledge_base",
                status: 500,
                body: "boom".to_string(),
            });
        }
        self.update_calls.lock().unwrap().push((tracker_id.to_string(), patch.clone()));
        let mut tickets = self.tickets.lock().unwrap();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.tracker_id == tracker_id)
            .expect("ticket must exist for update in test");
        if let Some(title) = patch.title {
            ticket.title = title;
        }
        if let Some(linked) = patch.linked_conversations {
            ticket.linked_conversations = Some(linked);
        }
        if let Some(channel) = patch.chat_channel {
            ticket.chat_channel = Some(channel);
        }
        Ok(ticket.clone())
    }

    async fn get_done_property(&self, _tracker_id: &str, _property: &str) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Default)]
struct MockChat {
    created: Mutex<Option<ChannelInfo>>,
    invite_calls: Mutex<Vec<(String, Vec<String>)>>,
    topic_calls: Mutex<Vec<(String, String)>>,
    members: Mutex<Vec<ChatUser>>,
    users: Mutex<Vec<ChatUser>>,
}

#[async_trait]
impl Chat for MockChat {
    async fn create_channel(&self, _name: &str) -> Result<ChannelInfo> {
        Ok(self.created.lock().unwrap().clone().expect("create_channel configured"))
    }

    async fn list_channel_members(&self, _channel_id: &str) -> Result<Vec<ChatUser>> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn list_all_users(&self) -> Result<Vec<ChatUser>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn invite_users(&self, channel_id: &str, user_ids: &[String]) -> Result<Ack> {
        self.invite_calls
            .lock()
            .unwrap()
            .push((channel_id.to_string(), user_ids.to_vec()));
        Ok(Ack)
    }

    async fn set_channel_topic(&self, channel_id: &str, text: &str) -> Result<Ack> {
        self.topic_calls.lock().unwrap().push((channel_id.to_string(), text.to_string()));
        Ok(Ack)
    }

    async fn post_message(&self, _channel_id: &str, _text: &str) -> Result<Ack> {
        Ok(Ack)
    }
}

struct MockLlm {
    decision: Mutex<Option<AIDecision>>,
}

#[async_trait]
impl Llm for MockLlm {
    async fn find_or_create_ticket(
        &self,
        _candidates: &[Ticket],
        _message_body: &str,
        _conversation: &Conversation,
    ) -> Result<AIDecision> {
        Ok(self.decision.lock().unwrap().clone().expect("decision configured"))
    }
}

fn event() -> RequestEvent {
    RequestEvent {
        source_conversation_id: "conv-1".to_string(),
        source_conversation_url: "https://app.hd.io/a/apps/x/conversations/999".to_string(),
        message_body: "I cannot sign in".to_string(),
    }
}

fn engine(
    helpdesk: Arc<MockHelpdesk>,
    knowledge_base: Arc<MockKnowledgeBase>,
    chat: Arc<MockChat>,
    llm: Arc<MockLlm>,
) -> Engine {
    Engine::new(
        Adapters {
            helpdesk,
            knowledge_base,
            chat,
            llm,
        },
        Duration::from_secs(5),
    )
}

fn no_op_sink() -> impl FnMut(&Request) {
    |_: &Request| {}
}

#[tokio::test]
async fn new_ticket_happy_path() {
    let helpdesk = Arc::new(MockHelpdesk::default());
    helpdesk.operators.lock().unwrap().push(Operator {
        id: "op1".to_string(),
        email: "a@x".to_string(),
        name: "A".to_string(),
    });

    let kb = Arc::new(MockKnowledgeBase::default());

    let chat = Arc::new(MockChat::default());
    *chat.created.lock().unwrap() = Some(ChannelInfo {
        channel_id: "C1".to_string(),
        url: "https://app.chat.com/archives/C1/p1".to_string(),
    });
    chat.users.lock().unwrap().push(ChatUser {
        id: "U9".to_string(),
        email: Some("a@x".to_string()),
        name: Some("A".to_string()),
    });

    let llm = Arc::new(MockLlm {
        decision: Mutex::new(Some(AIDecision::New(NewTicketSpec {
            title: "Login broken".to_string(),
            summary: "user cannot sign in".to_string(),
            slug: "login-broken".to_string(),
        }))),
    });

    let engine = engine(helpdesk, Arc::clone(&kb), Arc::clone(&chat), llm);
    let mut request = Request::new(event());
    let mut sink = no_op_sink();
    engine.run(&mut request, &mut sink).await;

    assert_eq!(request.status, RequestStatus::Completed);
    assert_eq!(kb.create_calls.lock().unwrap().len(), 1);

    let update_calls = kb.update_calls.lock().unwrap();
    assert!(update_calls
        .iter()
        .any(|(_, patch)| patch.chat_channel.as_deref() == Some("https://app.chat.com/archives/C1/p1")));
    drop(update_calls);

    let invites = chat.invite_calls.lock().unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].0, "C1");
    assert_eq!(invites[0].1, vec!["U9".to_string()]);
    drop(invites);

    let topics = chat.topic_calls.lock().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].0, "C1");
}

#[tokio::test]
async fn existing_ticket_new_conversation_url_is_linked() {
    let existing = Ticket {
        ticket_id: "JMP-10".to_string(),
        tracker_id: "tr-10".to_string(),
        tracker_url: "https://tracker.example/JMP-10".to_string(),
        title: "Known issue".to_string(),
        summary: "...".to_string(),
        linked_conversations: Some(String::new()),
        chat_channel: Some("https://app.chat.com/archives/C9/p1".to_string()),
    };

    let helpdesk = Arc::new(MockHelpdesk::default());
    let kb = Arc::new(MockKnowledgeBase::default());
    kb.tickets.lock().unwrap().push(existing.clone());
    let chat = Arc::new(MockChat::default());
    let llm = Arc::new(MockLlm {
        decision: Mutex::new(Some(AIDecision::Existing {
            ticket: existing.clone(),
        })),
    });

    let engine = engine(helpdesk, Arc::clone(&kb), chat, llm);
    let mut request = Request::new(event());
    let mut sink = no_op_sink();
    engine.run(&mut request, &mut sink).await;

    assert_eq!(request.status, RequestStatus::Completed);
    let update_calls = kb.update_calls.lock().unwrap();
    assert!(update_calls
        .iter()
        .any(|(_, patch)| patch.linked_conversations.as_deref()
            == Some("https://app.hd.io/a/apps/x/conversations/999")));
}

#[tokio::test]
async fn existing_ticket_duplicate_conversation_url_is_not_relinked() {
    let conversation_url = "https://app.hd.io/a/apps/x/conversations/999".to_string();
    let existing = Ticket {
        ticket_id: "JMP-10".to_string(),
        tracker_id: "tr-10".to_string(),
        tracker_url: "https://tracker.example/JMP-10".to_string(),
        title: "Known issue".to_string(),
        summary: "...".to_string(),
        linked_conversations: Some(conversation_url.clone()),
        chat_channel: Some("https://app.chat.com/archives/C9/p1".to_string()),
    };

    let helpdesk = Arc::new(MockHelpdesk::default());
    let kb = Arc::new(MockKnowledgeBase::default());
    kb.tickets.lock().unwrap().push(existing.clone());
    let chat = Arc::new(MockChat::default());
    let llm = Arc::new(MockLlm {
        decision: Mutex::new(Some(AIDecision::Existing {
            ticket: existing.clone(),
        })),
    });

    let engine = engine(helpdesk, Arc::clone(&kb), chat, llm);
    let mut request = Request::new(event());
    let mut sink = no_op_sink();
    engine.run(&mut request, &mut sink).await;

    assert_eq!(request.status, RequestStatus::Completed);
    assert!(kb
        .update_calls
        .lock()
        .unwrap()
        .iter()
        .all(|(_, patch)| patch.linked_conversations.is_none()));
}

#[tokio::test]
async fn step_failure_halts_request_and_retry_step_recovers() {
    let existing = Ticket {
        ticket_id: "JMP-10".to_string(),
        tracker_id: "tr-10".to_string(),
        tracker_url: "https://tracker.example/JMP-10".to_string(),
        title: "Known issue".to_string(),
        summary: "...".to_string(),
        linked_conversations: Some(String::new()),
        chat_channel: Some("https://app.chat.com/archives/C9/p1".to_string()),
    };

    let helpdesk = Arc::new(MockHelpdesk::default());
    let kb = Arc::new(MockKnowledgeBase::default());
    kb.tickets.lock().unwrap().push(existing.clone());
    *kb.fail_update.lock().unwrap() = true;
    let chat = Arc::new(MockChat::default());
    let llm = Arc::new(MockLlm {
        decision: Mutex::new(Some(AIDecision::Existing {
            ticket: existing.clone(),
        })),
    });

    let engine = engine(helpdesk, Arc::clone(&kb), Arc::clone(&chat), llm);
    let mut request = Request::new(event());
    let mut sink = no_op_sink();
    engine.run(&mut request, &mut sink).await;

    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(
        request.step(StepType::CreateOrUpdateTracker).status,
        StepStatus::Failed
    );
    assert_eq!(
        request.step(StepType::MaybeCreateChatChannel).status,
        StepStatus::Pending
    );
    assert_eq!(request.step(StepType::AddOperatorsToChat).status, StepStatus::Pending);

    // Preserve earlier completed results across the retry.
    let tickets_before = request.step(StepType::CheckExistingTickets).result.clone();

    *kb.fail_update.lock().unwrap() = false;
    let mut sink = no_op_sink();
    engine
        .retry_step(&mut request, StepType::CreateOrUpdateTracker, &mut sink)
        .await;

    assert_eq!(request.status, RequestStatus::Completed);
    assert!(matches!(
        request.step(StepType::CheckExistingTickets).result,
        Some(StepResult::Tickets(_))
    ));
    assert_eq!(
        request.step(StepType::CheckExistingTickets).result.is_some(),
        tickets_before.is_some()
    );
}

#[tokio::test]
async fn retry_all_reruns_every_step_from_scratch() {
    let existing = Ticket {
        ticket_id: "JMP-10".to_string(),
        tracker_id: "tr-10".to_string(),
        tracker_url: "https://tracker.example/JMP-10".to_string(),
        title: "Known issue".to_string(),
        summary: "...".to_string(),
        linked_conversations: Some(String::new()),
        chat_channel: Some("https://app.chat.com/archives/C9/p1".to_string()),
    };

    let helpdesk = Arc::new(MockHelpdesk::default());
    let kb = Arc::new(MockKnowledgeBase::default());
    kb.tickets.lock().unwrap().push(existing.clone());
    let chat = Arc::new(MockChat::default());
    let llm = Arc::new(MockLlm {
        decision: Mutex::new(Some(AIDecision::Existing {
            ticket: existing.clone(),
        })),
    });

    let engine = engine(helpdesk, Arc::clone(&kb), chat, llm);
    let mut request = Request::new(event());
    let mut sink = no_op_sink();
    engine.run(&mut request, &mut sink).await;
    assert_eq!(request.status, RequestStatus::Completed);

    let mut sink = no_op_sink();
    engine.retry_all(&mut request, &mut sink).await;

    assert_eq!(request.status, RequestStatus::Completed);
    for step_type in StepType::ORDER {
        assert_eq!(request.step(step_type).status, StepStatus::Completed);
    }
}

#[tokio::test]
async fn steps_complete_in_monotonic_time_order() {
    let existing = Ticket {
        ticket_id: "JMP-10".to_string(),
        tracker_id: "tr-10".to_string(),
        tracker_url: "https://tracker.example/JMP-10".to_string(),
        title: "Known issue".to_string(),
        summary: "...".to_string(),
        linked_conversations: Some(String::new()),
        chat_channel: Some("https://app.chat.com/archives/C9/p1".to_string()),
    };

    let helpdesk = Arc::new(MockHelpdesk::default());
    let kb = Arc::new(MockKnowledgeBase::default());
    kb.tickets.lock().unwrap().push(existing.clone());
    let chat = Arc::new(MockChat::default());
    let llm = Arc::new(MockLlm {
        decision: Mutex::new(Some(AIDecision::Existing {
            ticket: existing.clone(),
        })),
    });

    let engine = engine(helpdesk, Arc::clone(&kb), chat, llm);
    let mut request = Request::new(event());
    let mut sink = no_op_sink();
    engine.run(&mut request, &mut sink).await;

    for pair in request.steps.windows(2) {
        let completed = pair[0].completed_at.expect("completed step has completed_at");
        let next_started = pair[1].started_at.expect("next step ran");
        assert!(completed <= next_started);
    }
}
