//! The six step bodies (§4.3). Each takes the adapter record and whatever
//! earlier step results it needs, and returns the `StepResult` the engine
//! stores on success.

use crate::adapters::Adapters;
use crate::error::Error;
use crate::models::{AIDecision, ChannelInfo, NewTicketSpec, Request, StepResult, StepType, Ticket, TicketPatch};
use crate::url_extract;
use crate::user_matcher::match_users;

type StepOutcome = Result<StepResult, Error>;

fn expect_tickets(request: &Request) -> Result<&Vec<Ticket>, Error> {
    match request.step(StepType::CheckExistingTickets).result.as_ref() {
        Some(StepResult::Tickets(tickets)) => Ok(tickets),
        _ => Err(Error::MissingImplementation {
            step_type: "check_existing_tickets",
        }),
    }
}

fn expect_decision(request: &Request) -> Result<&AIDecision, Error> {
    match request.step(StepType::AiAnalysis).result.as_ref() {
        Some(StepResult::Decision(decision)) => Ok(decision),
        _ => Err(Error::MissingImplementation { step_type: "ai_analysis" }),
    }
}

fn expect_ticket(request: &Request, step_type: StepType) -> Result<&Ticket, Error> {
    match request.step(step_type).result.as_ref() {
        Some(StepResult::Ticket(ticket)) => Ok(ticket),
        _ => Err(Error::MissingImplementation {
            step_type: step_type.as_str(),
        }),
    }
}

fn expect_channel(request: &Request) -> Result<&ChannelInfo, Error> {
    match request.step(StepType::MaybeCreateChatChannel).result.as_ref() {
        Some(StepResult::Channel(channel)) => Ok(channel),
        _ => Err(Error::MissingImplementation {
            step_type: "maybe_create_chat_channel",
        }),
    }
}

pub async fn check_existing_tickets(adapters: &Adapters) -> StepOutcome {
    let tickets = adapters.knowledge_base.list_tickets().await?;
    Ok(StepResult::Tickets(tickets))
}

pub async fn ai_analysis(adapters: &Adapters, request: &Request) -> StepOutcome {
    let candidates = expect_tickets(request)?;
    let conversation = adapters
        .helpdesk
        .get_conversation(&request.source_conversation_id)
        .await?;
    let decision = adapters
        .llm
        .find_or_create_ticket(candidates, &request.message_body, &conversation)
        .await?;
    Ok(StepResult::Decision(decision))
}

pub async fn create_or_update_tracker(adapters: &Adapters, request: &Request) -> StepOutcome {
    match expect_decision(request)? {
        AIDecision::Existing { ticket } => {
            if ticket.contains_conversation(&request.source_conversation_url) {
                return Ok(StepResult::Ticket(ticket.clone()));
            }
            let mut linked = ticket.linked_conversation_list();
            linked.push(request.source_conversation_url.clone());
            let updated = adapters
                .knowledge_base
                .update_ticket(
                    &ticket.tracker_id,
                    TicketPatch {
                        linked_conversations: Some(linked.join(",")),
                        ..Default::default()
                    },
                )
                .await?;
            Ok(StepResult::Ticket(updated))
        }
        AIDecision::New(NewTicketSpec { title, summary, .. }) => {
            let created = adapters
                .knowledge_base
                .create_ticket(Ticket {
                    ticket_id: String::new(),
                    tracker_id: String::new(),
                    tracker_url: String::new(),
                    title: title.clone(),
                    summary: summary.clone(),
                    linked_conversations: Some(request.source_conversation_url.clone()),
                    chat_channel: None,
                })
                .await?;
            Ok(StepResult::Ticket(created))
        }
    }
}

pub async fn maybe_create_chat_channel(adapters: &Adapters, request: &Request) -> StepOutcome {
    let decision = expect_decision(request)?;
    let ticket = expect_ticket(request, StepType::CreateOrUpdateTracker)?;

    match decision {
        AIDecision::Existing { .. } => {
            let chat_channel = ticket.chat_channel.as_deref().unwrap_or_default();
            if chat_channel.is_empty() {
                return Err(Error::invalid_channel_url("ticket has no chat_channel"));
            }
            let channel_id = url_extract::extract_channel_id(chat_channel)?;
            Ok(StepResult::Channel(ChannelInfo {
                channel_id,
                url: chat_channel.to_string(),
            }))
        }
        AIDecision::New(NewTicketSpec { slug, .. }) => {
            let name = format!("{}-{}", ticket.ticket_id, slug).to_lowercase();
            let channel = adapters.chat.create_channel(&name).await?;
            Ok(StepResult::Channel(channel))
        }
    }
}

pub async fn maybe_update_tracker_with_chat(adapters: &Adapters, request: &Request) -> StepOutcome {
    let ticket = expect_ticket(request, StepType::CreateOrUpdateTracker)?;
    let channel = expect_channel(request)?;

    if ticket.chat_channel.as_deref() == Some(channel.url.as_str()) {
        return Ok(StepResult::Ticket(ticket.clone()));
    }

    let updated = adapters
        .knowledge_base
        .update_ticket(
            &ticket.tracker_id,
            TicketPatch {
                chat_channel: Some(channel.url.clone()),
                ..Default::default()
            },
        )
        .await?;
    Ok(StepResult::Ticket(updated))
}

pub async fn add_operators_to_chat(adapters: &Adapters, request: &Request) -> StepOutcome {
    let decision = expect_decision(request)?;
    let channel = expect_channel(request)?;
    let ticket = expect_ticket(request, StepType::MaybeUpdateTrackerWithChat)?;

    let operators = adapters
        .helpdesk
        .get_participating_operators(&request.source_conversation_id)
        .await?;
    let chat_users = adapters.chat.list_all_users().await?;
    let targets = match_users(&operators, &chat_users);

    match decision {
        AIDecision::Existing { .. } => {
            let existing = adapters.chat.list_channel_members(&channel.channel_id).await?;
            let existing_ids: std::collections::HashSet<&str> =
                existing.iter().map(|u| u.id.as_str()).collect();
            let new_targets: Vec<String> = targets
                .into_iter()
                .filter(|id| !existing_ids.contains(id.as_str()))
                .collect();
            if !new_targets.is_empty() {
                adapters.chat.invite_users(&channel.channel_id, &new_targets).await?;
            }
        }
        AIDecision::New { .. } => {
            if !targets.is_empty() {
                adapters.chat.invite_users(&channel.channel_id, &targets).await?;
            }
            adapters
                .chat
                .set_channel_topic(&channel.channel_id, &ticket.tracker_url)
                .await?;
        }
    }

    Ok(StepResult::Unit)
}
