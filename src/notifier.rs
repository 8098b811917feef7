//! Done Notifier (§4.5): given a completed tracker item, posts a completion
//! notice to its chat channel and every linked helpdesk conversation.
//! Per-target failures are logged, never surfaced. The overall result is
//! always success (§7, "The Done Notifier never surfaces errors upward").

use tracing::warn;

use crate::adapters::{Chat, Helpdesk};
use crate::models::Ticket;
use crate::url_extract;

pub async fn notify_done(
    ticket: &Ticket,
    default_channel_id: &str,
    chat: &dyn Chat,
    helpdesk: &dyn Helpdesk,
) {
    let message = format!("Ticket {} has been marked as Done.", ticket.ticket_id);

    match resolve_notification_channel(ticket, default_channel_id) {
        Some(channel_id) => {
            if let Err(e) = chat.post_message(&channel_id, &message).await {
                warn!(
                    ticket_id = %ticket.ticket_id,
                    channel_id = %channel_id,
                    error = %e,
                    "failed to post done notice to chat"
                );
            }
        }
        None => {
            warn!(
                ticket_id = %ticket.ticket_id,
                "no chat channel to notify for done ticket; skipping"
            );
        }
    }

    for conversation in ticket.linked_conversation_list() {
        let conversation_id = url_extract::extract_conversation_id(&conversation);
        if let Err(e) = helpdesk.reply_to_conversation(&conversation_id, &message).await {
            warn!(
                ticket_id = %ticket.ticket_id,
                conversation_id = %conversation_id,
                error = %e,
                "failed to reply to helpdesk conversation with done notice"
            );
        }
    }
}

/// Channel string accepted as either a chat-service URL or a raw channel id
/// (§4.5). Empty/null and malformed inputs fall back to `default_channel_id`
/// when one is configured, else the notice is skipped; never an error.
fn resolve_notification_channel(ticket: &Ticket, default_channel_id: &str) -> Option<String> {
    let chat_channel = ticket.chat_channel.as_deref().unwrap_or_default().trim();

    if chat_channel.is_empty() {
        return fall_back_to_default(ticket, default_channel_id);
    }

    match url_extract::extract_channel_id(chat_channel) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(
                ticket_id = %ticket.ticket_id,
                error = %e,
                "ticket chat_channel is malformed, skipping chat notice"
            );
            fall_back_to_default(ticket, default_channel_id)
        }
    }
}

fn fall_back_to_default(ticket: &Ticket, default_channel_id: &str) -> Option<String> {
    let default_channel_id = default_channel_id.trim();
    if default_channel_id.is_empty() {
        return None;
    }
    warn!(
        ticket_id = %ticket.ticket_id,
        channel_id = %default_channel_id,
        "falling back to default done-notification channel"
    );
    Some(default_channel_id.to_string())
}
