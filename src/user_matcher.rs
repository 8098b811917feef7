//! Pure matching between helpdesk operators and chat-service users (§4.2).

use crate::models::{ChatUser, Operator};

fn normalise(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Matches operators to chat users by email (case-insensitive), falling back
/// to a normalised full-name match. Operators with no match are dropped.
/// Multiple operators matching the same chat user are deduplicated,
/// preserving first-seen order.
pub fn match_users(operators: &[Operator], chat_users: &[ChatUser]) -> Vec<String> {
    let mut matched = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for operator in operators {
        let operator_email = normalise(&operator.email);
        let operator_name = normalise(&operator.name);

        let found = chat_users.iter().find(|u| {
            u.email
                .as_deref()
                .map(|e| normalise(e) == operator_email)
                .unwrap_or(false)
        });

        let found = found.or_else(|| {
            chat_users.iter().find(|u| {
                u.name
                    .as_deref()
                    .map(|n| normalise(n) == operator_name)
                    .unwrap_or(false)
            })
        });

        if let Some(user) = found {
            if seen.insert(user.id.clone()) {
                matched.push(user.id.clone());
            }
        }
    }

    matched
}
