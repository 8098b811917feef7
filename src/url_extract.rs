//! Extractors for the two external URL shapes named in §6.

use crate::error::Error;
use once_cell::sync::Lazy;
use regex::Regex;

static CHANNEL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9]+$").expect("static regex is valid")
});

/// Extracts `{CHANNEL_ID}` from `https://app.<chat>.com/.../archives/{CHANNEL_ID}/...`.
/// A bare channel id (no URL) round-trips to itself.
pub fn extract_channel_id(channel: &str) -> Result<String, Error> {
    if !channel.contains("://") {
        if CHANNEL_ID.is_match(channel) {
            return Ok(channel.to_string());
        }
        return Err(Error::invalid_channel_url(format!(
            "not a URL and not a bare channel id: {channel}"
        )));
    }

    let segments: Vec<&str> = channel.trim_end_matches('/').split('/').collect();
    segments
        .iter()
        .position(|s| *s == "archives")
        .and_then(|idx| segments.get(idx + 1))
        .map(|s| s.to_string())
        .ok_or_else(|| Error::invalid_channel_url(channel.to_string()))
}

/// Extracts `{CONVERSATION_ID}` from
/// `https://app.<helpdesk>.io/a/apps/{APP}/conversations/{CONVERSATION_ID}`,
/// or returns the input verbatim if it isn't URL-shaped.
pub fn extract_conversation_id(conversation: &str) -> String {
    if !conversation.contains("://") {
        return conversation.trim().to_string();
    }
    conversation
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(conversation)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_channel_id_from_archive_url() {
        assert_eq!(
            extract_channel_id("https://app.x.com/archives/ABC123/xyz").unwrap(),
            "ABC123"
        );
    }

    #[test]
    fn bare_channel_id_round_trips() {
        assert_eq!(extract_channel_id("ABC123").unwrap(), "ABC123");
    }

    #[test]
    fn rejects_malformed_channel_url() {
        assert!(extract_channel_id("https://app.x.com/not-an-archive/ABC123").is_err());
    }

    #[test]
    fn extracts_last_path_segment_for_conversation_url() {
        assert_eq!(
            extract_conversation_id("https://app.hd.io/a/apps/inbox/conversations/999"),
            "999"
        );
    }

    #[test]
    fn conversation_id_passes_through_verbatim_when_not_url_shaped() {
        assert_eq!(extract_conversation_id("999"), "999");
    }
}
