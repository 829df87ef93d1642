//! Structured messages from the page, and push payloads.

use serde::{Deserialize, Serialize};

use crate::Error;

/// A message posted by the page, tagged by `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate a waiting worker now. No reply.
    SkipWaiting,
    /// Reply with the current generation name.
    GetVersion,
    /// Delete the current generation.
    ClearCache,
}

impl ClientMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipWaiting => "SKIP_WAITING",
            Self::GetVersion => "GET_VERSION",
            Self::ClearCache => "CLEAR_CACHE",
        }
    }
}

impl std::str::FromStr for ClientMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SKIP_WAITING" => Ok(Self::SkipWaiting),
            "GET_VERSION" => Ok(Self::GetVersion),
            "CLEAR_CACHE" => Ok(Self::ClearCache),
            other => Err(Error::InvalidInput(format!("unknown message type: {other}"))),
        }
    }
}

/// Reply sent back over the message port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum MessageReply {
    Version { version: String },
    Cleared { success: bool },
}

const DEFAULT_TITLE: &str = "Travel Planner";
const DEFAULT_BODY: &str = "Your itinerary has new updates.";
const ICON: &str = "/icons/icon-192.png";
const TAG: &str = "travel-update";

/// A notification to display for a push delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tag: String,
}

#[derive(Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
}

impl Notification {
    /// Build from a push payload.
    ///
    /// JSON objects may carry `title` and `body`; any other text becomes the
    /// body. Missing or blank fields get the default copy.
    pub fn from_push(payload: Option<&str>) -> Self {
        let payload = payload.map(str::trim).filter(|p| !p.is_empty());

        let (title, body) = match payload {
            None => (None, None),
            Some(text) => match serde_json::from_str::<PushPayload>(text) {
                Ok(parsed) => (parsed.title, parsed.body),
                Err(_) => (None, Some(text.to_string())),
            },
        };

        Self {
            title: non_blank(title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: non_blank(body).unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: ICON.to_string(),
            tag: TAG.to_string(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"GET_VERSION"}"#).unwrap();
        assert_eq!(msg, ClientMessage::GetVersion);
        assert_eq!(serde_json::to_string(&ClientMessage::SkipWaiting).unwrap(), r#"{"type":"SKIP_WAITING"}"#);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"PING"}"#).is_err());
    }

    #[test]
    fn test_message_from_str() {
        assert_eq!("CLEAR_CACHE".parse::<ClientMessage>().unwrap(), ClientMessage::ClearCache);
        assert!(matches!("clear_cache".parse::<ClientMessage>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_reply_wire_format() {
        let version = MessageReply::Version { version: "travel-planner-v1".into() };
        assert_eq!(serde_json::to_string(&version).unwrap(), r#"{"version":"travel-planner-v1"}"#);
        let cleared = MessageReply::Cleared { success: true };
        assert_eq!(serde_json::to_string(&cleared).unwrap(), r#"{"success":true}"#);
    }

    #[test]
    fn test_push_json_payload() {
        let n = Notification::from_push(Some(r#"{"title":"Gate change","body":"Now boarding at B12"}"#));
        assert_eq!(n.title, "Gate change");
        assert_eq!(n.body, "Now boarding at B12");
        assert_eq!(n.tag, TAG);
    }

    #[test]
    fn test_push_text_and_empty_payloads() {
        let text = Notification::from_push(Some("Rain expected in Yokohama"));
        assert_eq!(text.title, DEFAULT_TITLE);
        assert_eq!(text.body, "Rain expected in Yokohama");

        let empty = Notification::from_push(None);
        assert_eq!(empty.body, DEFAULT_BODY);

        let partial = Notification::from_push(Some(r#"{"title":"  "}"#));
        assert_eq!(partial.title, DEFAULT_TITLE);
        assert_eq!(partial.body, DEFAULT_BODY);
    }
}
