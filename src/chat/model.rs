//! Lead record, transcript and hand-off payload models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::ConversationStage;

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Bot,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bot => write!(f, "bot"),
            Self::User => write!(f, "user"),
        }
    }
}

/// A single chat transcript entry. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Transcript entry as transmitted with a lead (no timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for TranscriptEntry {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// Lead data accumulated across the conversation.
///
/// Every field starts absent and is written exactly once, by the stage
/// that collects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_interest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LeadRecord {
    /// True when no field has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.service_interest.is_none()
            && self.budget.is_none()
            && self.message.is_none()
    }

    /// The slot a stage writes into, if the stage collects a field.
    pub(crate) fn slot_mut(&mut self, stage: ConversationStage) -> Option<&mut Option<String>> {
        match stage {
            ConversationStage::Name => Some(&mut self.name),
            ConversationStage::Email => Some(&mut self.email),
            ConversationStage::Service => Some(&mut self.service_interest),
            ConversationStage::Budget => Some(&mut self.budget),
            ConversationStage::Details => Some(&mut self.message),
            ConversationStage::Greeting | ConversationStage::Complete => None,
        }
    }

    /// Display name for personalized prompts.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("there")
    }
}

/// Payload handed to the lead persistence collaborator.
///
/// `phone` and `company` are never collected by the chat flow and are always
/// sent empty; they are kept for compatibility with the lead form shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub service_interest: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation: Vec<TranscriptEntry>,
    #[serde(default)]
    pub page_url: String,
}

impl LeadPayload {
    /// Assemble the payload from a captured record and its transcript.
    pub fn from_record(record: &LeadRecord, transcript: &[Message], page_url: &str) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            name: field(&record.name),
            email: field(&record.email),
            phone: String::new(),
            company: String::new(),
            service_interest: field(&record.service_interest),
            budget: field(&record.budget),
            message: field(&record.message),
            conversation: transcript.iter().map(TranscriptEntry::from).collect(),
            page_url: page_url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_empty() {
        let record = LeadRecord::default();
        assert!(record.is_empty());
        assert_eq!(record.display_name(), "there");
    }

    #[test]
    fn payload_uses_camel_case_and_drops_timestamps() {
        let record = LeadRecord {
            name: Some("Alex".into()),
            email: Some("alex@example.com".into()),
            service_interest: Some("Web Development".into()),
            budget: Some("$1,000 - $5,000".into()),
            message: Some(String::new()),
        };
        let transcript = vec![Message::bot("What's your name?"), Message::user("Alex")];
        let payload = LeadPayload::from_record(&record, &transcript, "https://folio.dev/");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["serviceInterest"], "Web Development");
        assert_eq!(json["pageUrl"], "https://folio.dev/");
        assert_eq!(json["phone"], "");
        assert_eq!(json["company"], "");
        assert_eq!(json["message"], "");
        assert_eq!(json["conversation"][0]["role"], "bot");
        assert_eq!(json["conversation"][1]["content"], "Alex");
        assert!(json["conversation"][0].get("timestamp").is_none());
    }

    #[test]
    fn payload_tolerates_missing_fields() {
        let payload: LeadPayload =
            serde_json::from_str(r#"{"name":"Sam","email":"sam@x.io"}"#).unwrap();
        assert_eq!(payload.name, "Sam");
        assert!(payload.conversation.is_empty());
        assert!(payload.page_url.is_empty());
    }

    #[test]
    fn slots_cover_collecting_stages() {
        let mut record = LeadRecord::default();
        assert!(record.slot_mut(ConversationStage::Greeting).is_none());
        assert!(record.slot_mut(ConversationStage::Complete).is_none());
        *record.slot_mut(ConversationStage::Budget).unwrap() = Some("$10,000+".into());
        assert_eq!(record.budget.as_deref(), Some("$10,000+"));
    }
}
