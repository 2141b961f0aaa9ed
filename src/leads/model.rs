//! Stored leads and contact messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::model::{LeadPayload, TranscriptEntry};
use crate::chat::script::is_valid_email;
use crate::error::ValidationError;

/// Follow-up state of a lead in the admin back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Closed,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Contacted => write!(f, "contacted"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown lead status: {other}")),
        }
    }
}

/// Where a lead came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    ChatWidget,
    Form,
}

impl std::fmt::Display for LeadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChatWidget => write!(f, "chat_widget"),
            Self::Form => write!(f, "form"),
        }
    }
}

impl std::str::FromStr for LeadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat_widget" => Ok(Self::ChatWidget),
            "form" => Ok(Self::Form),
            other => Err(format!("unknown lead source: {other}")),
        }
    }
}

/// A persisted lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub service_interest: String,
    pub budget: String,
    pub message: String,
    pub conversation: Vec<TranscriptEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Build a new lead from an intake payload.
    pub fn from_payload(payload: LeadPayload) -> Self {
        let source = if payload.conversation.is_empty() {
            LeadSource::Form
        } else {
            LeadSource::ChatWidget
        };
        let page_url = Some(payload.page_url).filter(|u| !u.is_empty());
        Self {
            id: Uuid::new_v4(),
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
            company: payload.company,
            service_interest: payload.service_interest,
            budget: payload.budget,
            message: payload.message,
            conversation: payload.conversation,
            page_url,
            source,
            status: LeadStatus::New,
            created_at: Utc::now(),
        }
    }

    /// Plain-text summary used in notification e-mails.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Name: {}", self.name),
            format!("Email: {}", self.email),
        ];
        for (label, value) in [
            ("Phone", &self.phone),
            ("Company", &self.company),
            ("Service", &self.service_interest),
            ("Budget", &self.budget),
        ] {
            if !value.is_empty() {
                lines.push(format!("{label}: {value}"));
            }
        }
        if let Some(ref url) = self.page_url {
            lines.push(format!("Page: {url}"));
        }
        lines.push(format!("Source: {}", self.source));
        if !self.message.is_empty() {
            lines.push(String::new());
            lines.push(self.message.clone());
        }
        lines.join("\n")
    }
}

/// Check an intake payload before it is stored.
pub fn validate_payload(payload: &LeadPayload) -> Result<(), ValidationError> {
    if payload.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if payload.email.trim().is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    if !is_valid_email(payload.email.trim()) {
        return Err(ValidationError::InvalidField {
            field: "email",
            reason: "not a valid email address".into(),
        });
    }
    Ok(())
}

/// Body of the contact form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ContactRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(ValidationError::InvalidField {
                field: "email",
                reason: "not a valid email address".into(),
            });
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::MissingField("message"));
        }
        Ok(())
    }
}

/// A persisted contact-form message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn from_request(req: ContactRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            subject: req
                .subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            message: req.message.trim().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::model::Role;

    fn payload(name: &str, email: &str) -> LeadPayload {
        LeadPayload {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_requires_name_and_email() {
        assert!(matches!(
            validate_payload(&payload("", "a@b.co")),
            Err(ValidationError::MissingField("name"))
        ));
        assert!(matches!(
            validate_payload(&payload("Alex", " ")),
            Err(ValidationError::MissingField("email"))
        ));
        assert!(matches!(
            validate_payload(&payload("Alex", "alex@example")),
            Err(ValidationError::InvalidField { field: "email", .. })
        ));
        assert!(validate_payload(&payload("Alex", "alex@example.com")).is_ok());
    }

    #[test]
    fn source_follows_transcript_presence() {
        let form = Lead::from_payload(payload("Alex", "alex@example.com"));
        assert_eq!(form.source, LeadSource::Form);
        assert!(form.page_url.is_none());

        let mut chat = payload("Alex", "alex@example.com");
        chat.conversation.push(TranscriptEntry {
            role: Role::User,
            content: "Alex".into(),
        });
        chat.page_url = "https://folio.dev/".into();
        let chat = Lead::from_payload(chat);
        assert_eq!(chat.source, LeadSource::ChatWidget);
        assert_eq!(chat.page_url.as_deref(), Some("https://folio.dev/"));
        assert_eq!(chat.status, LeadStatus::New);
    }

    #[test]
    fn summary_skips_empty_fields() {
        let mut p = payload("Alex", "alex@example.com");
        p.budget = "$10,000+".into();
        let summary = Lead::from_payload(p).summary();
        assert!(summary.contains("Budget: $10,000+"));
        assert!(!summary.contains("Phone"));
        assert!(!summary.contains("Company"));
    }

    #[test]
    fn status_display_matches_serde() {
        for status in [LeadStatus::New, LeadStatus::Contacted, LeadStatus::Closed] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
            assert_eq!(status.to_string().parse::<LeadStatus>().unwrap(), status);
        }
        assert!("archived".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn contact_request_validation() {
        let mut req = ContactRequest {
            name: "Sam".into(),
            email: "sam@studio.io".into(),
            subject: Some("  ".into()),
            message: "Hello!".into(),
        };
        assert!(req.validate().is_ok());
        let msg = ContactMessage::from_request(req.clone());
        assert!(msg.subject.is_none());

        req.message = "   ".into();
        assert!(matches!(
            req.validate(),
            Err(ValidationError::MissingField("message"))
        ));
    }
}
