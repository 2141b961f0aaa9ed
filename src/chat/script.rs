//! Bot copy, quick replies and input checks for the lead chat.
//!
//! Everything the bot says lives in a [`Script`] so the wording can be
//! swapped (or localized) without touching the stage machine. Templates may
//! use `{name}`, `{email}` and `{contact}` placeholders.

use std::sync::LazyLock;

use regex::Regex;

use super::model::LeadRecord;
use super::stage::ConversationStage;
use crate::config::DEFAULT_FALLBACK_EMAIL;

/// Literal keyword that leaves the project details empty.
pub const SKIP_KEYWORD: &str = "skip";

/// Suggested answers for the service stage.
pub const SERVICE_OPTIONS: &[&str] = &[
    "Web Development",
    "Mobile App Development",
    "UI/UX Design",
    "E-commerce Solutions",
    "SEO & Digital Marketing",
    "Other",
];

/// Suggested answers for the budget stage.
pub const BUDGET_OPTIONS: &[&str] = &[
    "Under $1,000",
    "$1,000 - $5,000",
    "$5,000 - $10,000",
    "$10,000+",
    "Not sure yet",
];

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(name|email|contact)\}").expect("valid placeholder pattern"));

/// Minimal email shape check: `something@something.something`, no whitespace.
///
/// Intentionally permissive; this is not RFC 5322 validation.
pub fn is_valid_email(input: &str) -> bool {
    EMAIL_SHAPE.is_match(input)
}

/// Whether a details answer means "leave the message empty".
pub fn is_skip(input: &str) -> bool {
    input.eq_ignore_ascii_case(SKIP_KEYWORD)
}

/// How the lead hand-off ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    Saved,
    Failed,
}

/// The bot's lines.
#[derive(Debug, Clone)]
pub struct Script {
    /// Opening prompt asking for the visitor's name.
    pub greeting: String,
    pub ask_email: String,
    pub invalid_email: String,
    pub ask_service: String,
    pub ask_budget: String,
    pub ask_details: String,
    pub handoff_saved: String,
    pub handoff_failed: String,
    /// Reply to anything typed after the conversation is complete.
    pub already_complete: String,
    /// Direct contact address offered when things go wrong.
    pub fallback_email: String,
    pub service_options: Vec<String>,
    pub budget_options: Vec<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self::with_fallback(DEFAULT_FALLBACK_EMAIL)
    }
}

impl Script {
    /// Default copy with a specific fallback contact address.
    pub fn with_fallback(fallback_email: impl Into<String>) -> Self {
        Self {
            greeting: "Hi there! I can help you get a project started in about a minute. \
                       First, what's your name?"
                .to_string(),
            ask_email: "Nice to meet you, {name}! What's the best email address to reach you?"
                .to_string(),
            invalid_email: "Hmm, that doesn't look like a valid email address. \
                            Could you double-check it and send it again?"
                .to_string(),
            ask_service: "Thanks! Which service are you interested in? \
                          Pick one below or describe it in your own words."
                .to_string(),
            ask_budget: "Great choice. What budget range do you have in mind?".to_string(),
            ask_details: format!(
                "Almost done! Tell me a little about your project, or type \"{SKIP_KEYWORD}\" to finish."
            ),
            handoff_saved: "Thank you, {name}! Your details are in. \
                            We'll be in touch at {email} within one business day."
                .to_string(),
            handoff_failed: "Sorry {name}, something went wrong while saving your details. \
                             Please email us directly at {contact} and we'll get right back to you."
                .to_string(),
            already_complete: "This conversation is finished. Start a new chat to send another \
                               inquiry, or email us at {contact}."
                .to_string(),
            fallback_email: fallback_email.into(),
            service_options: SERVICE_OPTIONS.iter().map(|s| s.to_string()).collect(),
            budget_options: BUDGET_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Prompt emitted when the conversation enters `stage`.
    pub fn prompt_for(&self, stage: ConversationStage) -> Option<&str> {
        match stage {
            ConversationStage::Name => Some(self.greeting.as_str()),
            ConversationStage::Email => Some(self.ask_email.as_str()),
            ConversationStage::Service => Some(self.ask_service.as_str()),
            ConversationStage::Budget => Some(self.ask_budget.as_str()),
            ConversationStage::Details => Some(self.ask_details.as_str()),
            ConversationStage::Greeting | ConversationStage::Complete => None,
        }
    }

    /// Quick replies offered while the conversation sits on `stage`.
    pub fn quick_replies(&self, stage: ConversationStage) -> &[String] {
        match stage {
            ConversationStage::Service => self.service_options.as_slice(),
            ConversationStage::Budget => self.budget_options.as_slice(),
            _ => &[],
        }
    }

    /// Template for a hand-off outcome.
    pub fn handoff_reply(&self, outcome: HandoffOutcome) -> &str {
        match outcome {
            HandoffOutcome::Saved => self.handoff_saved.as_str(),
            HandoffOutcome::Failed => self.handoff_failed.as_str(),
        }
    }

    /// Fill template placeholders from the lead captured so far.
    ///
    /// Substitution is a single pass over the template, so visitor text is
    /// never expanded.
    pub fn render(&self, template: &str, record: &LeadRecord) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
                "name" => record.display_name().to_string(),
                "email" => record.email.clone().unwrap_or_default(),
                _ => self.fallback_email.clone(),
            })
            .into_owned()
    }
}
