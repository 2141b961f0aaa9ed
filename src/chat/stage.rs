//! Conversation stages of the lead chat.

use serde::{Deserialize, Serialize};

/// The stages of the guided lead conversation.
///
/// Progresses linearly: Greeting → Name → Email → Service → Budget →
/// Details → Complete. A failed email check keeps the conversation on
/// `Email`; nothing ever moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    #[default]
    Greeting,
    Name,
    Email,
    Service,
    Budget,
    Details,
    Complete,
}

impl ConversationStage {
    /// Whether this stage is terminal (lead captured).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<ConversationStage> {
        use ConversationStage::*;
        match self {
            Greeting => Some(Name),
            Name => Some(Email),
            Email => Some(Service),
            Service => Some(Budget),
            Budget => Some(Details),
            Details => Some(Complete),
            Complete => None,
        }
    }
}

impl std::fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Greeting => "greeting",
            Self::Name => "name",
            Self::Email => "email",
            Self::Service => "service",
            Self::Budget => "budget",
            Self::Details => "details",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConversationStage; 7] = [
        ConversationStage::Greeting,
        ConversationStage::Name,
        ConversationStage::Email,
        ConversationStage::Service,
        ConversationStage::Budget,
        ConversationStage::Details,
        ConversationStage::Complete,
    ];

    #[test]
    fn next_walks_all_stages() {
        let mut current = ConversationStage::default();
        for expected in &ALL[1..] {
            let next = current.next().unwrap();
            assert_eq!(next, *expected);
            current = next;
        }
        assert!(current.is_terminal());
        assert!(current.next().is_none());
    }

    #[test]
    fn display_matches_serde() {
        for stage in ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(format!("\"{stage}\""), json, "mismatch for {stage:?}");
        }
    }
}
