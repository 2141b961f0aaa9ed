//! Lead conversation stage machine.
//!
//! The machine is pure: every operation takes a [`ConversationState`] by
//! value and returns a [`Turn`] holding the next state, the bot messages
//! emitted on the way and, at most once per conversation, the lead payload
//! that must be handed off for persistence. Timing, locking and I/O live in
//! [`super::session`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::{LeadPayload, LeadRecord, Message};
use super::script::{HandoffOutcome, Script, is_skip, is_valid_email};
use super::stage::ConversationStage;

/// Complete state of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub stage: ConversationStage,
    pub lead: LeadRecord,
    /// Append-only transcript, bot and user messages in order.
    pub transcript: Vec<Message>,
    /// Page the conversation was opened on.
    pub page_url: String,
    /// Bumped on every reset so late hand-off results can be recognized.
    pub epoch: u64,
    /// Set between the details answer and the hand-off result.
    pub handoff_pending: bool,
}

impl ConversationState {
    /// Fresh, not yet started conversation.
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            ..Default::default()
        }
    }
}

/// Result of driving the machine one step.
#[derive(Debug, Clone)]
pub struct Turn {
    pub state: ConversationState,
    /// Bot messages produced by this step (already appended to the transcript).
    pub emitted: Vec<Message>,
    /// Lead to hand off; only produced by the details answer.
    pub handoff: Option<LeadPayload>,
}

impl Turn {
    fn quiet(state: ConversationState) -> Self {
        Self {
            state,
            emitted: Vec::new(),
            handoff: None,
        }
    }
}

/// Drives conversations through the fixed question sequence.
#[derive(Debug, Clone, Default)]
pub struct StageMachine {
    script: Script,
}

impl StageMachine {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Quick replies for the stage the conversation is currently on.
    pub fn quick_replies(&self, stage: ConversationStage) -> &[String] {
        self.script.quick_replies(stage)
    }

    /// Open the conversation: move to `Name` and greet.
    pub fn start(&self, mut state: ConversationState) -> Turn {
        state.stage = ConversationStage::Name;
        let mut turn = Turn::quiet(state);
        self.emit_prompt(&mut turn);
        turn
    }

    /// Discard everything captured so far and start over.
    ///
    /// The page URL survives; the epoch is bumped so that an in-flight
    /// hand-off from the discarded conversation is ignored.
    pub fn reset(&self, state: ConversationState) -> Turn {
        let fresh = ConversationState {
            page_url: state.page_url,
            epoch: state.epoch.wrapping_add(1),
            ..Default::default()
        };
        self.start(fresh)
    }

    /// Apply one visitor answer to the current stage.
    ///
    /// Blank input is ignored entirely. Only the email stage validates its
    /// input; every other stage accepts any non-empty text.
    pub fn submit_answer(&self, state: ConversationState, raw_input: &str) -> Turn {
        let input = raw_input.trim();
        if input.is_empty() {
            return Turn::quiet(state);
        }

        let mut turn = if state.stage == ConversationStage::Greeting {
            self.start(state)
        } else {
            Turn::quiet(state)
        };
        turn.state.transcript.push(Message::user(input));

        let stage = turn.state.stage;
        if stage.is_terminal() {
            let text = self.script.render(&self.script.already_complete, &turn.state.lead);
            self.emit(&mut turn, text);
            return turn;
        }
        match stage {
            ConversationStage::Greeting | ConversationStage::Complete => {
                unreachable!("conversation is started and not complete")
            }
            ConversationStage::Name
            | ConversationStage::Service
            | ConversationStage::Budget => {
                self.capture(&mut turn, stage, input.to_string());
                self.advance(&mut turn);
                self.emit_prompt(&mut turn);
            }
            ConversationStage::Email => {
                if is_valid_email(input) {
                    self.capture(&mut turn, stage, input.to_string());
                    self.advance(&mut turn);
                    self.emit_prompt(&mut turn);
                } else {
                    debug!("Rejected malformed email answer");
                    let text = self.script.render(&self.script.invalid_email, &turn.state.lead);
                    self.emit(&mut turn, text);
                }
            }
            ConversationStage::Details => {
                let message = if is_skip(input) {
                    String::new()
                } else {
                    input.to_string()
                };
                self.capture(&mut turn, stage, message);
                self.advance(&mut turn);
                turn.state.handoff_pending = true;
                turn.handoff = Some(LeadPayload::from_record(
                    &turn.state.lead,
                    &turn.state.transcript,
                    &turn.state.page_url,
                ));
            }
        }
        turn
    }

    /// Report the outcome of the hand-off to the visitor.
    ///
    /// Never changes the stage. Ignored unless a hand-off is pending.
    pub fn resolve_handoff(&self, state: ConversationState, outcome: HandoffOutcome) -> Turn {
        let mut turn = Turn::quiet(state);
        if !turn.state.handoff_pending {
            debug!(?outcome, "No hand-off pending; outcome ignored");
            return turn;
        }
        turn.state.handoff_pending = false;
        let text = self
            .script
            .render(self.script.handoff_reply(outcome), &turn.state.lead);
        self.emit(&mut turn, text);
        turn
    }

    fn capture(&self, turn: &mut Turn, stage: ConversationStage, value: String) {
        if let Some(slot) = turn.state.lead.slot_mut(stage) {
            if slot.is_some() {
                warn!(%stage, "Lead field already captured; keeping first value");
                return;
            }
            *slot = Some(value);
        }
    }

    fn advance(&self, turn: &mut Turn) {
        if let Some(next) = turn.state.stage.next() {
            debug!(from = %turn.state.stage, to = %next, "Conversation advanced");
            turn.state.stage = next;
        }
    }

    fn emit_prompt(&self, turn: &mut Turn) {
        if let Some(template) = self.script.prompt_for(turn.state.stage) {
            let text = self.script.render(template, &turn.state.lead);
            self.emit(turn, text);
        }
    }

    fn emit(&self, turn: &mut Turn, text: String) {
        let msg = Message::bot(text);
        turn.state.transcript.push(msg.clone());
        turn.emitted.push(msg);
    }
}
