//! Chat sessions — async driver around the stage machine.
//!
//! A [`ChatSession`] owns one conversation. It serializes turns (a second
//! message is refused while the previous one is still being answered),
//! simulates the bot typing, and performs the lead hand-off once the
//! conversation completes. Sessions live only in memory, in a
//! [`SessionRegistry`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::machine::{ConversationState, StageMachine};
use super::model::Message;
use super::script::HandoffOutcome;
use super::sink::LeadSink;
use super::stage::ConversationStage;
use crate::config::ChatConfig;
use crate::error::ChatError;

/// Simulated "bot is typing" pause before replies are released.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypingDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl TypingDelay {
    /// No pause at all (tests).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Draw one pause: `base` plus a uniform random share of `jitter`.
    pub fn sample(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base + Duration::from_millis(extra)
    }
}

/// What a client gets back after a turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub stage: ConversationStage,
    /// Bot messages produced by this turn, in order.
    pub messages: Vec<Message>,
    /// Suggested answers for the stage the conversation is now on.
    pub quick_replies: Vec<String>,
}

struct SessionInner {
    state: ConversationState,
    /// A turn (typing pause and/or hand-off) is in flight.
    busy: bool,
    last_active: Instant,
}

/// One visitor's conversation.
pub struct ChatSession {
    id: Uuid,
    machine: Arc<StageMachine>,
    sink: Arc<dyn LeadSink>,
    delay: TypingDelay,
    inner: Mutex<SessionInner>,
}

impl ChatSession {
    /// Open a new conversation and return it together with the greeting.
    pub fn start(
        machine: Arc<StageMachine>,
        sink: Arc<dyn LeadSink>,
        delay: TypingDelay,
        page_url: impl Into<String>,
    ) -> (Arc<Self>, ChatReply) {
        let id = Uuid::new_v4();
        let turn = machine.start(ConversationState::new(page_url));
        let reply = ChatReply {
            session_id: id,
            stage: turn.state.stage,
            messages: turn.emitted,
            quick_replies: machine.quick_replies(turn.state.stage).to_vec(),
        };
        let session = Arc::new(Self {
            id,
            machine,
            sink,
            delay,
            inner: Mutex::new(SessionInner {
                state: turn.state,
                busy: false,
                last_active: Instant::now(),
            }),
        });
        info!(session_id = %id, "Chat session started");
        (session, reply)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current conversation state.
    pub async fn snapshot(&self) -> ConversationState {
        self.inner.lock().await.state.clone()
    }

    /// Whether a turn is currently in flight.
    pub async fn is_busy(&self) -> bool {
        self.inner.lock().await.busy
    }

    async fn idle_for(&self) -> Duration {
        self.inner.lock().await.last_active.elapsed()
    }

    /// Submit one visitor answer.
    ///
    /// Fails with [`ChatError::Busy`] while a previous turn is in flight. The
    /// turn itself runs on its own task, so a caller that stops waiting does
    /// not leave the session stuck.
    pub async fn submit(self: &Arc<Self>, input: &str) -> Result<ChatReply, ChatError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let (mut messages, handoff, epoch) = {
            let mut inner = self.inner.lock().await;
            if inner.busy {
                return Err(ChatError::Busy);
            }
            let state = std::mem::take(&mut inner.state);
            let turn = self.machine.submit_answer(state, input);
            inner.state = turn.state;
            inner.busy = true;
            inner.last_active = Instant::now();
            debug!(session_id = %self.id, stage = %inner.state.stage, "Answer applied");
            (turn.emitted, turn.handoff, inner.state.epoch)
        };

        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let pause = session.delay.sample();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let outcome = match handoff {
                Some(payload) => Some(match session.sink.submit(&payload).await {
                    Ok(()) => HandoffOutcome::Saved,
                    Err(e) => {
                        warn!(session_id = %session.id, error = %e, "Lead hand-off failed");
                        HandoffOutcome::Failed
                    }
                }),
                None => None,
            };

            let mut inner = session.inner.lock().await;
            if inner.state.epoch != epoch {
                debug!(session_id = %session.id, "Conversation was reset; dropping stale turn");
                return None;
            }
            if let Some(outcome) = outcome {
                let state = std::mem::take(&mut inner.state);
                let turn = session.machine.resolve_handoff(state, outcome);
                inner.state = turn.state;
                messages.extend(turn.emitted);
                info!(session_id = %session.id, ?outcome, "Chat lead handed off");
            }
            inner.busy = false;
            Some((inner.state.stage, messages))
        });

        let (stage, messages) = match task.await {
            Ok(Some(done)) => done,
            // Reset while this turn was in flight: nothing to surface.
            Ok(None) => (self.inner.lock().await.state.stage, Vec::new()),
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Chat turn task failed");
                let mut inner = self.inner.lock().await;
                if inner.state.epoch == epoch {
                    inner.busy = false;
                }
                return Err(ChatError::Aborted(e.to_string()));
            }
        };

        Ok(ChatReply {
            session_id: self.id,
            stage,
            messages,
            quick_replies: self.machine.quick_replies(stage).to_vec(),
        })
    }

    /// Throw the conversation away and greet again. Never waits on an
    /// in-flight hand-off.
    pub async fn reset(&self) -> ChatReply {
        let mut inner = self.inner.lock().await;
        let state = std::mem::take(&mut inner.state);
        let turn = self.machine.reset(state);
        inner.state = turn.state;
        inner.busy = false;
        inner.last_active = Instant::now();
        info!(session_id = %self.id, epoch = inner.state.epoch, "Chat session reset");
        ChatReply {
            session_id: self.id,
            stage: inner.state.stage,
            messages: turn.emitted,
            quick_replies: self.machine.quick_replies(inner.state.stage).to_vec(),
        }
    }
}

/// In-memory table of open chat sessions.
pub struct SessionRegistry {
    machine: Arc<StageMachine>,
    sink: Arc<dyn LeadSink>,
    delay: TypingDelay,
    sessions: RwLock<HashMap<Uuid, Arc<ChatSession>>>,
}

impl SessionRegistry {
    pub fn new(machine: StageMachine, sink: Arc<dyn LeadSink>, delay: TypingDelay) -> Arc<Self> {
        Arc::new(Self {
            machine: Arc::new(machine),
            sink,
            delay,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Registry configured from [`ChatConfig`].
    pub fn from_config(config: &ChatConfig, sink: Arc<dyn LeadSink>) -> Arc<Self> {
        let script = super::script::Script::with_fallback(config.fallback_email.clone());
        Self::new(
            StageMachine::new(script),
            sink,
            TypingDelay::new(config.typing_base, config.typing_jitter),
        )
    }

    /// Start a session that is not tracked by the registry (WebSocket chats
    /// own their session for the lifetime of the connection).
    pub fn open_detached(&self, page_url: impl Into<String>) -> (Arc<ChatSession>, ChatReply) {
        ChatSession::start(
            Arc::clone(&self.machine),
            Arc::clone(&self.sink),
            self.delay,
            page_url,
        )
    }

    /// Start and register a new session.
    pub async fn open(&self, page_url: impl Into<String>) -> ChatReply {
        let (session, reply) = self.open_detached(page_url);
        self.sessions.write().await.insert(session.id(), session);
        reply
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<ChatSession>, ChatError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))
    }

    /// Tear a session down. An in-flight hand-off finishes in the background
    /// but its result is never shown to anyone.
    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Chat session closed");
        }
        removed
    }

    /// Suggested answers for a stage.
    pub fn quick_replies(&self, stage: ConversationStage) -> Vec<String> {
        self.machine.quick_replies(stage).to_vec()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than `max_idle`. Returns how many went.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let sessions: Vec<Arc<ChatSession>> =
            self.sessions.read().await.values().cloned().collect();
        let mut stale = Vec::new();
        for session in sessions {
            if session.idle_for().await > max_idle && !session.is_busy().await {
                stale.push(session.id());
            }
        }
        if stale.is_empty() {
            return 0;
        }
        let mut map = self.sessions.write().await;
        for id in &stale {
            map.remove(id);
        }
        info!(count = stale.len(), "Pruned idle chat sessions");
        stale.len()
    }
}

/// Spawn a background task that prunes idle sessions every `interval`.
pub fn spawn_idle_sweep(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            registry.prune_idle(max_idle).await;
        }
    })
}
