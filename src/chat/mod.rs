//! Lead-capture chat — stage machine, sessions and the widget endpoints.

pub mod machine;
pub mod model;
pub mod routes;
pub mod script;
pub mod session;
pub mod sink;
pub mod stage;

pub use machine::{ConversationState, StageMachine, Turn};
pub use model::{LeadPayload, LeadRecord, Message, Role};
pub use script::Script;
pub use session::{ChatReply, ChatSession, SessionRegistry, TypingDelay};
pub use sink::{HttpLeadSink, LeadSink, StoreLeadSink};
pub use stage::ConversationStage;
