//! Agent session core: turn history, session loop, events, provider
//! profiles, and subagents.

mod events;
mod profiles;
mod session;
mod subagent;
mod turns;

pub use events::{EventEmitter, EventKind, SessionEvent};
pub use profiles::{
    ProviderProfile, anthropic_profile, build_default_registry, gemini_profile, openai_profile,
};
pub use session::{
    ModelClient, Session, SessionConfig, SessionState, convert_history_to_messages, detect_loop,
};
pub use subagent::{SessionFactory, SubAgentResult, SubagentManager, SubagentStatus};
pub use turns::{
    AssistantTurn, SteeringTurn, SystemTurn, ToolResultsTurn, Turn, UserTurn,
};
