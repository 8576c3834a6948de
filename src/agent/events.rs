//! Session event types and the subscriber-based emitter.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The observable surface of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    UserInput,
    AssistantTextStart,
    AssistantTextDelta,
    AssistantTextEnd,
    ToolCallStart,
    ToolCallOutputDelta,
    ToolCallEnd,
    SteeringInjected,
    TurnLimit,
    LoopDetection,
    Error,
}

/// One emitted session event.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub session_id: String,
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

type Subscriber = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Fan-out emitter. Cloning shares the subscriber list; events are
/// delivered synchronously, in subscription order.
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(callback));
    }

    /// Build and deliver an event. `data` must be a JSON object; other
    /// values are treated as empty.
    pub fn emit(&self, kind: EventKind, session_id: &str, data: Value) -> SessionEvent {
        let event = SessionEvent {
            kind,
            session_id: session_id.to_string(),
            data: data.as_object().cloned().unwrap_or_default(),
            timestamp: Utc::now(),
        };

        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for subscriber in subscribers {
            subscriber(&event);
        }
        event
    }
}
