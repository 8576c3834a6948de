//! Subagent manager: depth-bounded nested sessions running as
//! background tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agent::session::Session;
use crate::error::{Error, Result};

/// Builds a child session at the given depth.
pub type SessionFactory = Arc<dyn Fn(u32) -> Session + Send + Sync>;

/// Lifecycle state of one subagent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubagentStatus {
    Running,
    Completed,
    Failed,
}

/// Outcome reported by [`SubagentManager::wait`].
#[derive(Debug, Clone)]
pub struct SubAgentResult {
    /// The child session's final assistant text.
    pub output: String,
    pub success: bool,
    /// History length of the child session.
    pub turns_used: usize,
}

struct SubagentHandle {
    session: Arc<Mutex<Session>>,
    task: Option<JoinHandle<Result<()>>>,
    status: SubagentStatus,
}

/// Spawns and tracks child sessions, bounded by a maximum nesting depth.
pub struct SubagentManager {
    factory: SessionFactory,
    max_depth: u32,
    current_depth: u32,
    agents: HashMap<String, SubagentHandle>,
}

impl SubagentManager {
    pub fn new(factory: SessionFactory, max_depth: u32, current_depth: u32) -> Self {
        Self {
            factory,
            max_depth,
            current_depth,
            agents: HashMap::new(),
        }
    }

    /// Start a child session on `task` in the background, returning its
    /// handle id. Fails when the depth bound is reached.
    pub async fn spawn(&mut self, task: &str) -> Result<String> {
        if self.current_depth >= self.max_depth {
            return Err(Error::SubagentDepth);
        }

        let agent_id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new((self.factory)(self.current_depth + 1)));
        let run_session = session.clone();
        let input = task.to_string();
        let run_task =
            tokio::spawn(async move { run_session.lock().await.process_input(&input).await });

        log::debug!("spawned subagent {agent_id} at depth {}", self.current_depth + 1);
        self.agents.insert(
            agent_id.clone(),
            SubagentHandle {
                session,
                task: Some(run_task),
                status: SubagentStatus::Running,
            },
        );
        Ok(agent_id)
    }

    /// Send another input to a subagent: waits for any in-flight task,
    /// then starts a new one.
    pub async fn send(&mut self, agent_id: &str, message: &str) -> Result<()> {
        let handle = self.get_mut(agent_id)?;
        if let Some(task) = handle.task.take() {
            let _ = task.await;
        }

        let run_session = handle.session.clone();
        let input = message.to_string();
        handle.task =
            Some(tokio::spawn(async move {
                run_session.lock().await.process_input(&input).await
            }));
        handle.status = SubagentStatus::Running;
        Ok(())
    }

    /// Wait for a subagent's current task and report its outcome.
    pub async fn wait(&mut self, agent_id: &str) -> Result<SubAgentResult> {
        let handle = self.get_mut(agent_id)?;

        let mut success = true;
        if let Some(task) = handle.task.take() {
            success = matches!(task.await, Ok(Ok(())));
        }
        handle.status = if success {
            SubagentStatus::Completed
        } else {
            SubagentStatus::Failed
        };

        let session = handle.session.lock().await;
        Ok(SubAgentResult {
            output: session.last_assistant_text(),
            success,
            turns_used: session.history().len(),
        })
    }

    /// Cancel a subagent if still running and drop its handle. Returns
    /// `"closed"`, or `"already_closed"` for unknown ids.
    pub async fn close(&mut self, agent_id: &str) -> &'static str {
        match self.agents.remove(agent_id) {
            None => "already_closed",
            Some(mut handle) => {
                if let Some(task) = handle.task.take() {
                    if !task.is_finished() {
                        task.abort();
                    }
                    // Cancellation surfaces as a JoinError; swallow it.
                    let _ = task.await;
                }
                "closed"
            }
        }
    }

    /// Current status of a subagent, if known.
    pub fn status(&self, agent_id: &str) -> Option<SubagentStatus> {
        self.agents.get(agent_id).map(|handle| handle.status)
    }

    fn get_mut(&mut self, agent_id: &str) -> Result<&mut SubagentHandle> {
        self.agents
            .get_mut(agent_id)
            .ok_or_else(|| Error::configuration(format!("Unknown agent: {agent_id}")))
    }
}
