//! Subagent manager lifecycle tests with scripted child sessions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use agentry::{
    ContentPart, Error, FinishReason, LocalExecutionEnvironment, Message, ModelClient, Request,
    Response, Result, Role, Session, SessionFactory, SubagentManager, SubagentStatus, Usage,
    openai_profile,
};

struct FakeClient {
    responses: Mutex<VecDeque<Response>>,
}

impl FakeClient {
    fn new(responses: Vec<Response>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl ModelClient for FakeClient {
    async fn complete(&self, _request: Request) -> Result<Response> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::stream("scripted responses exhausted"))
    }
}

/// Completes only after a long delay; used to exercise cancellation.
struct SlowClient;

#[async_trait]
impl ModelClient for SlowClient {
    async fn complete(&self, _request: Request) -> Result<Response> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(Error::stream("should have been cancelled"))
    }
}

fn text_response(text: &str) -> Response {
    Response {
        id: "r1".to_string(),
        model: "test-model".to_string(),
        provider: "openai".to_string(),
        message: Message::new(Role::Assistant, vec![ContentPart::text(text)]),
        finish_reason: FinishReason::stop(),
        usage: Usage::new(1, 1),
        raw: None,
        warnings: Vec::new(),
        rate_limit: None,
    }
}

fn factory_with(dir: Arc<TempDir>, responses: Vec<Vec<Response>>) -> SessionFactory {
    let scripts = Mutex::new(VecDeque::from(responses));
    Arc::new(move |depth| {
        let responses = scripts.lock().unwrap().pop_front().unwrap_or_default();
        Session::new(
            openai_profile("gpt-test"),
            LocalExecutionEnvironment::new(dir.path()),
            FakeClient::new(responses),
        )
        .with_depth(depth)
    })
}

#[tokio::test]
async fn test_spawn_and_wait_reports_output() {
    let dir = Arc::new(TempDir::new().unwrap());
    let factory = factory_with(dir, vec![vec![text_response("child done")]]);
    let mut manager = SubagentManager::new(factory, 1, 0);

    let agent_id = manager.spawn("do the thing").await.unwrap();
    assert_eq!(manager.status(&agent_id), Some(SubagentStatus::Running));

    let result = manager.wait(&agent_id).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "child done");
    assert_eq!(result.turns_used, 2);
    assert_eq!(manager.status(&agent_id), Some(SubagentStatus::Completed));
}

#[tokio::test]
async fn test_depth_bound_rejected() {
    let dir = Arc::new(TempDir::new().unwrap());
    let factory = factory_with(dir, vec![]);
    let mut manager = SubagentManager::new(factory, 1, 1);

    let error = manager.spawn("too deep").await.unwrap_err();
    assert!(matches!(error, Error::SubagentDepth));
}

#[tokio::test]
async fn test_failed_child_marks_failure() {
    let dir = Arc::new(TempDir::new().unwrap());
    // No scripted responses: the child session errors immediately.
    let factory = factory_with(dir, vec![vec![]]);
    let mut manager = SubagentManager::new(factory, 1, 0);

    let agent_id = manager.spawn("doomed").await.unwrap();
    let result = manager.wait(&agent_id).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.output, "");
    assert_eq!(manager.status(&agent_id), Some(SubagentStatus::Failed));
}

#[tokio::test]
async fn test_send_runs_second_input() {
    let dir = Arc::new(TempDir::new().unwrap());
    let factory = factory_with(
        dir,
        vec![vec![text_response("first"), text_response("second")]],
    );
    let mut manager = SubagentManager::new(factory, 1, 0);

    let agent_id = manager.spawn("one").await.unwrap();
    manager.send(&agent_id, "two").await.unwrap();
    let result = manager.wait(&agent_id).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, "second");
    assert_eq!(result.turns_used, 4);
}

#[tokio::test]
async fn test_close_cancels_running_agent() {
    let dir = Arc::new(TempDir::new().unwrap());
    let slow_factory: SessionFactory = {
        let dir = dir.clone();
        Arc::new(move |depth| {
            Session::new(
                openai_profile("gpt-test"),
                LocalExecutionEnvironment::new(dir.path()),
                Arc::new(SlowClient),
            )
            .with_depth(depth)
        })
    };
    let mut manager = SubagentManager::new(slow_factory, 1, 0);

    let agent_id = manager.spawn("slow task").await.unwrap();
    assert_eq!(manager.close(&agent_id).await, "closed");
    // Closing again (or closing an unknown id) is a no-op.
    assert_eq!(manager.close(&agent_id).await, "already_closed");
    assert_eq!(manager.status(&agent_id), None);
}

#[tokio::test]
async fn test_unknown_agent_operations_fail() {
    let dir = Arc::new(TempDir::new().unwrap());
    let factory = factory_with(dir, vec![]);
    let mut manager = SubagentManager::new(factory, 1, 0);

    assert!(manager.wait("missing").await.is_err());
    assert!(manager.send("missing", "hello").await.is_err());
}

#[tokio::test]
async fn test_child_depth_passed_through_factory() {
    let dir = Arc::new(TempDir::new().unwrap());
    let seen_depth = Arc::new(Mutex::new(None));
    let observed = seen_depth.clone();
    let factory: SessionFactory = {
        let dir = dir.clone();
        Arc::new(move |depth| {
            *observed.lock().unwrap() = Some(depth);
            Session::new(
                openai_profile("gpt-test"),
                LocalExecutionEnvironment::new(dir.path()),
                FakeClient::new(vec![text_response("ok")]),
            )
            .with_depth(depth)
        })
    };
    let mut manager = SubagentManager::new(factory, 3, 1);

    let agent_id = manager.spawn("task").await.unwrap();
    manager.wait(&agent_id).await.unwrap();
    assert_eq!(*seen_depth.lock().unwrap(), Some(2));
}
