//! Shell tool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::execution::LocalExecutionEnvironment;
use crate::request::ToolDefinition;
use crate::tools::{RegisteredTool, required_str};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn execute<'a>(
    arguments: Map<String, Value>,
    env: &'a LocalExecutionEnvironment,
) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
    Box::pin(async move {
        let command = required_str(&arguments, "command")?;
        let timeout_ms = arguments
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let result = env.exec_command(command, timeout_ms, None, None).await?;

        let mut chunks: Vec<String> = Vec::new();
        let stdout = result.stdout.trim_end();
        if !stdout.is_empty() {
            chunks.push(stdout.to_string());
        }
        let stderr = result.stderr.trim_end();
        if !stderr.is_empty() {
            chunks.push(stderr.to_string());
        }
        chunks.push(format!("exit_code: {}", result.exit_code));
        if result.timed_out {
            chunks.push(format!("[ERROR: Command timed out after {timeout_ms}ms]"));
        }
        Ok(chunks.join("\n"))
    })
}

pub fn shell_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "shell",
            "Execute a shell command.",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "timeout_ms": {"type": "integer"},
                    "description": {"type": "string"},
                },
                "required": ["command"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
