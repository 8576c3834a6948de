//! Read-file tool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::execution::LocalExecutionEnvironment;
use crate::request::ToolDefinition;
use crate::tools::{RegisteredTool, required_str};

fn execute<'a>(
    arguments: Map<String, Value>,
    env: &'a LocalExecutionEnvironment,
) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
    Box::pin(async move {
        let file_path = required_str(&arguments, "file_path")?;
        let offset = arguments
            .get("offset")
            .and_then(Value::as_u64)
            .map(|value| value as usize);
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .map(|value| value as usize);
        env.read_file(file_path, offset, limit)
    })
}

pub fn read_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "read_file",
            "Read a file from the filesystem.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "offset": {"type": "integer"},
                    "limit": {"type": "integer"},
                },
                "required": ["file_path"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
