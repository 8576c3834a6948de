//! Write-file tool.

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
        let content = required_str(&arguments, "content")?;
        let bytes_written = env.write_file(file_path, content)?;
        Ok(format!("Written {bytes_written} bytes to {file_path}"))
    })
}

pub fn write_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "write_file",
            "Write content to a file.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["file_path", "content"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
