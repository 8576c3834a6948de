//! Grep tool.

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
        let pattern = required_str(&arguments, "pattern")?;
        let path = arguments
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or(".");
        let glob_filter = arguments.get("glob_filter").and_then(Value::as_str);
        let case_insensitive = arguments
            .get("case_insensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let max_results = arguments
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(100) as usize;

        env.grep(pattern, path, glob_filter, case_insensitive, max_results)
    })
}

pub fn grep_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "grep",
            "Search file contents using regex patterns.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                    "glob_filter": {"type": "string"},
                    "case_insensitive": {"type": "boolean"},
                    "max_results": {"type": "integer"},
                },
                "required": ["pattern"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
