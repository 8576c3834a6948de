//! Edit-file tool with exact-occurrence replacement semantics.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::execution::LocalExecutionEnvironment;
use crate::request::ToolDefinition;
use crate::tools::{RegisteredTool, required_str};

fn execute<'a>(
    arguments: Map<String, Value>,
    env: &'a LocalExecutionEnvironment,
) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
    Box::pin(async move {
        let file_path = required_str(&arguments, "file_path")?;
        let old_string = required_str(&arguments, "old_string")?;
        let new_string = required_str(&arguments, "new_string")?;
        let replace_all = arguments
            .get("replace_all")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let content = env.read_text(file_path)?;
        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Err(Error::tool("old_string not found"));
        }
        if occurrences > 1 && !replace_all {
            return Err(Error::tool("old_string matches multiple locations"));
        }

        let (updated, replaced) = if replace_all {
            (content.replace(old_string, new_string), occurrences)
        } else {
            (content.replacen(old_string, new_string, 1), 1)
        };
        env.write_text(file_path, &updated)?;

        let noun = if replaced == 1 {
            "replacement"
        } else {
            "replacements"
        };
        Ok(format!("Applied {replaced} {noun} in {file_path}"))
    })
}

pub fn edit_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "edit_file",
            "Replace an exact string occurrence in a file.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"},
                    "replace_all": {"type": "boolean"},
                },
                "required": ["file_path", "old_string", "new_string"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
