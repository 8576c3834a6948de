//! Apply-patch tool: add/update/delete operations in a pseudo-unified
//! patch format.
//!
//! Patches start with `*** Begin Patch` and end with `*** End Patch`.
//! Operations are introduced by `*** Add File:`, `*** Update File:`, or
//! `*** Delete File:`. Add bodies are `+`-prefixed lines; update bodies
//! use `@@` hunk markers with ` `/`+`/`-` prefixes, applied by locating
//! the old-lines chunk verbatim; an all-plus update body replaces the
//! file wholesale.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::execution::LocalExecutionEnvironment;
use crate::request::ToolDefinition;
use crate::tools::{RegisteredTool, required_str};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum OperationKind {
    Add,
    Update,
    Delete,
}

#[derive(Debug)]
struct Operation {
    kind: OperationKind,
    path: String,
    body: Vec<String>,
}

fn parse_patch(patch: &str) -> Result<Vec<Operation>> {
    let lines: Vec<&str> = patch.lines().collect();
    if lines.first().map(|line| line.trim()) != Some("*** Begin Patch") {
        return Err(Error::tool("Patch must start with *** Begin Patch"));
    }
    if lines.last().map(|line| line.trim()) != Some("*** End Patch") {
        return Err(Error::tool("Patch must end with *** End Patch"));
    }

    let mut operations: Vec<Operation> = Vec::new();
    let mut current: Option<Operation> = None;

    for line in &lines[1..lines.len() - 1] {
        let next = if let Some(path) = line.strip_prefix("*** Add File: ") {
            Some((OperationKind::Add, path))
        } else if let Some(path) = line.strip_prefix("*** Update File: ") {
            Some((OperationKind::Update, path))
        } else if let Some(path) = line.strip_prefix("*** Delete File: ") {
            Some((OperationKind::Delete, path))
        } else {
            None
        };

        match next {
            Some((kind, path)) => {
                if let Some(finished) = current.take() {
                    operations.push(finished);
                }
                current = Some(Operation {
                    kind,
                    path: path.trim().to_string(),
                    body: Vec::new(),
                });
            }
            None => {
                if let Some(operation) = current.as_mut() {
                    operation.body.push(line.to_string());
                }
            }
        }
    }

    if let Some(finished) = current {
        operations.push(finished);
    }
    Ok(operations)
}

fn apply_update(original: &str, body: &[String]) -> Result<String> {
    let relevant: Vec<&String> = body
        .iter()
        .filter(|line| !line.is_empty() && !line.starts_with("@@"))
        .collect();

    // All-plus bodies replace the file contents wholesale.
    if !relevant.is_empty() && relevant.iter().all(|line| line.starts_with('+')) {
        let replaced: Vec<&str> = relevant.iter().map(|line| &line[1..]).collect();
        return Ok(format!("{}\n", replaced.join("\n")));
    }

    let old_lines: Vec<&str> = relevant
        .iter()
        .filter(|line| line.starts_with(' ') || line.starts_with('-'))
        .map(|line| &line[1..])
        .collect();
    let new_lines: Vec<&str> = relevant
        .iter()
        .filter(|line| line.starts_with(' ') || line.starts_with('+'))
        .map(|line| &line[1..])
        .collect();

    let mut old_chunk = old_lines.join("\n");
    let mut new_chunk = new_lines.join("\n");
    if !old_chunk.is_empty() && original.ends_with('\n') {
        old_chunk.push('\n');
        new_chunk.push('\n');
    }

    match original.find(&old_chunk) {
        Some(index) => Ok(format!(
            "{}{}{}",
            &original[..index],
            new_chunk,
            &original[index + old_chunk.len()..]
        )),
        None => Err(Error::tool("Update hunk did not match file content")),
    }
}

fn execute_patch(patch: &str, env: &LocalExecutionEnvironment) -> Result<String> {
    let operations = parse_patch(patch)?;
    let mut outputs: Vec<String> = Vec::new();

    for operation in operations {
        match operation.kind {
            OperationKind::Add => {
                if env.file_exists(&operation.path) {
                    return Err(Error::tool(format!(
                        "File already exists: {}",
                        operation.path
                    )));
                }
                let content: Vec<&str> = operation
                    .body
                    .iter()
                    .filter(|line| line.starts_with('+'))
                    .map(|line| &line[1..])
                    .collect();
                env.write_text(&operation.path, &format!("{}\n", content.join("\n")))?;
                outputs.push(format!("Added {}", operation.path));
            }
            OperationKind::Delete => {
                env.remove_file(&operation.path)?;
                outputs.push(format!("Deleted {}", operation.path));
            }
            OperationKind::Update => {
                if !env.file_exists(&operation.path) {
                    return Err(Error::tool(format!("File not found: {}", operation.path)));
                }
                let original = env.read_text(&operation.path)?;
                let updated = apply_update(&original, &operation.body)?;
                env.write_text(&operation.path, &updated)?;
                outputs.push(format!("Updated {}", operation.path));
            }
        }
    }

    Ok(outputs.join("\n"))
}

fn execute<'a>(
    arguments: Map<String, Value>,
    env: &'a LocalExecutionEnvironment,
) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
    Box::pin(async move {
        let patch = required_str(&arguments, "patch")?;
        execute_patch(patch, env)
    })
}

pub fn apply_patch_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition::new(
            "apply_patch",
            "Apply code changes using patch format.",
            json!({
                "type": "object",
                "properties": {
                    "patch": {"type": "string"},
                },
                "required": ["patch"],
            }),
        ),
        executor: Arc::new(execute),
    }
}
