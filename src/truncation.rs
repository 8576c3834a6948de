//! Tool-output truncation: char and line trimming with per-tool limits.
//!
//! Limits are counted in characters (not bytes), so truncation never
//! splits a UTF-8 sequence. The untruncated output is still surfaced in
//! the session event stream; only what the model sees is trimmed.

use std::collections::HashMap;

/// Where trimmed content is removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationMode {
    /// Keep the head and tail, drop the middle.
    HeadTail,
    /// Keep the tail, drop the front.
    Tail,
}

/// Default per-tool character limits.
pub fn default_char_limits() -> HashMap<String, usize> {
    HashMap::from([
        ("read_file".to_string(), 50_000),
        ("shell".to_string(), 30_000),
        ("grep".to_string(), 20_000),
        ("glob".to_string(), 20_000),
        ("edit_file".to_string(), 10_000),
        ("apply_patch".to_string(), 10_000),
        ("write_file".to_string(), 1_000),
    ])
}

/// Default per-tool line limits; tools absent here are not line-limited.
pub fn default_line_limits() -> HashMap<String, usize> {
    HashMap::from([
        ("shell".to_string(), 256),
        ("grep".to_string(), 200),
        ("glob".to_string(), 500),
    ])
}

/// Truncation mode for a tool; unknown tools default to head/tail.
pub fn mode_for_tool(tool_name: &str) -> TruncationMode {
    match tool_name {
        "read_file" | "shell" => TruncationMode::HeadTail,
        "grep" | "glob" | "edit_file" | "apply_patch" | "write_file" => TruncationMode::Tail,
        _ => TruncationMode::HeadTail,
    }
}

/// Character limit applied when a tool has no entry in the limit table.
const FALLBACK_CHAR_LIMIT: usize = 10_000;

/// Trim `output` to at most `max_chars` characters, inserting a warning
/// describing what was removed. A limit of zero disables trimming.
pub fn truncate_output(output: &str, max_chars: usize, mode: TruncationMode) -> String {
    let total = output.chars().count();
    if max_chars == 0 || total <= max_chars {
        return output.to_string();
    }

    let removed = total - max_chars;
    match mode {
        TruncationMode::Tail => {
            let tail: String = output
                .chars()
                .skip(total - max_chars)
                .collect();
            format!(
                "[WARNING: Tool output was truncated. First {removed} characters were removed. \
                 The full output is available in the event stream.]\n\n{tail}"
            )
        }
        TruncationMode::HeadTail => {
            let head_chars = max_chars / 2;
            let tail_chars = max_chars - head_chars;
            let head: String = output.chars().take(head_chars).collect();
            let tail: String = output.chars().skip(total - tail_chars).collect();
            format!(
                "{head}\n\n[WARNING: Tool output was truncated. {removed} characters were \
                 removed from the middle. The full output is available in the event stream. \
                 If you need to see specific parts, re-run the tool with more targeted \
                 parameters.]\n\n{tail}"
            )
        }
    }
}

/// Trim `output` to at most `max_lines` lines, keeping the head and tail
/// with an omission marker between them. If char truncation already left
/// a `[WARNING:` line and the line trim would cut it, it is re-inserted
/// at the top.
pub fn truncate_lines(output: &str, max_lines: usize) -> String {
    if max_lines == 0 {
        return output.to_string();
    }

    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }

    let head_count = max_lines / 2;
    let tail_count = max_lines - head_count;
    let omitted = lines.len() - head_count - tail_count;

    let marker = format!("[... {omitted} lines omitted ...]");
    let mut kept: Vec<String> = Vec::with_capacity(max_lines + 2);
    kept.extend(lines[..head_count].iter().map(|line| line.to_string()));
    kept.push(marker);
    kept.extend(
        lines[lines.len() - tail_count..]
            .iter()
            .map(|line| line.to_string()),
    );

    if output.contains("[WARNING:") && !kept.iter().any(|line| line.starts_with("[WARNING:")) {
        if let Some(warning) = lines.iter().find(|line| line.starts_with("[WARNING:")) {
            kept.insert(0, warning.to_string());
        }
    }

    kept.join("\n")
}

/// Apply the full truncation pipeline for one tool: char limits first,
/// then line limits. Explicit limits override the defaults per tool.
pub fn truncate_tool_output(
    output: &str,
    tool_name: &str,
    tool_char_limits: &HashMap<String, usize>,
    tool_line_limits: &HashMap<String, usize>,
) -> String {
    let max_chars = tool_char_limits
        .get(tool_name)
        .or_else(|| default_char_limits_ref(tool_name))
        .copied()
        .unwrap_or(FALLBACK_CHAR_LIMIT);

    let result = truncate_output(output, max_chars, mode_for_tool(tool_name));

    let max_lines = tool_line_limits
        .get(tool_name)
        .copied()
        .or_else(|| default_line_limits().get(tool_name).copied());
    match max_lines {
        Some(max_lines) => truncate_lines(&result, max_lines),
        None => result,
    }
}

fn default_char_limits_ref(tool_name: &str) -> Option<&'static usize> {
    // Static mirror of `default_char_limits` for lookup without building
    // a map per call.
    match tool_name {
        "read_file" => Some(&50_000),
        "shell" => Some(&30_000),
        "grep" | "glob" => Some(&20_000),
        "edit_file" | "apply_patch" => Some(&10_000),
        "write_file" => Some(&1_000),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_limit_is_untouched() {
        assert_eq!(
            truncate_output("short", 100, TruncationMode::HeadTail),
            "short"
        );
        assert_eq!(truncate_output("short", 0, TruncationMode::Tail), "short");
    }

    #[test]
    fn test_head_tail_keeps_both_ends() {
        let out = truncate_output("abcdefghij", 6, TruncationMode::HeadTail);
        assert!(out.starts_with("abc"));
        assert!(out.ends_with("hij"));
        assert!(out.contains("truncated"));
        assert!(out.contains("4 characters were removed from the middle"));
    }

    #[test]
    fn test_tail_keeps_the_end() {
        let out = truncate_output("0123456789", 4, TruncationMode::Tail);
        assert!(out.ends_with("6789"));
        assert!(out.contains("First 6 characters were removed"));
    }

    #[test]
    fn test_tail_truncation_idempotent() {
        let input = "x".repeat(100);
        let once = truncate_output(&input, 200, TruncationMode::Tail);
        let twice = truncate_output(&once, 200, TruncationMode::Tail);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_char_counting_not_byte_counting() {
        // Multi-byte characters must not be split.
        let input = "é".repeat(10);
        let out = truncate_output(&input, 4, TruncationMode::Tail);
        assert!(out.ends_with(&"é".repeat(4)));
    }

    #[test]
    fn test_line_truncation_keeps_head_and_tail() {
        let input = (1..=10).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let out = truncate_lines(&input, 4);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.first(), Some(&"1"));
        assert_eq!(lines.last(), Some(&"10"));
        assert!(out.contains("[... 6 lines omitted ...]"));
    }

    #[test]
    fn test_line_truncation_reinserts_cut_warning() {
        let mut lines = vec!["[WARNING: Tool output was truncated.]".to_string()];
        lines.extend((1..=20).map(|n| n.to_string()));
        let input = lines.join("\n");

        let out = truncate_lines(&input, 4);
        assert!(out.lines().next().unwrap().starts_with("[WARNING:"));
    }

    #[test]
    fn test_tool_pipeline_chars_then_lines() {
        let input = format!("{}\n1\n2\n3\n4\n5\n6", "x".repeat(80));
        let mut char_limits = HashMap::new();
        char_limits.insert("shell".to_string(), 40);
        let mut line_limits = HashMap::new();
        line_limits.insert("shell".to_string(), 4);

        let out = truncate_tool_output(&input, "shell", &char_limits, &line_limits);
        assert!(out.contains("truncated"));
        assert!(out.contains("omitted"));
    }

    #[test]
    fn test_unknown_tool_falls_back() {
        let input = "y".repeat(20_000);
        let out = truncate_tool_output(
            &input,
            "mystery_tool",
            &HashMap::new(),
            &HashMap::new(),
        );
        // Fallback limit plus the inserted warning text.
        assert!(out.chars().count() < 11_000);
        assert!(out.contains("removed from the middle"));
    }

    #[test]
    fn test_default_tables_consistent() {
        for (tool, limit) in default_char_limits() {
            assert_eq!(default_char_limits_ref(&tool).copied(), Some(limit));
        }
    }
}
