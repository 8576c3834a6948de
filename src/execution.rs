//! Execution environment: working-dir-scoped filesystem and shell access
//! for tool executors.
//!
//! One environment maps to one working directory. Relative paths resolve
//! against it; absolute paths pass through. Nothing here protects files
//! from concurrent sessions - the runtime assumes one session per working
//! directory, or cooperating callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant, SystemTime};

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Outcome of one shell command.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

/// One entry from a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    /// File size in bytes; `None` for directories.
    pub size: Option<u64>,
}

/// Filesystem and shell capabilities scoped to one working directory.
pub struct LocalExecutionEnvironment {
    working_dir: PathBuf,
}

impl LocalExecutionEnvironment {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let raw: PathBuf = working_dir.into();
        let working_dir = raw.canonicalize().unwrap_or(raw);
        Self { working_dir }
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_dir
    }

    pub fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    pub fn os_version(&self) -> String {
        format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve a path against the working directory; absolute paths pass
    /// through unchanged.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    pub fn read_text(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(std::fs::read_to_string(self.resolve_path(path))?)
    }

    /// Write text, creating parent directories as needed. Returns the
    /// number of bytes written.
    pub fn write_text(&self, path: impl AsRef<Path>, content: &str) -> Result<usize> {
        let target = self.resolve_path(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        Ok(content.len())
    }

    /// Read a file with line numbers, optionally windowed by a 1-based
    /// `offset` and a line `limit`.
    pub fn read_file(
        &self,
        path: impl AsRef<Path>,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<String> {
        let content = self.read_text(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let start = offset.unwrap_or(1).saturating_sub(1);
        let selected: Vec<&str> = match limit {
            Some(limit) => lines.iter().skip(start).take(limit).copied().collect(),
            None => lines.iter().skip(start).copied().collect(),
        };

        Ok(selected
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}: {}", start + i + 1, line))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub fn write_file(&self, path: impl AsRef<Path>, content: &str) -> Result<usize> {
        self.write_text(path, content)
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve_path(path).exists()
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let target = self.resolve_path(path);
        if target.exists() {
            std::fs::remove_file(target)?;
        }
        Ok(())
    }

    /// List a directory, sorted by name.
    pub fn list_directory(&self, path: impl AsRef<Path>) -> Result<Vec<DirEntry>> {
        let root = self.resolve_path(path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() {
                    None
                } else {
                    Some(metadata.len())
                },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Run a shell command with a timeout. On timeout the process is
    /// killed and `timed_out` is set; whatever output was produced is
    /// still returned.
    pub async fn exec_command(
        &self,
        command: &str,
        timeout_ms: u64,
        working_dir: Option<&str>,
        env_vars: Option<&HashMap<String, String>>,
    ) -> Result<ExecResult> {
        let cwd = match working_dir {
            Some(dir) => self.resolve_path(dir),
            None => self.working_dir.clone(),
        };

        let (shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(vars) = env_vars {
            cmd.envs(vars);
        }

        let start = Instant::now();
        let mut child = cmd.spawn()?;

        // Drain pipes concurrently so a chatty child cannot deadlock on a
        // full pipe while we wait for exit.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(slurp(stdout_pipe));
        let stderr_task = tokio::spawn(slurp(stderr_pipe));

        let timeout = Duration::from_millis(timeout_ms);
        let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                child.kill().await.ok();
                (child.wait().await?, true)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ExecResult {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Search file contents line by line with a regex.
    ///
    /// `glob_filter` narrows the candidate files (matched against the
    /// path relative to `path`, or the bare file name). Binary and
    /// non-UTF-8 files are skipped. Output lines are
    /// `relative/path:line_number:line`.
    pub fn grep(
        &self,
        pattern: &str,
        path: &str,
        glob_filter: Option<&str>,
        case_insensitive: bool,
        max_results: usize,
    ) -> Result<String> {
        let regex = regex::RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|error| Error::InvalidToolCall(format!("invalid regex: {error}")))?;

        let filter = match glob_filter {
            Some(filter) => Some(glob::Pattern::new(filter).map_err(|error| {
                Error::InvalidToolCall(format!("invalid glob filter: {error}"))
            })?),
            None => None,
        };

        let base = self.resolve_path(path);
        let targets: Vec<PathBuf> = if base.is_file() {
            vec![base.clone()]
        } else {
            walkdir::WalkDir::new(&base)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|file| match &filter {
                    Some(pattern) => {
                        let relative = file.strip_prefix(&base).unwrap_or(file);
                        pattern.matches_path(relative)
                            || file
                                .file_name()
                                .map(|name| pattern.matches(&name.to_string_lossy()))
                                .unwrap_or(false)
                    }
                    None => true,
                })
                .collect()
        };

        let mut matches: Vec<String> = Vec::new();
        for file in targets {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            let display = file
                .strip_prefix(&self.working_dir)
                .unwrap_or(&file)
                .display();
            for (index, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!("{}:{}:{}", display, index + 1, line));
                    if matches.len() >= max_results {
                        return Ok(matches.join("\n"));
                    }
                }
            }
        }

        Ok(matches.join("\n"))
    }

    /// Find files matching a glob pattern under `path`, newest first.
    pub fn glob(&self, pattern: &str, path: &str) -> Result<Vec<String>> {
        let base = self.resolve_path(path);
        let full_pattern = base.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();

        let paths = glob::glob(&full_pattern)
            .map_err(|error| Error::InvalidToolCall(format!("invalid glob pattern: {error}")))?;

        let mut found: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in paths.filter_map(|entry| entry.ok()) {
            let modified = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((entry, modified));
        }
        found.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(found
            .into_iter()
            .map(|(path, _)| {
                path.strip_prefix(&self.working_dir)
                    .unwrap_or(&path)
                    .display()
                    .to_string()
            })
            .collect())
    }
}

async fn slurp(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes).await.ok();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env() -> (TempDir, LocalExecutionEnvironment) {
        let dir = TempDir::new().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        (dir, env)
    }

    #[test]
    fn test_write_then_read_numbered() {
        let (_dir, env) = env();
        let written = env.write_file("notes.txt", "alpha\nbeta\ngamma").unwrap();
        assert_eq!(written, 16);

        let all = env.read_file("notes.txt", None, None).unwrap();
        assert_eq!(all, "1: alpha\n2: beta\n3: gamma");

        let window = env.read_file("notes.txt", Some(2), Some(1)).unwrap();
        assert_eq!(window, "2: beta");
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let (_dir, env) = env();
        env.write_file("nested/deep/file.txt", "x").unwrap();
        assert!(env.file_exists("nested/deep/file.txt"));
    }

    #[test]
    fn test_resolve_path_absolute_passthrough() {
        let (dir, env) = env();
        let absolute = dir.path().join("abs.txt");
        assert_eq!(env.resolve_path(&absolute), absolute);
        assert!(env.resolve_path("rel.txt").starts_with(env.working_directory()));
    }

    #[test]
    fn test_list_directory_sorted_with_sizes() {
        let (_dir, env) = env();
        env.write_file("b.txt", "12345").unwrap();
        env.write_file("a/inner.txt", "x").unwrap();

        let entries = env.list_directory(".").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].size, None);
        assert_eq!(entries[1].name, "b.txt");
        assert_eq!(entries[1].size, Some(5));
    }

    #[tokio::test]
    async fn test_exec_command_captures_output() {
        let (_dir, env) = env();
        let result = env
            .exec_command("echo hello && echo oops >&2", 5_000, None, None)
            .await
            .unwrap();

        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        assert_eq!(result.exit_code, 0);
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_exec_command_nonzero_exit() {
        let (_dir, env) = env();
        let result = env.exec_command("exit 3", 5_000, None, None).await.unwrap();
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_exec_command_times_out() {
        let (_dir, env) = env();
        let result = env
            .exec_command("sleep 5", 100, None, None)
            .await
            .unwrap();
        assert!(result.timed_out);
        assert!(result.duration_ms < 5_000);
    }

    #[tokio::test]
    async fn test_exec_command_env_vars() {
        let (_dir, env) = env();
        let mut vars = HashMap::new();
        vars.insert("AGENT_TEST_VAR".to_string(), "42".to_string());
        let result = env
            .exec_command("echo $AGENT_TEST_VAR", 5_000, None, Some(&vars))
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "42");
    }

    #[test]
    fn test_grep_matches_with_line_numbers() {
        let (_dir, env) = env();
        env.write_file("src/main.rs", "fn main() {\n    println!(\"hi\");\n}")
            .unwrap();
        env.write_file("src/lib.rs", "pub fn lib() {}").unwrap();

        let out = env.grep("fn main", ".", None, false, 100).unwrap();
        assert_eq!(out, "src/main.rs:1:fn main() {");
    }

    #[test]
    fn test_grep_glob_filter_and_case() {
        let (_dir, env) = env();
        env.write_file("a.rs", "HELLO").unwrap();
        env.write_file("b.txt", "hello").unwrap();

        let out = env.grep("hello", ".", Some("*.rs"), true, 100).unwrap();
        assert_eq!(out, "a.rs:1:HELLO");
    }

    #[test]
    fn test_grep_max_results() {
        let (_dir, env) = env();
        env.write_file("many.txt", &"needle\n".repeat(10)).unwrap();
        let out = env.grep("needle", ".", None, false, 3).unwrap();
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_glob_relative_results() {
        let (_dir, env) = env();
        env.write_file("one.py", "").unwrap();
        env.write_file("two.py", "").unwrap();
        env.write_file("three.rs", "").unwrap();

        let mut matches = env.glob("*.py", ".").unwrap();
        matches.sort();
        assert_eq!(matches, vec!["one.py", "two.py"]);
    }

    #[test]
    fn test_glob_recursive_pattern() {
        let (_dir, env) = env();
        env.write_file("src/deep/mod.rs", "").unwrap();
        let matches = env.glob("**/*.rs", ".").unwrap();
        assert_eq!(matches, vec!["src/deep/mod.rs"]);
    }
}
