//! `git` subprocess runner

use crate::blame::parse_porcelain;
use crate::error::{GitError, Result};
use crate::runner::{BlameLine, BlameOptions, VersionControlRunner};
use anchor_core::delta::is_binary;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default bound on a single git invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Runs the `git` executable with a bounded timeout
#[derive(Debug, Clone)]
pub struct GitCommand {
    executable: PathBuf,
    timeout: Duration,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git", DEFAULT_TIMEOUT)
    }
}

/// What a failed invocation was about, for stderr classification
#[derive(Default, Clone, Copy)]
struct Subject<'a> {
    revision: Option<&'a str>,
    path: Option<&'a str>,
}

impl GitCommand {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run git in `cwd`, returning stdout
    async fn run(&self, cwd: &Path, args: &[&str], stdin: Option<&str>, subject: Subject<'_>) -> Result<Vec<u8>> {
        let command = args.first().copied().unwrap_or("git");
        debug!("git {} (in {})", args.join(" "), cwd.display());

        let mut child = Command::new(&self.executable)
            .current_dir(cwd)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(GitError::Spawn)?;

        // Feed stdin concurrently so a large buffer cannot deadlock against
        // a full stdout pipe
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            let input = input.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    warn!("Failed to write git stdin: {}", e);
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(GitError::Spawn)?,
            Err(_) => {
                return Err(GitError::Timeout {
                    command: command.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::classify(command, &stderr, subject.revision, subject.path));
        }

        Ok(output.stdout)
    }

    async fn run_text(&self, cwd: &Path, args: &[&str], subject: Subject<'_>) -> Result<String> {
        let stdout = self.run(cwd, args, None, subject).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

#[async_trait]
impl VersionControlRunner for GitCommand {
    async fn read_file_at_revision(&self, repo_root: &Path, path: &str, revision: &str) -> Result<String> {
        let spec = format!("{}:{}", revision, path);
        let subject = Subject {
            revision: Some(revision),
            path: Some(path),
        };
        let bytes = self.run(repo_root, &["show", spec.as_str()], None, subject).await?;

        if is_binary(&bytes) {
            return Err(GitError::BinaryContent { path: path.to_string() });
        }
        String::from_utf8(bytes).map_err(|_| GitError::BinaryContent { path: path.to_string() })
    }

    async fn blame(&self, repo_root: &Path, path: &str, options: &BlameOptions) -> Result<Vec<BlameLine>> {
        let mut args: Vec<String> = vec!["blame".into(), "--root".into(), "-w".into(), "--porcelain".into()];
        if let Some(range) = options.range {
            args.push("-L".into());
            args.push(format!("{},{}", range.start, range.end));
        }
        if options.contents.is_some() {
            args.push("--contents".into());
            args.push("-".into());
        } else if let Some(revision) = &options.revision {
            args.push(revision.clone());
        }
        args.push("--".into());
        args.push(path.to_string());

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let subject = Subject {
            revision: options.revision.as_deref(),
            path: Some(path),
        };
        let stdout = self.run(repo_root, &args, options.contents.as_deref(), subject).await?;
        Ok(parse_porcelain(&String::from_utf8_lossy(&stdout)))
    }

    async fn diff_revisions(&self, repo_root: &Path, old: &str, new: &str, path: &str) -> Result<String> {
        let subject = Subject {
            revision: Some(old),
            path: Some(path),
        };
        self.run_text(
            repo_root,
            &["diff", "--no-color", "--no-ext-diff", "--unified=0", old, new, "--", path],
            subject,
        )
        .await
    }

    async fn current_revision(&self, repo_root: &Path) -> Result<String> {
        let subject = Subject {
            revision: Some("HEAD"),
            path: None,
        };
        let out = self.run_text(repo_root, &["rev-parse", "HEAD"], subject).await?;
        Ok(out.trim().to_string())
    }

    async fn list_submodules(&self, repo_root: &Path) -> Result<Vec<String>> {
        if !repo_root.join(".gitmodules").exists() {
            return Ok(Vec::new());
        }

        let result = self
            .run_text(
                repo_root,
                &["config", "--file", ".gitmodules", "--get-regexp", "path"],
                Subject::default(),
            )
            .await;

        let out = match result {
            Ok(out) => out,
            // `git config` exits 1 with no output when nothing matches
            Err(GitError::Failed { stderr, .. }) if stderr.is_empty() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(out
            .lines()
            .filter_map(|line| line.split_once(char::is_whitespace))
            .map(|(_, path)| path.trim().trim_end_matches('/').to_string())
            .filter(|path| !path.is_empty())
            .collect())
    }
}
