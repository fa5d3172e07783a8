//! Local container runner — one `docker run` per execution
//!
//! Drives the staging → resolving → launching → running → cleanup sequence
//! for a single snippet. Each execution owns its staging directory, spawned
//! process, and deadline timer, so runs are independent and may proceed in
//! parallel. Cleanup of the staging directory happens on every exit path.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SandboxError;
use crate::policy::{Mount, MountKind, SandboxPolicy};
use crate::runner::args::build_run_args;
use crate::runner::mounts::{ResolvedMount, resolve_mounts};
use crate::runner::{ResourceUsage, SandboxResult, SandboxRunner};

pub const DEFAULT_IMAGE: &str = "cordon-sandbox:latest";
pub const DEFAULT_RUNTIME_BINARY: &str = "docker";
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 512 * 1024;

/// Fixed in-container path of the staged snippet.
const SCRIPT_TARGET: &str = "/sandbox/snippet.sh";

/// Runner configuration, resolved once at construction. Environment lookups
/// happen only in [`RunnerConfig::from_env`], never during execution.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub image: String,
    pub runtime_binary: String,
    /// Root against which relative mount sources resolve.
    pub workspace_root: PathBuf,
    /// Parent directory for per-run staging directories.
    pub temp_dir: PathBuf,
    /// Per-stream output ceiling in bytes; only the most recent bytes are
    /// kept once a stream exceeds it.
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            runtime_binary: DEFAULT_RUNTIME_BINARY.to_string(),
            workspace_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            temp_dir: std::env::temp_dir(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl RunnerConfig {
    /// Defaults with `SANDBOX_IMAGE` / `SANDBOX_RUNTIME` applied on top.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(image) = std::env::var("SANDBOX_IMAGE") {
            config.image = image;
        }
        if let Ok(binary) = std::env::var("SANDBOX_RUNTIME") {
            config.runtime_binary = binary;
        }
        config
    }
}

/// Executes snippets via a Docker-CLI-compatible runtime binary.
pub struct LocalContainerRunner {
    config: RunnerConfig,
}

impl LocalContainerRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Check whether the configured runtime responds at all.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.config.runtime_binary)
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run_staged(
        &self,
        code: &str,
        policy: &SandboxPolicy,
        staging: &Path,
        run_id: Uuid,
    ) -> Result<SandboxResult, SandboxError> {
        let script_path = staging.join("snippet.sh");
        tokio::fs::write(&script_path, code)
            .await
            .map_err(SandboxError::Staging)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o700))
                .await
                .map_err(SandboxError::Staging)?;
        }

        let mut mounts = resolve_mounts(&policy.fs.mounts, &self.config.workspace_root).await?;
        mounts.push(ResolvedMount {
            mount: Mount {
                source: None,
                target: SCRIPT_TARGET.to_string(),
                writable: false,
                kind: MountKind::Bind,
            },
            resolved_source: Some(script_path),
        });

        let command = vec!["/bin/sh".to_string(), SCRIPT_TARGET.to_string()];
        let args = build_run_args(&self.config.image, policy, &mounts, Some(&command))?;
        debug!(
            "Sandbox {}: invoking {} with {} args",
            run_id,
            self.config.runtime_binary,
            args.len()
        );

        let start = Instant::now();
        let capture = self.spawn_runtime(&args, policy, run_id).await?;
        let wall_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Sandbox {}: run finished (exit={:?}, {}ms, timed_out={})",
            run_id, capture.exit_code, wall_time_ms, capture.timed_out
        );

        Ok(SandboxResult {
            stdout: capture.stdout,
            stderr: capture.stderr,
            exit_code: capture.exit_code,
            effective_policy: policy.clone(),
            resource_usage: ResourceUsage {
                wall_time_ms,
                ..Default::default()
            },
            output_truncated: capture.truncated,
        })
    }

    async fn spawn_runtime(
        &self,
        args: &[String],
        policy: &SandboxPolicy,
        run_id: Uuid,
    ) -> Result<Capture, SandboxError> {
        let mut child = Command::new(&self.config.runtime_binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::RuntimeSpawn {
                binary: self.config.runtime_binary.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| not_piped("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| not_piped("stderr"))?;
        let limit = self.config.max_output_bytes;
        let stdout_task = tokio::spawn(collect_stream(stdout, limit));
        let stderr_task = tokio::spawn(collect_stream(stderr, limit));

        let mut timed_out = false;
        let status = match policy.proc.timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), child.wait()).await {
                    Ok(status) => Some(status.map_err(SandboxError::OutputCapture)?),
                    Err(_) => {
                        timed_out = true;
                        warn!("Sandbox {}: deadline of {}ms reached, killing runtime", run_id, ms);
                        if let Err(err) = child.start_kill() {
                            warn!("Sandbox {}: kill failed: {}", run_id, err);
                        }
                        // reap; the runtime may still report its own code
                        child.wait().await.ok()
                    }
                }
            }
            None => Some(child.wait().await.map_err(SandboxError::OutputCapture)?),
        };

        let (stdout, stdout_truncated) = join_capture(stdout_task).await?;
        let (stderr, stderr_truncated) = join_capture(stderr_task).await?;

        Ok(Capture {
            stdout,
            stderr,
            exit_code: status.and_then(|s| s.code()),
            truncated: stdout_truncated || stderr_truncated,
            timed_out,
        })
    }
}

#[async_trait]
impl SandboxRunner for LocalContainerRunner {
    async fn exec(
        &self,
        code: &str,
        policy: &SandboxPolicy,
    ) -> Result<SandboxResult, SandboxError> {
        let run_id = Uuid::new_v4();
        let staging = self.config.temp_dir.join(format!("sandbox-{run_id}"));
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(SandboxError::Staging)?;

        let outcome = self.run_staged(code, policy, &staging, run_id).await;

        // unconditional, on success, timeout, and failure alike
        if let Err(err) = tokio::fs::remove_dir_all(&staging).await {
            warn!(
                "Sandbox {}: failed to remove staging dir {}: {}",
                run_id,
                staging.display(),
                err
            );
        }
        outcome
    }
}

struct Capture {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    truncated: bool,
    timed_out: bool,
}

fn not_piped(stream: &str) -> SandboxError {
    SandboxError::OutputCapture(std::io::Error::other(format!("{stream} was not piped")))
}

async fn join_capture(
    task: JoinHandle<std::io::Result<(String, bool)>>,
) -> Result<(String, bool), SandboxError> {
    task.await
        .map_err(|err| SandboxError::OutputCapture(std::io::Error::other(err)))?
        .map_err(SandboxError::OutputCapture)
}

async fn collect_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> std::io::Result<(String, bool)> {
    let mut buffer = OutputBuffer::new(limit);
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.push(&chunk[..n]);
    }
    Ok(buffer.finish())
}

/// Tail-preserving bounded accumulator: once the total exceeds the ceiling,
/// the earliest bytes are dropped so exactly the most recent `limit` bytes
/// survive.
struct OutputBuffer {
    chunks: VecDeque<Vec<u8>>,
    total: usize,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total: 0,
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.chunks.push_back(chunk.to_vec());
        self.total += chunk.len();
        if self.total <= self.limit {
            return;
        }
        self.truncated = true;
        while self.total > self.limit {
            let front_len = self.chunks.front().map_or(0, Vec::len);
            if self.total - front_len >= self.limit {
                self.chunks.pop_front();
                self.total -= front_len;
            } else if let Some(front) = self.chunks.front_mut() {
                let excess = self.total - self.limit;
                front.drain(..excess);
                self.total = self.limit;
            } else {
                break;
            }
        }
    }

    fn finish(self) -> (String, bool) {
        let mut bytes = Vec::with_capacity(self.total);
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }
        (String::from_utf8_lossy(&bytes).into_owned(), self.truncated)
    }
}
