//! Sandbox runners — execute snippets under an effective policy
//!
//! [`SandboxRunner`] is the seam between policy handling and the container
//! runtime: a remote or alternate-runtime implementation can replace
//! [`LocalContainerRunner`] without touching policy or argument building.

pub mod args;
pub mod local;
pub mod mounts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use args::build_run_args;
pub use local::{LocalContainerRunner, RunnerConfig};
pub use mounts::{ResolvedMount, resolve_mounts};

use crate::error::SandboxError;
use crate::policy::SandboxPolicy;

/// Resource counters observed for one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub wall_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_peak_mb: Option<u64>,
}

/// Outcome of one sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` means the process was force-terminated before a natural exit
    /// (deadline kill or signal death).
    pub exit_code: Option<i32>,
    /// Exact policy applied to the run, kept for audit.
    pub effective_policy: SandboxPolicy,
    pub resource_usage: ResourceUsage,
    /// True when either stream hit the output ceiling.
    pub output_truncated: bool,
}

/// Minimal contract for sandbox executors.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Run the snippet under the supplied effective policy.
    async fn exec(&self, code: &str, policy: &SandboxPolicy)
    -> Result<SandboxResult, SandboxError>;
}
