//! Sandbox policy model — filesystem, network, and process constraints
//!
//! Policies are small, serializable values so they can travel with audit
//! logs and across process boundaries. All types serialize camelCase to
//! match the `sandbox.policy.yaml` document format.

pub mod loader;
pub mod merge;
pub mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use loader::{DEFAULT_POLICY_FILE, load_policy};
pub use merge::merge_policy;
pub use validate::{parse_policy, validate};

/// Mount kind hint. `Bind` when the document omits `type:`; `Tmpfs` is
/// materialized by the runtime itself and never has a host source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MountKind {
    Bind,
    Tmpfs,
    /// Runtime-specific kinds (named volumes, overlays) pass through as-is.
    Other(String),
}

impl MountKind {
    /// Ephemeral mounts are created by the runtime and carry no source.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, MountKind::Tmpfs)
    }

    pub fn as_str(&self) -> &str {
        match self {
            MountKind::Bind => "bind",
            MountKind::Tmpfs => "tmpfs",
            MountKind::Other(kind) => kind,
        }
    }
}

impl Default for MountKind {
    fn default() -> Self {
        MountKind::Bind
    }
}

impl From<String> for MountKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "bind" => MountKind::Bind,
            "tmpfs" => MountKind::Tmpfs,
            _ => MountKind::Other(value),
        }
    }
}

impl From<MountKind> for String {
    fn from(kind: MountKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A single path exposed to the sandbox.
///
/// `source` is optional because ephemeral mounts have none, and because
/// relative sources are resolved against a workspace root only at
/// resolution time, not at declaration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Destination path inside the sandbox (e.g., `/workspace`).
    pub target: String,
    pub writable: bool,
    #[serde(rename = "type", default)]
    pub kind: MountKind,
}

/// Filesystem policy: explicit mounts only, no implicit $HOME exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemPolicy {
    pub mounts: Vec<Mount>,
    /// Glob patterns that must stay inaccessible even when reachable
    /// through a mount. Advisory for the runtime/overlay layer.
    #[serde(default)]
    pub deny_globs: Vec<String>,
    /// Total storage cap in megabytes, enforced via tmpfs or quotas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_mb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetProtocol {
    Http,
    Https,
}

/// One allowlist entry. Advisory metadata for the runtime/proxy layer;
/// the core does not enforce per-host decisions itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAllowlistRule {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<HttpMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<NetProtocol>>,
}

/// Allowlist-enforcing proxy endpoint, when one is deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProxy {
    pub url: String,
    /// Whether sandbox traffic must route through the proxy tunnel.
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// Network policy. Defaults to deny-all: `enabled = false` maps to the
/// runtime's fully isolated network mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    pub enabled: bool,
    #[serde(default)]
    pub allowlist: Vec<NetworkAllowlistRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<NetworkProxy>,
}

/// Process and resource policy. Every limit is optional; unset limits are
/// simply not passed to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPolicy {
    /// Soft CPU quota in fractional cores (runtime `--cpus`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_quota: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// Wall-clock deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    /// Maximum additional child processes (fork limit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_child_processes: Option<u32>,
    /// Environment overlay injected into the sandbox.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

/// Root policy for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPolicy {
    pub fs: FilesystemPolicy,
    pub net: NetworkPolicy,
    pub proc: ProcessPolicy,
    /// Free-form scalar metadata (run IDs, human labels). Travels with
    /// audit logs without affecting enforcement.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Default for SandboxPolicy {
    /// Least-privilege baseline: no network, one writable workspace, one
    /// read-only dependency mount, tmpfs scratch, non-root identity.
    fn default() -> Self {
        Self {
            fs: FilesystemPolicy {
                mounts: vec![
                    Mount {
                        source: Some("./workspace".to_string()),
                        target: "/workspace".to_string(),
                        writable: true,
                        kind: MountKind::Bind,
                    },
                    Mount {
                        source: Some("./deps".to_string()),
                        target: "/deps".to_string(),
                        writable: false,
                        kind: MountKind::Bind,
                    },
                    Mount {
                        source: None,
                        target: "/tmp".to_string(),
                        writable: true,
                        kind: MountKind::Tmpfs,
                    },
                ],
                deny_globs: vec![
                    "**/.env".to_string(),
                    "**/.ssh/**".to_string(),
                    "**/id_*".to_string(),
                    "/home/**".to_string(),
                ],
                max_total_mb: Some(512),
            },
            net: NetworkPolicy {
                enabled: false,
                allowlist: Vec::new(),
                proxy: None,
            },
            proc: ProcessPolicy {
                cpu_quota: Some(1.0),
                memory_mb: Some(512),
                timeout_ms: Some(60_000),
                uid: Some(1000),
                gid: Some(1000),
                max_child_processes: Some(1),
                env: BTreeMap::new(),
                workdir: None,
            },
            metadata: BTreeMap::from([(
                "source".to_string(),
                Value::String("default/local".to_string()),
            )]),
        }
    }
}

/// Partial policy used only as merge input, never stored as a final
/// configuration. Mirrors [`SandboxPolicy`] with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPolicyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FilesystemPolicyOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<NetworkPolicyOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc: Option<ProcessPolicyOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemPolicyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounts: Option<Vec<Mount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_globs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowlist: Option<Vec<NetworkAllowlistRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<NetworkProxy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPolicyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_quota: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_child_processes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}
