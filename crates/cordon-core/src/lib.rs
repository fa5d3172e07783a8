//! cordon-core — policy-driven sandboxed code execution
//!
//! Translates a declarative isolation policy (filesystem mounts, network
//! mode, process limits) into a single "run and remove" invocation of a
//! Docker-CLI-compatible runtime, enforces a wall-clock deadline, captures
//! bounded output, and guarantees staging cleanup on every exit path.
//!
//! Pipeline: policy model → validator/merger → mount resolver → argument
//! builder → container runner → result.

pub mod error;
pub mod policy;
pub mod runner;
pub mod tools;

pub use error::SandboxError;
pub use policy::{
    FilesystemPolicy, Mount, MountKind, NetworkPolicy, ProcessPolicy, SandboxPolicy,
    SandboxPolicyOverrides, load_policy, merge_policy, validate,
};
pub use runner::{
    LocalContainerRunner, ResolvedMount, ResourceUsage, RunnerConfig, SandboxResult,
    SandboxRunner, build_run_args, resolve_mounts,
};
pub use tools::{SandboxedCodeConfig, SandboxedCodeTool, ToolHandler, ToolOutput, ToolRegistry};
