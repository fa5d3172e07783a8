//! Error taxonomy for sandbox execution
//!
//! Every fatal failure mode gets its own variant so callers (and the MCP
//! adapter) can report a stable error class instead of a stringly-typed
//! message. A missing policy file and a deadline kill are deliberately not
//! errors: the former falls back to the default policy, the latter is
//! reported through `SandboxResult::exit_code == None`.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures raised by the sandbox core.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Policy file exists but could not be read.
    #[error("failed to read policy file {path}: {source}")]
    PolicyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Policy file exists but is not valid YAML for a policy document.
    #[error("failed to parse policy file {path}: {source}")]
    PolicyParse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    /// Policy document is well-formed but violates a constraint.
    #[error("invalid policy: {field}: {constraint}")]
    PolicyValidation { field: String, constraint: String },

    /// Could not create the host directory backing a bind mount.
    #[error("failed to prepare mount source {path}: {source}")]
    MountResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A non-ephemeral mount reached argument building without a resolved
    /// source. Signals a sequencing bug, not bad user input.
    #[error("mount for target {target} is missing a resolved source path")]
    ArgumentContract { target: String },

    /// The container runtime binary could not be launched.
    #[error("failed to launch container runtime '{binary}': {source}")]
    RuntimeSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Staging directory or snippet file could not be created.
    #[error("failed to stage snippet: {0}")]
    Staging(#[source] std::io::Error),

    /// Reading the runtime's stdout/stderr or reaping it failed mid-run.
    #[error("failed to capture sandbox output: {0}")]
    OutputCapture(#[source] std::io::Error),
}

impl SandboxError {
    /// Stable class name surfaced in structured error payloads.
    pub fn class(&self) -> &'static str {
        match self {
            SandboxError::PolicyRead { .. } | SandboxError::PolicyParse { .. } => {
                "PolicyLoadError"
            }
            SandboxError::PolicyValidation { .. } => "PolicyValidationError",
            SandboxError::MountResolution { .. } => "MountResolutionError",
            SandboxError::ArgumentContract { .. } => "ArgumentContractError",
            SandboxError::RuntimeSpawn { .. } => "RuntimeSpawnError",
            SandboxError::Staging(_) => "StagingError",
            SandboxError::OutputCapture(_) => "OutputCaptureError",
        }
    }

    pub(crate) fn validation(field: &str, constraint: &str) -> Self {
        SandboxError::PolicyValidation {
            field: field.to_string(),
            constraint: constraint.to_string(),
        }
    }
}
