//! Policy file loading
//!
//! A missing file is not an error: the least-privilege default applies.
//! Anything else (unreadable file, bad YAML, constraint violation)
//! propagates so a broken policy can never silently degrade to defaults.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{SandboxPolicy, validate};
use crate::error::SandboxError;

/// File name looked up under the working directory when no explicit path
/// is given.
pub const DEFAULT_POLICY_FILE: &str = "sandbox.policy.yaml";

/// Load and validate a policy document from disk.
///
/// `file` may be absolute or relative to `cwd`; when omitted,
/// [`DEFAULT_POLICY_FILE`] under `cwd` is tried.
pub async fn load_policy(
    cwd: &Path,
    file: Option<&Path>,
) -> Result<SandboxPolicy, SandboxError> {
    let file = file.unwrap_or(Path::new(DEFAULT_POLICY_FILE));
    let path: PathBuf = if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.join(file)
    };

    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("No policy file at {}, using defaults", path.display());
            return Ok(SandboxPolicy::default());
        }
        Err(source) => return Err(SandboxError::PolicyRead { path, source }),
    };

    let policy: SandboxPolicy = serde_yml::from_str(&contents).map_err(|source| {
        warn!("Policy file {} failed to parse", path.display());
        SandboxError::PolicyParse { path, source }
    })?;
    validate(&policy)?;
    Ok(policy)
}
