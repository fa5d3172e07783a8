//! Mount resolution — declared mounts to concrete host paths

use std::path::{Path, PathBuf};

use crate::error::SandboxError;
use crate::policy::Mount;

/// A declared mount plus the absolute host path the runtime will bind.
/// `resolved_source` stays `None` for ephemeral or source-less mounts.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMount {
    pub mount: Mount,
    pub resolved_source: Option<PathBuf>,
}

impl ResolvedMount {
    pub fn unresolved(mount: Mount) -> Self {
        Self {
            mount,
            resolved_source: None,
        }
    }
}

/// Resolve declared mounts against a workspace root.
///
/// Relative sources resolve under `workspace_root`; absolute sources pass
/// through. The backing directory is created recursively when missing (a
/// pre-existing directory is fine). Other I/O failures propagate.
pub async fn resolve_mounts(
    mounts: &[Mount],
    workspace_root: &Path,
) -> Result<Vec<ResolvedMount>, SandboxError> {
    let mut resolved = Vec::with_capacity(mounts.len());
    for mount in mounts {
        let declared = match mount.source.as_deref() {
            Some(source) if !mount.kind.is_ephemeral() => Path::new(source),
            _ => {
                resolved.push(ResolvedMount::unresolved(mount.clone()));
                continue;
            }
        };
        let path = if declared.is_absolute() {
            declared.to_path_buf()
        } else {
            workspace_root.join(declared)
        };
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| SandboxError::MountResolution {
                path: path.clone(),
                source,
            })?;
        resolved.push(ResolvedMount {
            mount: mount.clone(),
            resolved_source: Some(path),
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MountKind;

    fn bind(source: Option<&str>, target: &str) -> Mount {
        Mount {
            source: source.map(str::to_string),
            target: target.to_string(),
            writable: true,
            kind: MountKind::Bind,
        }
    }

    #[tokio::test]
    async fn test_tmpfs_passes_through_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let mounts = vec![Mount {
            source: None,
            target: "/tmp".to_string(),
            writable: true,
            kind: MountKind::Tmpfs,
        }];
        let resolved = resolve_mounts(&mounts, dir.path()).await.unwrap();
        assert!(resolved[0].resolved_source.is_none());
    }

    #[tokio::test]
    async fn test_sourceless_bind_passes_through_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_mounts(&[bind(None, "/workspace")], dir.path())
            .await
            .unwrap();
        assert!(resolved[0].resolved_source.is_none());
    }

    #[tokio::test]
    async fn test_relative_source_resolves_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_mounts(&[bind(Some("./workspace"), "/workspace")], dir.path())
            .await
            .unwrap();
        let expected = dir.path().join("./workspace");
        assert_eq!(resolved[0].resolved_source.as_deref(), Some(expected.as_path()));
        assert!(expected.is_dir());
    }

    #[tokio::test]
    async fn test_absolute_source_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("data");
        std::fs::create_dir(&existing).unwrap();
        let source = existing.to_string_lossy().to_string();
        let resolved = resolve_mounts(&[bind(Some(&source), "/data")], Path::new("/elsewhere"))
            .await
            .unwrap();
        assert_eq!(
            resolved[0].resolved_source.as_deref(),
            Some(existing.as_path())
        );
    }

    #[tokio::test]
    async fn test_pre_existing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("workspace")).unwrap();
        let resolved = resolve_mounts(&[bind(Some("workspace"), "/workspace")], dir.path()).await;
        assert!(resolved.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_creation_failure_propagates() {
        // /proc is not writable, so directory creation must fail
        let mounts = [bind(Some("/proc/cordon-test/sub"), "/x")];
        let err = resolve_mounts(&mounts, Path::new("/")).await.unwrap_err();
        assert!(matches!(err, SandboxError::MountResolution { .. }));
    }
}
