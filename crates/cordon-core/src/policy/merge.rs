//! Deterministic policy merging
//!
//! Sequences (mounts, deny globs, allowlist) are replaced wholesale instead
//! of concatenated: a partial override must never silently retain a stale
//! entry the caller intended to remove. Key-value fields (env, metadata)
//! merge key-by-key with the override winning.

use super::{SandboxPolicy, SandboxPolicyOverrides};

/// Combine a base policy with optional overrides, producing a fresh value.
///
/// The result owns all of its data; mutating it never affects `base`.
/// Absent overrides yield a deep copy of `base`.
pub fn merge_policy(
    base: &SandboxPolicy,
    overrides: Option<&SandboxPolicyOverrides>,
) -> SandboxPolicy {
    let mut result = base.clone();
    let Some(overrides) = overrides else {
        return result;
    };

    if let Some(fs) = &overrides.fs {
        if let Some(mounts) = &fs.mounts {
            result.fs.mounts = mounts.clone();
        }
        if let Some(deny_globs) = &fs.deny_globs {
            result.fs.deny_globs = deny_globs.clone();
        }
        if let Some(max_total_mb) = fs.max_total_mb {
            result.fs.max_total_mb = Some(max_total_mb);
        }
    }

    if let Some(net) = &overrides.net {
        if let Some(enabled) = net.enabled {
            result.net.enabled = enabled;
        }
        if let Some(allowlist) = &net.allowlist {
            result.net.allowlist = allowlist.clone();
        }
        if let Some(proxy) = &net.proxy {
            result.net.proxy = Some(proxy.clone());
        }
    }

    if let Some(proc) = &overrides.proc {
        if let Some(cpu_quota) = proc.cpu_quota {
            result.proc.cpu_quota = Some(cpu_quota);
        }
        if let Some(memory_mb) = proc.memory_mb {
            result.proc.memory_mb = Some(memory_mb);
        }
        if let Some(timeout_ms) = proc.timeout_ms {
            result.proc.timeout_ms = Some(timeout_ms);
        }
        if let Some(uid) = proc.uid {
            result.proc.uid = Some(uid);
        }
        if let Some(gid) = proc.gid {
            result.proc.gid = Some(gid);
        }
        if let Some(max_child_processes) = proc.max_child_processes {
            result.proc.max_child_processes = Some(max_child_processes);
        }
        if let Some(env) = &proc.env {
            result
                .proc
                .env
                .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(workdir) = &proc.workdir {
            result.proc.workdir = Some(workdir.clone());
        }
    }

    if let Some(metadata) = &overrides.metadata {
        result
            .metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::Value;

    use super::*;
    use crate::policy::{
        FilesystemPolicyOverrides, Mount, MountKind, NetworkAllowlistRule,
        NetworkPolicyOverrides, NetworkProxy, ProcessPolicyOverrides,
    };

    fn overrides_with_proc(proc: ProcessPolicyOverrides) -> SandboxPolicyOverrides {
        SandboxPolicyOverrides {
            proc: Some(proc),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_without_overrides_is_deep_copy() {
        let base = SandboxPolicy::default();
        let mut merged = merge_policy(&base, None);
        assert_eq!(merged, base);

        merged.fs.mounts.clear();
        merged.proc.env.insert("K".to_string(), "V".to_string());
        merged
            .metadata
            .insert("x".to_string(), Value::Bool(true));
        assert_eq!(base.fs.mounts.len(), 3);
        assert!(base.proc.env.is_empty());
        assert!(!base.metadata.contains_key("x"));
    }

    #[test]
    fn test_scalar_overrides_replace() {
        let base = SandboxPolicy::default();
        let overrides = overrides_with_proc(ProcessPolicyOverrides {
            cpu_quota: Some(2.0),
            timeout_ms: Some(5_000),
            ..Default::default()
        });
        let merged = merge_policy(&base, Some(&overrides));
        assert_eq!(merged.proc.cpu_quota, Some(2.0));
        assert_eq!(merged.proc.timeout_ms, Some(5_000));
        // untouched fields survive
        assert_eq!(merged.proc.memory_mb, base.proc.memory_mb);
        assert_eq!(merged.proc.uid, base.proc.uid);
    }

    #[test]
    fn test_sequences_replace_wholesale() {
        let base = SandboxPolicy::default();
        let overrides = SandboxPolicyOverrides {
            fs: Some(FilesystemPolicyOverrides {
                mounts: Some(vec![Mount {
                    source: Some("/srv/data".to_string()),
                    target: "/data".to_string(),
                    writable: false,
                    kind: MountKind::Bind,
                }]),
                deny_globs: Some(vec![]),
                ..Default::default()
            }),
            net: Some(NetworkPolicyOverrides {
                allowlist: Some(vec![NetworkAllowlistRule {
                    host: "crates.io".to_string(),
                    ports: None,
                    methods: None,
                    protocols: None,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge_policy(&base, Some(&overrides));
        assert_eq!(merged.fs.mounts.len(), 1);
        assert_eq!(merged.fs.mounts[0].target, "/data");
        assert!(merged.fs.deny_globs.is_empty());
        assert_eq!(merged.net.allowlist.len(), 1);
        // base untouched
        assert_eq!(base.fs.mounts.len(), 3);
        assert_eq!(base.fs.deny_globs.len(), 4);
    }

    #[test]
    fn test_env_and_metadata_union_with_override_wins() {
        let mut base = SandboxPolicy::default();
        base.proc.env.insert("KEEP".to_string(), "base".to_string());
        base.proc.env.insert("CLOBBER".to_string(), "base".to_string());
        base.metadata
            .insert("label".to_string(), Value::String("base".to_string()));

        let overrides = SandboxPolicyOverrides {
            proc: Some(ProcessPolicyOverrides {
                env: Some(BTreeMap::from([(
                    "CLOBBER".to_string(),
                    "override".to_string(),
                )])),
                ..Default::default()
            }),
            metadata: Some(BTreeMap::from([(
                "run".to_string(),
                Value::Number(7.into()),
            )])),
            ..Default::default()
        };
        let merged = merge_policy(&base, Some(&overrides));
        assert_eq!(merged.proc.env["KEEP"], "base");
        assert_eq!(merged.proc.env["CLOBBER"], "override");
        assert_eq!(merged.metadata["label"], Value::String("base".to_string()));
        assert_eq!(merged.metadata["run"], Value::Number(7.into()));
    }

    #[test]
    fn test_proxy_replaced_as_whole_object() {
        let mut base = SandboxPolicy::default();
        base.net.proxy = Some(NetworkProxy {
            url: "http://old-proxy:3128".to_string(),
            required: false,
        });
        let overrides = SandboxPolicyOverrides {
            net: Some(NetworkPolicyOverrides {
                proxy: Some(NetworkProxy {
                    url: "http://proxy:8080".to_string(),
                    required: true,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge_policy(&base, Some(&overrides));
        let proxy = merged.net.proxy.unwrap();
        assert_eq!(proxy.url, "http://proxy:8080");
        assert!(proxy.required);
    }

    #[test]
    fn test_layered_merges_apply_later_override_last() {
        let base = SandboxPolicy::default();
        let first = overrides_with_proc(ProcessPolicyOverrides {
            timeout_ms: Some(1_000),
            cpu_quota: Some(2.0),
            ..Default::default()
        });
        let second = overrides_with_proc(ProcessPolicyOverrides {
            timeout_ms: Some(9_000),
            ..Default::default()
        });
        let merged = merge_policy(&merge_policy(&base, Some(&first)), Some(&second));
        assert_eq!(merged.proc.timeout_ms, Some(9_000));
        assert_eq!(merged.proc.cpu_quota, Some(2.0));
        assert_eq!(merged.proc.memory_mb, base.proc.memory_mb);
    }
}
