//! Structural validation of policy documents
//!
//! Validation only checks constraints; it never injects defaults. Missing
//! optional sections default through serde, and merging is the merger's job.

use glob::Pattern;
use serde_json::Value;
use url::Url;

use super::SandboxPolicy;
use crate::error::SandboxError;

/// Parse an untyped YAML document into a validated [`SandboxPolicy`].
pub fn parse_policy(document: &str) -> Result<SandboxPolicy, SandboxError> {
    let policy: SandboxPolicy =
        serde_yml::from_str(document).map_err(|source| SandboxError::PolicyParse {
            path: std::path::PathBuf::from("<inline>"),
            source,
        })?;
    validate(&policy)?;
    Ok(policy)
}

/// Check every constraint the policy model requires. The first violation
/// is reported with the offending field path.
pub fn validate(policy: &SandboxPolicy) -> Result<(), SandboxError> {
    if policy.fs.mounts.is_empty() {
        return Err(SandboxError::validation(
            "fs.mounts",
            "at least one mount must be defined",
        ));
    }
    for (i, mount) in policy.fs.mounts.iter().enumerate() {
        if mount.target.is_empty() {
            return Err(SandboxError::validation(
                &format!("fs.mounts[{i}].target"),
                "must not be empty",
            ));
        }
        if mount.source.as_deref() == Some("") {
            return Err(SandboxError::validation(
                &format!("fs.mounts[{i}].source"),
                "must not be empty when present",
            ));
        }
    }
    for (i, pattern) in policy.fs.deny_globs.iter().enumerate() {
        if Pattern::new(pattern).is_err() {
            return Err(SandboxError::validation(
                &format!("fs.denyGlobs[{i}]"),
                "must be a valid glob pattern",
            ));
        }
    }
    if policy.fs.max_total_mb == Some(0) {
        return Err(SandboxError::validation(
            "fs.maxTotalMb",
            "must be positive",
        ));
    }

    for (i, rule) in policy.net.allowlist.iter().enumerate() {
        if rule.host.is_empty() {
            return Err(SandboxError::validation(
                &format!("net.allowlist[{i}].host"),
                "host cannot be empty",
            ));
        }
        if let Some(ports) = &rule.ports {
            if ports.contains(&0) {
                return Err(SandboxError::validation(
                    &format!("net.allowlist[{i}].ports"),
                    "ports must be positive",
                ));
            }
        }
    }
    if let Some(proxy) = &policy.net.proxy {
        if Url::parse(&proxy.url).is_err() {
            return Err(SandboxError::validation(
                "net.proxy.url",
                "must be a well-formed URL",
            ));
        }
    }

    if let Some(cpu) = policy.proc.cpu_quota {
        if !(cpu.is_finite() && cpu > 0.0) {
            return Err(SandboxError::validation(
                "proc.cpuQuota",
                "must be positive",
            ));
        }
    }
    if policy.proc.memory_mb == Some(0) {
        return Err(SandboxError::validation(
            "proc.memoryMb",
            "must be positive",
        ));
    }
    if policy.proc.timeout_ms == Some(0) {
        return Err(SandboxError::validation(
            "proc.timeoutMs",
            "must be positive",
        ));
    }
    if policy.proc.workdir.as_deref() == Some("") {
        return Err(SandboxError::validation(
            "proc.workdir",
            "must not be empty when present",
        ));
    }

    for (key, value) in &policy.metadata {
        if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
            return Err(SandboxError::validation(
                &format!("metadata.{key}"),
                "values must be strings, numbers, or booleans",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::policy::{NetworkAllowlistRule, NetworkProxy};

    fn field_of(err: SandboxError) -> String {
        match err {
            SandboxError::PolicyValidation { field, .. } => field,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_default_policy_validates() {
        assert!(validate(&SandboxPolicy::default()).is_ok());
    }

    #[test]
    fn test_empty_mounts_rejected() {
        let mut policy = SandboxPolicy::default();
        policy.fs.mounts.clear();
        assert_eq!(field_of(validate(&policy).unwrap_err()), "fs.mounts");
    }

    #[test]
    fn test_empty_allowlist_host_rejected() {
        let mut policy = SandboxPolicy::default();
        policy.net.allowlist.push(NetworkAllowlistRule {
            host: String::new(),
            ports: None,
            methods: None,
            protocols: None,
        });
        assert_eq!(
            field_of(validate(&policy).unwrap_err()),
            "net.allowlist[0].host"
        );
    }

    #[test]
    fn test_zero_quotas_rejected() {
        let mut policy = SandboxPolicy::default();
        policy.proc.timeout_ms = Some(0);
        assert_eq!(field_of(validate(&policy).unwrap_err()), "proc.timeoutMs");

        let mut policy = SandboxPolicy::default();
        policy.proc.memory_mb = Some(0);
        assert_eq!(field_of(validate(&policy).unwrap_err()), "proc.memoryMb");

        let mut policy = SandboxPolicy::default();
        policy.proc.cpu_quota = Some(-0.5);
        assert_eq!(field_of(validate(&policy).unwrap_err()), "proc.cpuQuota");

        let mut policy = SandboxPolicy::default();
        policy.fs.max_total_mb = Some(0);
        assert_eq!(field_of(validate(&policy).unwrap_err()), "fs.maxTotalMb");
    }

    #[test]
    fn test_malformed_proxy_url_rejected() {
        let mut policy = SandboxPolicy::default();
        policy.net.proxy = Some(NetworkProxy {
            url: "not a url".to_string(),
            required: true,
        });
        assert_eq!(field_of(validate(&policy).unwrap_err()), "net.proxy.url");
    }

    #[test]
    fn test_bad_deny_glob_rejected() {
        let mut policy = SandboxPolicy::default();
        policy.fs.deny_globs.push("[".to_string());
        assert_eq!(
            field_of(validate(&policy).unwrap_err()),
            "fs.denyGlobs[4]"
        );
    }

    #[test]
    fn test_non_scalar_metadata_rejected() {
        let mut policy = SandboxPolicy::default();
        policy
            .metadata
            .insert("nested".to_string(), serde_json::json!({"a": 1}));
        assert_eq!(
            field_of(validate(&policy).unwrap_err()),
            "metadata.nested"
        );
        let mut policy = SandboxPolicy::default();
        policy.metadata.insert("ok".to_string(), Value::Bool(true));
        assert!(validate(&policy).is_ok());
    }

    #[test]
    fn test_parse_policy_accepts_yaml_document() {
        let yaml = r#"
fs:
  mounts:
    - source: ./workspace
      target: /workspace
      writable: true
net:
  enabled: false
proc:
  timeoutMs: 5000
"#;
        let policy = parse_policy(yaml).unwrap();
        assert_eq!(policy.fs.mounts[0].target, "/workspace");
        assert_eq!(policy.proc.timeout_ms, Some(5_000));
        assert!(policy.fs.deny_globs.is_empty());
        assert!(policy.metadata.is_empty());
    }

    #[test]
    fn test_parse_policy_rejects_garbage() {
        assert!(matches!(
            parse_policy("fs: [not, a, policy]").unwrap_err(),
            SandboxError::PolicyParse { .. }
        ));
    }
}
