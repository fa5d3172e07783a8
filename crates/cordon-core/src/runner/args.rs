//! Translate a policy into `docker run` arguments
//!
//! Kept as a pure function so the exact flag ordering can be unit tested
//! without a container runtime installed.

use crate::error::SandboxError;
use crate::policy::SandboxPolicy;
use crate::runner::mounts::ResolvedMount;

/// Build the ordered argument list for one "run and remove" invocation.
///
/// Flag order is part of the contract: run-mode, network, resources,
/// identity, workdir, env, mounts, image, command.
pub fn build_run_args(
    image: &str,
    policy: &SandboxPolicy,
    mounts: &[ResolvedMount],
    command: Option<&[String]>,
) -> Result<Vec<String>, SandboxError> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];

    args.push("--network".to_string());
    args.push(if policy.net.enabled { "bridge" } else { "none" }.to_string());

    if let Some(cpu_quota) = policy.proc.cpu_quota {
        args.push("--cpus".to_string());
        args.push(cpu_quota.to_string());
    }
    if let Some(memory_mb) = policy.proc.memory_mb {
        args.push("--memory".to_string());
        args.push(format!("{memory_mb}m"));
    }
    if let Some(max_children) = policy.proc.max_child_processes {
        // one slot is reserved for the primary sandboxed process
        let limit = max_children.saturating_add(1).max(1);
        args.push("--pids-limit".to_string());
        args.push(limit.to_string());
    }

    if policy.proc.uid.is_some() || policy.proc.gid.is_some() {
        let uid = policy.proc.uid.unwrap_or(0);
        let gid = policy.proc.gid.unwrap_or(uid);
        args.push("--user".to_string());
        args.push(format!("{uid}:{gid}"));
    }

    if let Some(workdir) = &policy.proc.workdir {
        args.push("--workdir".to_string());
        args.push(workdir.clone());
    }

    for (key, value) in &policy.proc.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }

    for mount in mounts {
        args.push("--mount".to_string());
        args.push(mount_flag(mount)?);
    }

    args.push(image.to_string());

    if let Some(command) = command {
        args.extend(command.iter().cloned());
    }

    Ok(args)
}

fn mount_flag(mount: &ResolvedMount) -> Result<String, SandboxError> {
    let kind = &mount.mount.kind;
    let mut parts = vec![
        format!("type={}", kind.as_str()),
        format!("target={}", mount.mount.target),
    ];
    if !kind.is_ephemeral() {
        let source = mount
            .resolved_source
            .as_ref()
            .ok_or_else(|| SandboxError::ArgumentContract {
                target: mount.mount.target.clone(),
            })?;
        parts.push(format!("source={}", source.display()));
    }
    if !mount.mount.writable {
        parts.push("readonly".to_string());
    }
    Ok(parts.join(","))
}
