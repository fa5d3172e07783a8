//! Sandboxed code tool — run POSIX shell snippets under the policy engine
//!
//! The adapter between a host agent runtime and the container runner: it
//! loads the policy file, layers configured and per-call overrides, hands
//! the snippet to a [`SandboxRunner`], and converts every fatal sandbox
//! error into a structured error result instead of crashing the host.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::SandboxError;
use crate::policy::{SandboxPolicyOverrides, load_policy, merge_policy};
use crate::runner::{SandboxResult, SandboxRunner};
use crate::tools::{ToolHandler, ToolOutput, json_schema};

pub const SANDBOXED_CODE_TOOL_NAME: &str = "sandboxed_code.run";

const DEFAULT_TEXT_SUMMARY_LIMIT: usize = 2_000;

/// Tool configuration. `policy_cwd` anchors relative policy file lookups;
/// `default_overrides` apply before any per-call overrides.
#[derive(Debug, Clone)]
pub struct SandboxedCodeConfig {
    pub policy_file: Option<PathBuf>,
    pub policy_cwd: PathBuf,
    pub default_overrides: Option<SandboxPolicyOverrides>,
    /// Character budget for the human-readable summary, split between
    /// stdout and stderr.
    pub max_summary_chars: usize,
}

impl Default for SandboxedCodeConfig {
    fn default() -> Self {
        Self {
            policy_file: None,
            policy_cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_overrides: None,
            max_summary_chars: DEFAULT_TEXT_SUMMARY_LIMIT,
        }
    }
}

/// Executes snippets through a [`SandboxRunner`] under the merged policy.
pub struct SandboxedCodeTool {
    runner: Arc<dyn SandboxRunner>,
    config: SandboxedCodeConfig,
}

impl SandboxedCodeTool {
    pub fn new(runner: Arc<dyn SandboxRunner>, config: SandboxedCodeConfig) -> Self {
        Self { runner, config }
    }

    async fn run(
        &self,
        code: &str,
        call_overrides: Option<&SandboxPolicyOverrides>,
    ) -> Result<SandboxResult, SandboxError> {
        let base = load_policy(&self.config.policy_cwd, self.config.policy_file.as_deref()).await?;
        let with_defaults = merge_policy(&base, self.config.default_overrides.as_ref());
        let effective = merge_policy(&with_defaults, call_overrides);
        self.runner
            .exec(&ensure_trailing_newline(code), &effective)
            .await
    }
}

#[async_trait]
impl ToolHandler for SandboxedCodeTool {
    fn name(&self) -> &str {
        SANDBOXED_CODE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute POSIX shell snippets inside the hardened sandbox container. \
         Filesystem, network, and resource constraints come from the sandbox \
         policy; per-call policyOverrides can tighten or adjust them."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "code": {
                    "type": "string",
                    "description": "Shell snippet to execute in the sandbox"
                },
                "policyOverrides": {
                    "type": "object",
                    "description": "Partial sandbox policy merged over the loaded policy for this call"
                }
            }),
            vec!["code"],
        )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let code = input
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Missing 'code' parameter"))?;
        if code.trim().is_empty() {
            return Err(anyhow!("code must not be empty"));
        }

        let call_overrides: Option<SandboxPolicyOverrides> = match input.get("policyOverrides") {
            Some(value) if !value.is_null() => Some(
                serde_json::from_value(value.clone())
                    .context("Invalid 'policyOverrides' parameter")?,
            ),
            _ => None,
        };

        match self.run(code, call_overrides.as_ref()).await {
            Ok(result) => Ok(ToolOutput::success(
                summarize(&result, self.config.max_summary_chars),
                serde_json::json!({
                    "exitCode": result.exit_code,
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                    "effectivePolicy": result.effective_policy,
                    "resourceUsage": result.resource_usage,
                    "outputTruncated": result.output_truncated,
                }),
            )),
            Err(err) => Ok(ToolOutput::error(
                format!("Sandbox execution failed: {err}"),
                serde_json::json!({
                    "error": { "name": err.class(), "message": err.to_string() }
                }),
            )),
        }
    }
}

fn ensure_trailing_newline(code: &str) -> String {
    if code.ends_with('\n') {
        code.to_string()
    } else {
        format!("{code}\n")
    }
}

fn summarize(result: &SandboxResult, limit: usize) -> String {
    let exit_code = result
        .exit_code
        .map_or_else(|| "null".to_string(), |code| code.to_string());
    let mut lines = vec![
        format!("exitCode: {exit_code}"),
        format!("wallTimeMs: {}", result.resource_usage.wall_time_ms),
    ];
    if result.output_truncated {
        lines.push("stdout/stderr truncated by sandbox to stay within limits".to_string());
    }

    // even split; the head side of each ellipsized stream keeps the remainder
    let half_limit = limit / 2;
    let stdout = ellipsize(&result.stdout, half_limit);
    if !stdout.is_empty() {
        lines.push(format!("stdout:\n{stdout}"));
    }
    let stderr = ellipsize(&result.stderr, half_limit);
    if !stderr.is_empty() {
        lines.push(format!("stderr:\n{stderr}"));
    }

    lines.join("\n\n")
}

/// Keep the head and tail of an overlong value, joined by an ellipsis.
fn ellipsize(value: &str, limit: usize) -> String {
    let count = value.chars().count();
    if limit == 0 || count <= limit {
        return value.to_string();
    }
    if limit <= 4 {
        let head: String = value.chars().take(limit).collect();
        return format!("{head}...");
    }
    let head_len = (limit - 3).div_ceil(2);
    let tail_len = limit - 3 - head_len;
    let head: String = value.chars().take(head_len).collect();
    let tail: String = value.chars().skip(count - tail_len).collect();
    format!("{head}...{tail}")
}
