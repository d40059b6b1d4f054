/// Execution Engine - Process Boundary for Untrusted Code
///
/// **Core Responsibility:**
/// Run a program file under a given runtime variant with one test input on
/// stdin, and report what happened.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (interpreter command, pipes, timeout)
/// - Engine does NOT compare outputs
/// - Engine does NOT decide which variant to use
/// - Engine returns an `ExecutionOutcome` for the caller to judge
///
/// Every call launches a fresh process; nothing survives across calls. The
/// only cancellation mechanism is the wall-clock timeout, after which the
/// child is killed and no partial output is reported.

use crate::config::VariantConfigManager;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use synthgrade_common::types::Variant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Default wall-clock limit for one program run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a single sandboxed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exited without writing to stderr; stdout is right-trimmed
    Completed(String),
    /// Launch failure, undecodable output, or anything written to stderr
    Error(String),
    /// Killed after exceeding the wall-clock limit
    TimedOut { limit: Duration },
}

impl ExecutionOutcome {
    /// Classify captured streams. Any stderr text counts as an error.
    pub fn from_streams(stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        let stderr = String::from_utf8_lossy(&stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return ExecutionOutcome::Error(stderr.to_string());
        }

        match String::from_utf8(stdout) {
            Ok(stdout) => ExecutionOutcome::Completed(stdout.trim_end().to_string()),
            Err(e) => ExecutionOutcome::Error(format!("Error: output is not valid UTF-8: {}", e)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Completed(_) => "completed",
            ExecutionOutcome::Error(_) => "error",
            ExecutionOutcome::TimedOut { .. } => "timed_out",
        }
    }

    /// Collapse into output-or-reason, the form graders consume
    pub fn into_result(self) -> Result<String, String> {
        match self {
            ExecutionOutcome::Completed(stdout) => Ok(stdout),
            ExecutionOutcome::Error(reason) => Err(reason),
            ExecutionOutcome::TimedOut { limit } => Err(format!(
                "Error: Execution timed out after {}ms. Check input formatting.",
                limit.as_millis()
            )),
        }
    }
}

/// Swappable execution backend
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Extension for the program file written for `variant`
    fn file_extension(&self, _variant: Variant) -> String {
        ".py".to_string()
    }

    /// Run `program` under `variant`, feeding `stdin`
    async fn run(&self, variant: Variant, program: &Path, stdin: &str) -> ExecutionOutcome;
}

/// Runs programs as local child processes of the worker
pub struct LocalEngine {
    config_manager: VariantConfigManager,
    timeout: Duration,
}

impl LocalEngine {
    pub fn new(config_manager: VariantConfigManager) -> Self {
        Self {
            config_manager,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ExecutionEngine for LocalEngine {
    fn file_extension(&self, variant: Variant) -> String {
        self.config_manager.get_command(variant).file_extension.clone()
    }

    async fn run(&self, variant: Variant, program: &Path, stdin: &str) -> ExecutionOutcome {
        let exec = self.config_manager.get_command(variant);

        let mut child = match Command::new(&exec.command)
            .args(&exec.args)
            .arg(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::Error(format!(
                    "Error: failed to launch '{}': {}",
                    exec.command, e
                ))
            }
        };

        // Feed stdin concurrently so a program that writes before reading
        // cannot fill its stdout pipe and stall.
        if let Some(mut pipe) = child.stdin.take() {
            let input = stdin.to_owned();
            tokio::spawn(async move {
                // The program may exit without consuming its input
                let _ = pipe.write_all(input.as_bytes()).await;
            });
        }

        let start = Instant::now();
        // On timeout the future owning the child is dropped, which kills it
        let outcome = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => ExecutionOutcome::TimedOut {
                limit: self.timeout,
            },
            Ok(Err(e)) => ExecutionOutcome::Error(format!("Error: {}", e)),
            Ok(Ok(output)) => ExecutionOutcome::from_streams(output.stdout, output.stderr),
        };

        debug!(
            variant = %variant,
            command = %exec.command,
            elapsed_ms = start.elapsed().as_millis() as u64,
            outcome = outcome.kind(),
            "Program run finished"
        );

        outcome
    }
}
