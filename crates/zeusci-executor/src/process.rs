//! Spawns external commands (the `docker` CLI, chiefly) and captures their
//! output. The layer [`crate::docker::DockerContainer`] is built on top of;
//! nothing above this module talks to a subprocess directly.

use tokio::process::Command;
use tracing::debug;
use zeusci_core::executor::ProcessOutput;
use zeusci_core::{Error, Result};

/// Runs a program to completion and captures its stdout/stderr/exit code.
/// Never itself treats a non-zero exit as an error — callers decide that.
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub async fn run(program: &str, args: &[&str]) -> Result<ProcessOutput> {
        debug!(program, ?args, "spawning process");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::ExecutionFailed(format!("failed to spawn {program}: {e}")))?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = ProcessExecutor::run("sh", &["-c", "echo hi; exit 3"])
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.exit_code, 3);
        assert!(!out.succeeded());
    }

    #[tokio::test]
    async fn succeeded_on_zero_exit() {
        let out = ProcessExecutor::run("true", &[]).await.unwrap();
        assert!(out.succeeded());
    }
}
