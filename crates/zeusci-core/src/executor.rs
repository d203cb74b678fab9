//! The `Container` trait: lifecycle of one container running a stage, plus
//! the structural result of running an external command.
//!
//! Container runtimes (Docker today) implement this trait; the scheduler and
//! step logic depend only on it.

use async_trait::async_trait;

use crate::Result;

/// The outcome of spawning an external command and waiting for it: the
/// shared result shape for both the host-level process executor and a
/// container's `exec`.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Specification for the container one stage runs in.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// `<stage-name>-<exec_id>`.
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    pub working_directory: Option<String>,
    pub username: String,
}

/// Builds a [`Container`] for one stage run. Lets the scheduler stay
/// ignorant of which container runtime (Docker today) actually backs it.
pub trait ContainerFactory: Send + Sync {
    fn create(&self, spec: ContainerSpec, workspace_dir: std::path::PathBuf) -> Box<dyn Container>;
}

/// Lifecycle of one container for the duration of one stage.
#[async_trait]
pub trait Container: Send + Sync {
    /// Acquire an allocator ticket for the owning user (blocking until
    /// granted) and launch a detached container. Releases the ticket on
    /// failure.
    async fn start(&mut self) -> Result<()>;

    /// Run `sh -c <command>` inside the container with the configured env
    /// and working directory. Never fails on non-zero exit; the caller
    /// inspects the returned output.
    async fn exec(&self, command: &str) -> Result<ProcessOutput>;

    /// Enumerate `glob` under `root` inside the container and copy each
    /// match into the workflow's workspace directory.
    async fn persist(&self, root: &str, glob: &str) -> Result<()>;

    /// Ensure `dest` exists inside the container, then copy the entire
    /// workflow workspace directory into it.
    async fn attach(&self, dest: &str) -> Result<()>;

    /// Force-remove the container (idempotent) and release the allocator
    /// ticket. Safe to call after a failed `start`.
    async fn stop(&mut self);

    /// Wall-clock time the container was running, once stopped.
    fn duration(&self) -> Option<std::time::Duration>;
}
