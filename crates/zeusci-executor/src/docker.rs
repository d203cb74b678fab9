//! Docker-backed [`Container`]: lifecycle lives on `bollard`, matching the
//! original daemon-facing HTTP client; `exec`, `persist`, and `attach`
//! delegate to [`crate::process::ProcessExecutor`] driving the `docker` CLI,
//! so a stage's commands and copies go through the same process-spawn path
//! as checkout does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use futures::StreamExt;
use tracing::{info, warn};
use zeusci_core::executor::{Container, ContainerFactory, ContainerSpec, ProcessOutput};
use zeusci_core::{Allocator, Error, Result};

use crate::process::ProcessExecutor;

/// Time a stage is willing to wait for an allocator slot before giving up.
const ALLOCATOR_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub struct DockerContainer {
    spec: ContainerSpec,
    workspace_dir: PathBuf,
    docker: Docker,
    allocator: Arc<dyn Allocator>,
    container_id: Option<String>,
    /// Resolved working directory, once `start` has expanded a leading `~`.
    working_directory: Option<String>,
    started_at: Option<Instant>,
    duration: Option<Duration>,
}

impl DockerContainer {
    pub fn new(
        spec: ContainerSpec,
        workspace_dir: PathBuf,
        docker: Docker,
        allocator: Arc<dyn Allocator>,
    ) -> Self {
        Self {
            spec,
            workspace_dir,
            docker,
            allocator,
            container_id: None,
            working_directory: None,
            started_at: None,
            duration: None,
        }
    }

    fn exec_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if let Some(wd) = &self.working_directory {
            args.push("-w".to_string());
            args.push(wd.clone());
        }
        for (key, value) in &self.spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(self.spec.name.clone());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl Container for DockerContainer {
    async fn start(&mut self) -> Result<()> {
        self.allocator
            .acquire(&self.spec.username, ALLOCATOR_ACQUIRE_TIMEOUT)
            .await?;

        if let Err(e) = self.pull_and_create().await {
            self.allocator.return_container(&self.spec.username).await;
            return Err(e);
        }

        self.started_at = Some(Instant::now());

        if let Some(wd) = self.spec.working_directory.clone() {
            let resolved = if let Some(rest) = wd.strip_prefix('~') {
                let home = self.exec("echo $HOME").await?;
                format!("{}{}", home.stdout.trim(), rest)
            } else {
                wd
            };
            let mkdir = self.exec(&format!("mkdir -p {resolved}")).await?;
            if !mkdir.succeeded() {
                self.stop().await;
                return Err(Error::ContainerStartError(format!(
                    "failed to create working directory {resolved}: {}",
                    mkdir.stderr
                )));
            }
            self.working_directory = Some(resolved);
        }

        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<ProcessOutput> {
        let args = self.exec_args(command);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        ProcessExecutor::run("docker", &arg_refs).await
    }

    async fn persist(&self, root: &str, glob: &str) -> Result<()> {
        let list_cmd = format!("cd {root} && for f in {glob}; do echo \"$f\"; done");
        let listed = self.exec(&list_cmd).await?;
        if !listed.succeeded() {
            return Err(Error::ExecutionFailed(format!(
                "persist_to_workspace glob expansion failed: {}",
                listed.stderr
            )));
        }

        tokio::fs::create_dir_all(&self.workspace_dir)
            .await
            .map_err(|e| Error::Internal(format!("failed to create workspace dir: {e}")))?;

        for entry in listed.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let src = format!("{}:{root}/{entry}", self.spec.name);
            let dest = self.workspace_dir.to_string_lossy().into_owned();
            let out = ProcessExecutor::run("docker", &["cp", &src, &dest]).await?;
            if !out.succeeded() {
                return Err(Error::ExecutionFailed(format!(
                    "failed to copy {src} to workspace: {}",
                    out.stderr
                )));
            }
        }
        Ok(())
    }

    async fn attach(&self, dest: &str) -> Result<()> {
        let mkdir = self.exec(&format!("mkdir -p {dest}")).await?;
        if !mkdir.succeeded() {
            return Err(Error::ExecutionFailed(format!(
                "attach_workspace: failed to create {dest}: {}",
                mkdir.stderr
            )));
        }
        let src = format!("{}/.", self.workspace_dir.to_string_lossy());
        let dst = format!("{}:{dest}", self.spec.name);
        let out = ProcessExecutor::run("docker", &["cp", &src, &dst]).await?;
        if !out.succeeded() {
            return Err(Error::ExecutionFailed(format!(
                "attach_workspace: failed to copy workspace into {dest}: {}",
                out.stderr
            )));
        }
        Ok(())
    }

    async fn stop(&mut self) {
        if self.container_id.take().is_some() {
            let _ = self.docker.stop_container(&self.spec.name, None).await;
            let remove_opts = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = self
                .docker
                .remove_container(&self.spec.name, Some(remove_opts))
                .await
            {
                warn!(container = %self.spec.name, error = %e, "failed to remove container");
            }
        }
        self.allocator.return_container(&self.spec.username).await;
        if let Some(started) = self.started_at.take() {
            self.duration = Some(started.elapsed());
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl DockerContainer {
    async fn pull_and_create(&mut self) -> Result<()> {
        info!(image = %self.spec.image, "pulling image");
        let pull_opts = CreateImageOptions {
            from_image: self.spec.image.clone(),
            ..Default::default()
        };
        let mut pull_stream = self.docker.create_image(Some(pull_opts), None, None);
        while let Some(result) = pull_stream.next().await {
            if let Err(e) = result {
                warn!(error = %e, "pull warning");
            }
        }

        let env: Vec<String> = self
            .spec
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let config = Config {
            image: Some(self.spec.image.clone()),
            env: Some(env),
            // Stages exec multiple steps over the container's lifetime, so
            // it needs a long-lived foreground process rather than a
            // one-shot command.
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            tty: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let create_opts = CreateContainerOptions {
            name: self.spec.name.clone(),
            platform: None,
        };

        info!(container = %self.spec.name, "creating container");
        let created = self
            .docker
            .create_container(Some(create_opts), config)
            .await
            .map_err(|e| Error::ContainerStartError(format!("create_container: {e}")))?;

        info!(container = %self.spec.name, "starting container");
        self.docker
            .start_container(&self.spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ContainerStartError(format!("start_container: {e}")))?;

        self.container_id = Some(created.id);
        Ok(())
    }
}

/// Produces [`DockerContainer`]s sharing one Docker client and allocator.
pub struct DockerContainerFactory {
    docker: Docker,
    allocator: Arc<dyn Allocator>,
}

impl DockerContainerFactory {
    pub fn new(docker: Docker, allocator: Arc<dyn Allocator>) -> Self {
        Self { docker, allocator }
    }
}

impl ContainerFactory for DockerContainerFactory {
    fn create(&self, spec: ContainerSpec, workspace_dir: PathBuf) -> Box<dyn Container> {
        Box::new(DockerContainer::new(
            spec,
            workspace_dir,
            self.docker.clone(),
            self.allocator.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeusci_core::Result as CoreResult;

    struct AlwaysGrant;

    #[async_trait]
    impl Allocator for AlwaysGrant {
        async fn request_container(&self, _username: &str) -> CoreResult<bool> {
            Ok(true)
        }
        async fn return_container(&self, _username: &str) {}
    }

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "build-1-exec1".to_string(),
            image: "alpine:3".to_string(),
            env: vec![("ZEUS_BRANCH".to_string(), "main".to_string())],
            working_directory: Some("~/project".to_string()),
            username: "octocat".to_string(),
        }
    }

    #[test]
    fn exec_args_include_working_directory_and_env_once_resolved() {
        let mut container = DockerContainer::new(
            spec(),
            PathBuf::from("/tmp/ws"),
            Docker::connect_with_local_defaults().unwrap(),
            Arc::new(AlwaysGrant),
        );
        container.working_directory = Some("/home/circleci/project".to_string());
        let args = container.exec_args("npm test");
        assert!(args.contains(&"-w".to_string()));
        assert!(args.contains(&"/home/circleci/project".to_string()));
        assert!(args.contains(&"ZEUS_BRANCH=main".to_string()));
    }

    #[test]
    fn duration_is_none_before_start() {
        let container = DockerContainer::new(
            spec(),
            PathBuf::from("/tmp/ws"),
            Docker::connect_with_local_defaults().unwrap(),
            Arc::new(AlwaysGrant),
        );
        assert!(container.duration().is_none());
    }
}
