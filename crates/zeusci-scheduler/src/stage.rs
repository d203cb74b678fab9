//! A [`Stage`]: one DAG node — a container plus its ordered steps and an
//! optional branch/tag guard.

use std::time::Duration;

use regex::Regex;
use zeusci_core::executor::{Container, ContainerFactory, ContainerSpec, ProcessOutput};
use zeusci_core::pipeline::{JobSpec, RunCondition, StepSpec};
use zeusci_core::{Result, Status};

use crate::workflow::BuildContext;

/// Runtime state of one workflow stage.
pub struct Stage {
    pub name: String,
    pub requires: Vec<String>,
    pub guard: Option<RunCondition>,
    pub image: String,
    pub working_directory: Option<String>,
    pub steps: Vec<StepSpec>,
    pub state: Status,
    pub stdout: String,
    pub stderr: String,
    pub duration: Option<Duration>,
}

impl Stage {
    pub fn new(
        name: String,
        requires: Vec<String>,
        guard: Option<RunCondition>,
        job: &JobSpec,
    ) -> Self {
        Self {
            name,
            requires,
            guard,
            image: job.image.clone(),
            working_directory: job.working_directory.clone(),
            steps: job.steps.clone(),
            state: Status::Created,
            stdout: String::new(),
            stderr: String::new(),
            duration: None,
        }
    }

    fn guard_matches(&self, ctx: &BuildContext) -> bool {
        let Some(guard) = &self.guard else {
            return true;
        };
        let branch_ok = guard
            .branch
            .as_deref()
            .map(|pattern| Regex::new(pattern).is_ok_and(|re| re.is_match(&ctx.branch)))
            .unwrap_or(true);
        let tag_ok = guard
            .tag
            .as_deref()
            .map(|pattern| Regex::new(pattern).is_ok_and(|re| re.is_match(&ctx.tag)))
            .unwrap_or(true);
        branch_ok && tag_ok
    }

    /// Run this stage to a terminal state: `skipped` if the guard doesn't
    /// match, otherwise acquire a container, run every step in order, and
    /// tear the container down regardless of outcome.
    pub async fn run(
        &mut self,
        factory: &dyn ContainerFactory,
        workspace_dir: std::path::PathBuf,
        ctx: &BuildContext,
    ) {
        if !self.guard_matches(ctx) {
            self.state = Status::Skipped;
            return;
        }

        self.state = Status::Running;

        let mut env = ctx.repo_env.clone();
        env.push(("ZEUS_JOB".to_string(), self.name.clone()));
        env.push(("ZEUS_TAG".to_string(), ctx.tag.clone()));
        env.push(("ZEUS_BRANCH".to_string(), ctx.branch.clone()));
        env.push(("ZEUS_USERNAME".to_string(), ctx.username.clone()));

        let spec = ContainerSpec {
            name: format!("{}-{}", self.name, ctx.exec_id),
            image: self.image.clone(),
            env,
            working_directory: self.working_directory.clone(),
            username: ctx.username.clone(),
        };
        let mut container = factory.create(spec, workspace_dir);

        self.state = self.execute(container.as_mut(), ctx).await;
        container.stop().await;
        self.duration = container.duration();
    }

    async fn execute(&mut self, container: &mut dyn Container, ctx: &BuildContext) -> Status {
        if let Err(e) = container.start().await {
            self.stderr.push_str(&e.to_string());
            return Status::Failed;
        }

        let steps = self.steps.clone();
        for step in &steps {
            match self.run_step(step, container, ctx).await {
                Ok(output) => {
                    self.stdout.push_str(&output.stdout);
                    self.stderr.push_str(&output.stderr);
                    if !output.succeeded() {
                        return Status::Failed;
                    }
                }
                Err(e) => {
                    self.stderr.push_str(&e.to_string());
                    return Status::Error;
                }
            }
        }
        Status::Passed
    }

    async fn run_step(
        &self,
        step: &StepSpec,
        container: &mut dyn Container,
        ctx: &BuildContext,
    ) -> Result<ProcessOutput> {
        match step {
            StepSpec::Checkout => {
                let mut command = format!("git clone {} .", ctx.clone_url);
                if let Some(checkout_ref) = &ctx.checkout_ref {
                    command.push_str(&format!(" && git checkout {checkout_ref}"));
                }
                container.exec(&command).await
            }
            StepSpec::Run { command, .. } => container.exec(command).await,
            StepSpec::PersistToWorkspace { root, paths } => {
                container.persist(root, paths).await?;
                Ok(ProcessOutput::default())
            }
            StepSpec::AttachWorkspace { at } => {
                container.attach(at).await?;
                Ok(ProcessOutput::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::{collections::VecDeque, path::PathBuf};
    use zeusci_core::Error;

    struct ScriptedContainer {
        fail_start: bool,
        outputs: StdMutex<VecDeque<ProcessOutput>>,
        persist_ok: bool,
    }

    #[async_trait]
    impl Container for ScriptedContainer {
        async fn start(&mut self) -> Result<()> {
            if self.fail_start {
                Err(Error::ContainerStartError("daemon unreachable".to_string()))
            } else {
                Ok(())
            }
        }

        async fn exec(&self, _command: &str) -> Result<ProcessOutput> {
            Ok(self.outputs.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn persist(&self, _root: &str, _glob: &str) -> Result<()> {
            if self.persist_ok {
                Ok(())
            } else {
                Err(Error::ExecutionFailed("glob expansion failed".to_string()))
            }
        }

        async fn attach(&self, _dest: &str) -> Result<()> {
            Ok(())
        }

        async fn stop(&mut self) {}

        fn duration(&self) -> Option<Duration> {
            Some(Duration::from_secs(3))
        }
    }

    struct ScriptedFactory {
        fail_start: bool,
        outputs: Vec<ProcessOutput>,
    }

    impl ContainerFactory for ScriptedFactory {
        fn create(&self, _spec: ContainerSpec, _workspace_dir: PathBuf) -> Box<dyn Container> {
            Box::new(ScriptedContainer {
                fail_start: self.fail_start,
                outputs: StdMutex::new(self.outputs.clone().into()),
                persist_ok: true,
            })
        }
    }

    struct PanicsOnCreateFactory;

    impl ContainerFactory for PanicsOnCreateFactory {
        fn create(&self, _spec: ContainerSpec, _workspace_dir: PathBuf) -> Box<dyn Container> {
            panic!("a guarded-out stage must never request a container");
        }
    }

    fn ctx() -> BuildContext {
        BuildContext {
            exec_id: "deadbeef".to_string(),
            clone_url: "https://github.com/acme/widgets.git".to_string(),
            checkout_ref: Some("cafef00d".to_string()),
            branch: "feature-x".to_string(),
            tag: String::new(),
            username: "octocat".to_string(),
            repo_env: vec![],
        }
    }

    fn job() -> JobSpec {
        JobSpec {
            image: "alpine:3".to_string(),
            working_directory: None,
            steps: vec![
                StepSpec::Checkout,
                StepSpec::Run {
                    name: Some("test".to_string()),
                    command: "npm test".to_string(),
                },
            ],
        }
    }

    fn ok_output() -> ProcessOutput {
        ProcessOutput {
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    fn failing_output() -> ProcessOutput {
        ProcessOutput {
            stdout: String::new(),
            stderr: "FAIL\n".to_string(),
            exit_code: 1,
        }
    }

    #[tokio::test]
    async fn guard_mismatch_skips_without_a_container() {
        let mut stage = Stage::new(
            "deploy".to_string(),
            vec![],
            Some(RunCondition {
                branch: Some("^main$".to_string()),
                tag: None,
            }),
            &job(),
        );
        stage
            .run(&PanicsOnCreateFactory, PathBuf::from("/tmp/ws"), &ctx())
            .await;
        assert_eq!(stage.state, Status::Skipped);
    }

    #[tokio::test]
    async fn all_steps_passing_yields_passed() {
        let mut stage = Stage::new("build".to_string(), vec![], None, &job());
        let factory = ScriptedFactory {
            fail_start: false,
            outputs: vec![ok_output(), ok_output()],
        };
        stage.run(&factory, PathBuf::from("/tmp/ws"), &ctx()).await;
        assert_eq!(stage.state, Status::Passed);
        assert!(stage.duration.is_some());
    }

    #[tokio::test]
    async fn first_failing_step_fails_the_stage_and_stops() {
        let mut stage = Stage::new("build".to_string(), vec![], None, &job());
        let factory = ScriptedFactory {
            fail_start: false,
            outputs: vec![ok_output(), failing_output()],
        };
        stage.run(&factory, PathBuf::from("/tmp/ws"), &ctx()).await;
        assert_eq!(stage.state, Status::Failed);
        assert!(stage.stderr.contains("FAIL"));
    }

    #[tokio::test]
    async fn container_start_failure_fails_the_stage() {
        let mut stage = Stage::new("build".to_string(), vec![], None, &job());
        let factory = ScriptedFactory {
            fail_start: true,
            outputs: vec![],
        };
        stage.run(&factory, PathBuf::from("/tmp/ws"), &ctx()).await;
        assert_eq!(stage.state, Status::Failed);
        assert!(stage.stderr.contains("daemon unreachable"));
    }
}
