//! Drives one claimed [`Build`] from `starting` through to a terminal
//! status: fetch its pipeline config, run every workflow it defines, and
//! report the outcome back to GitHub.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use zeusci_core::{Build, Status};
use zeusci_db::{BuildRepo, RepoRepo, UserRepo};
use zeusci_reporter::{GithubReporter, StatusReporter};
use zeusci_scheduler::{BuildContext, Scheduler, Workflow};

use crate::pipeline_fetch::fetch_pipeline;

/// Where per-build workspace directories are created, matching the
/// original runner's fixed `/tmp/zeus-ci` staging area.
const WORKSPACE_ROOT: &str = "/tmp/zeus-ci";

pub struct Coordinator {
    pub build_repo: Arc<dyn BuildRepo>,
    pub repo_repo: Arc<dyn RepoRepo>,
    pub user_repo: Arc<dyn UserRepo>,
    pub scheduler: Arc<Scheduler>,
    pub http: reqwest::Client,
    pub runner_threads: usize,
    pub status_target_url: String,
}

impl Coordinator {
    pub async fn run_build(&self, build: Build) {
        let build_id = build.id;
        if let Err(e) = self.try_run_build(build).await {
            error!(build_id, error = %e, "build failed before producing a terminal status");
            let _ = self
                .build_repo
                .update_status(build_id, Status::Error)
                .await;
        }
    }

    async fn try_run_build(&self, build: Build) -> anyhow::Result<()> {
        self.build_repo
            .update_status(build.id, Status::Starting)
            .await?;

        let repo = self.repo_repo.get_by_name(&build.repo_name).await?;
        let user = self.user_repo.get_by_username(&repo.username).await?;
        let reporter = GithubReporter::new(user.token, self.status_target_url.clone());
        reporter.report(&build, Status::Starting).await.ok();

        let Some(checkout_ref) = build.resolve_checkout_ref() else {
            warn!(build_id = build.id, r#ref = %build.r#ref, "unresolvable ref, erroring build");
            self.build_repo.update_status(build.id, Status::Error).await?;
            reporter.report(&build, Status::Error).await.ok();
            return Ok(());
        };

        self.build_repo
            .update_status(build.id, Status::Running)
            .await?;
        reporter.report(&build, Status::Running).await.ok();

        let pipeline = match fetch_pipeline(&self.http, &build.repo_name, &checkout_ref).await {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!(build_id = build.id, error = %e, "pipeline config fetch failed, failing build");
                self.build_repo.update_status(build.id, Status::Failed).await?;
                reporter.report(&build, Status::Failed).await.ok();
                return Ok(());
            }
        };

        let mut repo_env = repo.env_vars.clone();
        repo_env.extend(build.env_bindings());

        let clone_url = format!("https://github.com/{}.git", build.repo_name);
        let workspace_root = PathBuf::from(WORKSPACE_ROOT);
        std::fs::create_dir_all(&workspace_root).ok();

        let mut overall = Status::Passed;
        for (workflow_name, entries) in &pipeline.workflows {
            let workflow = Workflow::new(
                build.id,
                workflow_name,
                entries,
                &pipeline.jobs,
                &workspace_root,
                self.runner_threads,
            )?;

            let ctx = BuildContext {
                exec_id: workflow.exec_id.clone(),
                clone_url: clone_url.clone(),
                checkout_ref: Some(checkout_ref.clone()),
                branch: extract_binding(&repo_env, "ZEUS_BRANCH"),
                tag: extract_binding(&repo_env, "ZEUS_TAG"),
                username: repo.username.clone(),
                repo_env: repo_env.clone(),
            };

            info!(build_id = build.id, workflow = %workflow_name, "running workflow");
            let result = self.scheduler.run(&workflow, &ctx).await;
            overall = Status::aggregate([overall, result]);
        }

        self.build_repo.update_status(build.id, overall).await?;
        reporter.report(&build, overall).await.ok();
        info!(build_id = build.id, status = %overall, "build finished");
        Ok(())
    }
}

fn extract_binding(env: &[(String, String)], key: &str) -> String {
    env.iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}
