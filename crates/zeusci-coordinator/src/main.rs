//! Zeus CI build coordinator: polls the `builds` table and drives each
//! claimed build's pipeline to completion.

mod cli;
mod coordinator;
mod pipeline_fetch;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zeusci_allocator::InProcessAllocator;
use zeusci_config::load_system_config;
use zeusci_db::{create_pool, BuildRepo, PgBuildRepo, PgRepoRepo, PgUserRepo};
use zeusci_executor::DockerContainerFactory;
use zeusci_scheduler::Scheduler;

use crate::cli::Cli;
use crate::coordinator::Coordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_system_config(&[cli.config_dir.as_str()])?;

    let runner_threads = cli.runner_threads.unwrap_or(4);
    let concurrent_builds = cli
        .concurrent_builds
        .unwrap_or(config.build_coordinator.max_concurrent_builds);
    let poll_interval = Duration::from_secs(
        cli.poll_interval_secs
            .unwrap_or(config.build_coordinator.poll_interval_secs),
    );

    info!("connecting to database");
    let pool = create_pool(&config.database.to_url()).await?;

    let build_repo: Arc<dyn BuildRepo> = Arc::new(PgBuildRepo::new(pool.clone()));
    let repo_repo = Arc::new(PgRepoRepo::new(pool.clone()));
    let user_repo = Arc::new(PgUserRepo::new(pool));

    let docker = bollard::Docker::connect_with_local_defaults()?;
    let allocator = Arc::new(InProcessAllocator::new(user_repo.clone()));
    let factory = Arc::new(DockerContainerFactory::new(docker, allocator));
    let scheduler = Arc::new(Scheduler::new(factory, runner_threads));

    let coordinator = Arc::new(Coordinator {
        build_repo: build_repo.clone(),
        repo_repo,
        user_repo,
        scheduler,
        http: reqwest::Client::new(),
        runner_threads,
        status_target_url: std::env::var("ZEUS_CI_STATUS_URL")
            .unwrap_or_else(|_| "https://zeus-ci.invalid".to_string()),
    });

    info!(
        concurrent_builds,
        runner_threads,
        poll_interval_secs = poll_interval.as_secs(),
        "entering main loop"
    );

    let semaphore = Arc::new(Semaphore::new(concurrent_builds));
    let mut tasks = JoinSet::new();

    loop {
        while tasks.try_join_next().is_some() {}

        let available = semaphore.available_permits() as i64;
        if available > 0 {
            match build_repo.claim_queued(available).await {
                Ok(builds) => {
                    for build in builds {
                        let coordinator = coordinator.clone();
                        let semaphore = semaphore.clone();
                        tasks.spawn(async move {
                            let _permit = semaphore
                                .acquire_owned()
                                .await
                                .expect("coordinator semaphore is never closed");
                            coordinator.run_build(build).await;
                        });
                    }
                }
                Err(e) => warn!(error = %e, "failed to poll build queue"),
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
