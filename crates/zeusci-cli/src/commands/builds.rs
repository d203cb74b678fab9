//! `zeusci builds` — the build queue.

use clap::Subcommand;
use zeusci_core::Status;
use zeusci_db::BuildRepo;

#[derive(Debug, Subcommand)]
pub enum BuildsCommand {
    /// List a repository's most recent builds.
    List {
        repo: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a single build's full record.
    Get { id: i64 },
    /// Requeue a build by resetting it to `created`.
    Retry { id: i64 },
}

pub async fn run(cmd: BuildsCommand, repo: &dyn BuildRepo) -> anyhow::Result<()> {
    match cmd {
        BuildsCommand::List { repo: name, limit } => {
            for build in repo.list_recent(&name, limit).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    build.id, build.status, build.r#ref, build.commit
                );
            }
        }
        BuildsCommand::Get { id } => {
            let build = repo.get_by_id(id).await?;
            println!(
                "id={} repo={} ref={} commit={} status={} payload={}",
                build.id, build.repo_name, build.r#ref, build.commit, build.status, build.payload
            );
        }
        BuildsCommand::Retry { id } => {
            repo.update_status(id, Status::Created).await?;
            println!("requeued build {id}");
        }
    }
    Ok(())
}
