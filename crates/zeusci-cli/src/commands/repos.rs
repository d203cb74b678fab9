//! `zeusci repos` — registered repositories and their shared environment.

use clap::Subcommand;
use zeusci_core::{Repo, ScmKind};
use zeusci_db::RepoRepo;

#[derive(Debug, Subcommand)]
pub enum ReposCommand {
    /// List every registered repository.
    List,
    /// Register a repository, or change the user it builds as.
    Add {
        name: String,
        #[arg(long, value_enum)]
        scm: ScmArg,
        #[arg(long)]
        username: String,
    },
    /// Remove a repository.
    Remove { name: String },
    /// Add a `KEY=VALUE` environment binding shared by every build of this repo.
    Envvar {
        name: String,
        #[arg(long = "add")]
        bindings: Vec<String>,
        #[arg(long)]
        list: bool,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ScmArg {
    Github,
    Gitlab,
    Bitbucket,
}

impl From<ScmArg> for ScmKind {
    fn from(value: ScmArg) -> Self {
        match value {
            ScmArg::Github => ScmKind::Github,
            ScmArg::Gitlab => ScmKind::Gitlab,
            ScmArg::Bitbucket => ScmKind::Bitbucket,
        }
    }
}

pub async fn run(cmd: ReposCommand, repo_repo: &dyn RepoRepo) -> anyhow::Result<()> {
    match cmd {
        ReposCommand::List => {
            for repo in repo_repo.list_all().await? {
                println!("{}\t{}\t{}", repo.name, repo.scm, repo.username);
            }
        }
        ReposCommand::Add {
            name,
            scm,
            username,
        } => {
            let repo = Repo::new(name.clone(), scm.into(), username);
            repo_repo.upsert(&repo).await?;
            println!("registered {name}");
        }
        ReposCommand::Remove { name } => {
            repo_repo.delete(&name).await?;
            println!("removed {name}");
        }
        ReposCommand::Envvar {
            name,
            bindings,
            list,
        } => {
            let mut repo = repo_repo.get_by_name(&name).await?;
            if !bindings.is_empty() {
                for binding in &bindings {
                    let (key, value) = binding.split_once('=').ok_or_else(|| {
                        anyhow::anyhow!("envvar '{binding}' is not in KEY=VALUE form")
                    })?;
                    repo.add_envvar(key, value);
                }
                repo_repo.upsert(&repo).await?;
            }
            if list {
                for (key, value) in &repo.env_vars {
                    println!("{key}={value}");
                }
            }
        }
    }
    Ok(())
}
