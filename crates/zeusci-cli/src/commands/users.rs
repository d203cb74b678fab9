//! `zeusci users` — operator accounts and their GitHub tokens.

use clap::Subcommand;
use zeusci_core::User;
use zeusci_db::UserRepo;

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// Print a single user's record.
    Get { username: String },
    /// Create a user, or update an existing one's token and limits.
    AddToken {
        username: String,
        token: String,
        #[arg(long, default_value_t = 0)]
        container_limit: i32,
    },
    /// Remove a user.
    Remove { username: String },
}

pub async fn run(cmd: UsersCommand, repo: &dyn UserRepo) -> anyhow::Result<()> {
    match cmd {
        UsersCommand::Get { username } => {
            let user = repo.get_by_username(&username).await?;
            println!("{username}\tlimit={}", user.container_limit);
        }
        UsersCommand::AddToken {
            username,
            token,
            container_limit,
        } => {
            let existing = repo.get_by_username(&username).await.ok();
            let user = User {
                username: username.clone(),
                token,
                container_limit: existing
                    .as_ref()
                    .map(|u| u.container_limit)
                    .unwrap_or(container_limit),
                share_env_with_forks: existing
                    .as_ref()
                    .map(|u| u.share_env_with_forks)
                    .unwrap_or(false),
                share_env_with_branches: existing
                    .map(|u| u.share_env_with_branches)
                    .unwrap_or(true),
            };
            repo.upsert(&user).await?;
            println!("updated token for {username}");
        }
        UsersCommand::Remove { username } => {
            repo.delete(&username).await?;
            println!("removed {username}");
        }
    }
    Ok(())
}
