//! Administrative CLI: direct database operations for operators, bypassing
//! the webhook receiver and build coordinator entirely.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{builds::BuildsCommand, repos::ReposCommand, users::UsersCommand};
use zeusci_config::load_system_config;
use zeusci_db::{create_pool, PgBuildRepo, PgRepoRepo, PgUserRepo};

#[derive(Debug, Parser)]
#[command(name = "zeusci", about = "Administer the Zeus CI pipeline engine")]
struct Cli {
    /// Directory holding `config.yml`, for database connection settings.
    #[arg(long, default_value = "/etc/zeus-ci")]
    config_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Operator accounts and GitHub tokens.
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Registered repositories.
    Repos {
        #[command(subcommand)]
        command: ReposCommand,
    },
    /// The build queue.
    Builds {
        #[command(subcommand)]
        command: BuildsCommand,
    },
    /// Check a pipeline config file for errors without running a build.
    Validate { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();

    // `validate` never touches the database.
    if let Command::Validate { path } = cli.command {
        return commands::validate::run(path).await;
    }

    let config = load_system_config(&[cli.config_dir.as_str()])?;
    let pool = create_pool(&config.database.to_url()).await?;

    match cli.command {
        Command::Users { command } => {
            let repo = PgUserRepo::new(pool);
            commands::users::run(command, &repo).await
        }
        Command::Repos { command } => {
            let repo = PgRepoRepo::new(pool);
            commands::repos::run(command, &repo).await
        }
        Command::Builds { command } => {
            let repo = PgBuildRepo::new(pool);
            commands::builds::run(command, &repo).await
        }
        Command::Validate { .. } => unreachable!("handled above"),
    }
}
