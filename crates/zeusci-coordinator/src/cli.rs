//! Command-line flags for the build coordinator, overriding the system
//! config file's `build_coordinator` section.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(about = "Polls the build queue and drives pipeline execution")]
pub struct Cli {
    /// Directories to search (in order) for `config.yml`.
    #[arg(long, default_value = "/etc/zeus-ci")]
    pub config_dir: String,

    /// Container fan-out per workflow run.
    #[arg(long)]
    pub runner_threads: Option<usize>,

    /// Number of builds to run concurrently.
    #[arg(long)]
    pub concurrent_builds: Option<usize>,

    /// Seconds between polls of the build queue.
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
}
