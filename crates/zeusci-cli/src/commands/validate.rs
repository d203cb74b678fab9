//! `zeusci validate` — check a `.zeusci/config.yml` file without a build.

use std::path::PathBuf;

pub async fn run(path: PathBuf) -> anyhow::Result<()> {
    let yaml = tokio::fs::read_to_string(&path).await?;
    let spec = zeusci_config::parse_pipeline(&yaml)?;
    spec.validate().map_err(zeusci_config::ConfigError::InvalidPipeline)?;
    println!(
        "{}: {} job(s), {} workflow(s)",
        path.display(),
        spec.jobs.len(),
        spec.workflows.len()
    );
    Ok(())
}
