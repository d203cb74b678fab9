//! Fetches a repo's `.zeusci/config.yml` straight from the SCM at build
//! time rather than trusting a copy stored alongside the build row.

use zeusci_core::pipeline::PipelineSpec;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("pipeline not found at {0}")]
    NotFound(String),

    #[error("invalid pipeline config: {0}")]
    Invalid(#[from] zeusci_config::ConfigError),
}

/// `https://raw.githubusercontent.com/<repo_name>/<checkout_ref>/.zeusci/config.yml`
pub async fn fetch_pipeline(
    client: &reqwest::Client,
    repo_name: &str,
    checkout_ref: &str,
) -> Result<PipelineSpec, FetchError> {
    let url = format!("https://raw.githubusercontent.com/{repo_name}/{checkout_ref}/.zeusci/config.yml");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(url));
    }
    if !response.status().is_success() {
        return Err(FetchError::Request(format!(
            "unexpected status {} fetching {url}",
            response.status()
        )));
    }

    let yaml = response
        .text()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))?;
    let spec = zeusci_config::parse_pipeline(&yaml)?;
    spec.validate()
        .map_err(zeusci_config::ConfigError::InvalidPipeline)?;
    Ok(spec)
}
