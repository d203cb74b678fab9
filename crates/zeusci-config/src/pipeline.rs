//! Parses `.zeusci/config.yml` into a [`PipelineSpec`].
//!
//! The `workflows` mapping carries a reserved `version` key whose value is
//! not itself a stage list, so it is deserialized loosely as YAML and
//! filtered before the remaining entries are turned into typed stage lists.

use std::collections::HashMap;

use serde::Deserialize;
use zeusci_core::pipeline::{JobSpec, PipelineSpec, RunCondition, StageEntry, StepSpec};

use crate::{ConfigError, ConfigResult};

#[derive(Debug, Deserialize)]
struct RawPipeline {
    #[serde(default)]
    jobs: HashMap<String, RawJob>,
    #[serde(default)]
    workflows: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    docker: Vec<RawDockerImage>,
    working_directory: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawDockerImage {
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStep {
    Bare(String),
    Run { run: RawRun },
    Persist { persist_to_workspace: RawPersist },
    Attach { attach_workspace: RawAttach },
}

#[derive(Debug, Deserialize)]
struct RawRun {
    name: Option<String>,
    command: String,
}

#[derive(Debug, Deserialize)]
struct RawPersist {
    root: String,
    paths: String,
}

#[derive(Debug, Deserialize)]
struct RawAttach {
    at: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStageEntry {
    Bare(String),
    WithOptions(HashMap<String, RawStageOptions>),
}

#[derive(Debug, Deserialize, Default)]
struct RawStageOptions {
    #[serde(default)]
    requires: Vec<String>,
    run_when: Option<RawRunWhen>,
}

#[derive(Debug, Deserialize)]
struct RawRunWhen {
    branch: Option<String>,
    tag: Option<String>,
}

/// Reserved key inside the `workflows` mapping; never treated as a workflow.
const RESERVED_WORKFLOW_KEY: &str = "version";

/// Parse a pipeline configuration from YAML text.
pub fn parse_pipeline(yaml: &str) -> ConfigResult<PipelineSpec> {
    let raw: RawPipeline = serde_yaml::from_str(yaml)?;

    let jobs = raw
        .jobs
        .into_iter()
        .map(|(name, job)| normalize_job(job).map(|spec| (name, spec)))
        .collect::<ConfigResult<HashMap<_, _>>>()?;

    let mut workflows = HashMap::new();
    for (key, value) in raw.workflows {
        let name = match key.as_str() {
            Some(s) => s.to_string(),
            None => continue,
        };
        if name == RESERVED_WORKFLOW_KEY {
            continue;
        }
        let entries: Vec<RawStageEntry> = serde_yaml::from_value(value)?;
        let stages = entries.into_iter().map(normalize_stage_entry).collect::<ConfigResult<Vec<_>>>()?;
        workflows.insert(name, stages);
    }

    let spec = PipelineSpec { jobs, workflows };
    spec.validate().map_err(ConfigError::InvalidPipeline)?;
    Ok(spec)
}

fn normalize_job(job: RawJob) -> ConfigResult<JobSpec> {
    let image = job
        .docker
        .first()
        .map(|d| d.image.clone())
        .ok_or_else(|| ConfigError::InvalidPipeline("job has no docker image".to_string()))?;
    let steps = job.steps.into_iter().map(normalize_step).collect();
    Ok(JobSpec {
        image,
        working_directory: job.working_directory,
        steps,
    })
}

fn normalize_step(step: RawStep) -> StepSpec {
    match step {
        RawStep::Bare(s) if s == "checkout" => StepSpec::Checkout,
        RawStep::Bare(other) => StepSpec::Run {
            name: None,
            command: other,
        },
        RawStep::Run { run } => StepSpec::Run {
            name: run.name,
            command: run.command,
        },
        RawStep::Persist { persist_to_workspace } => StepSpec::PersistToWorkspace {
            root: persist_to_workspace.root,
            paths: persist_to_workspace.paths,
        },
        RawStep::Attach { attach_workspace } => StepSpec::AttachWorkspace {
            at: attach_workspace.at,
        },
    }
}

fn normalize_stage_entry(entry: RawStageEntry) -> ConfigResult<StageEntry> {
    match entry {
        RawStageEntry::Bare(name) => Ok(StageEntry {
            name,
            requires: Vec::new(),
            run_when: None,
        }),
        RawStageEntry::WithOptions(map) => {
            let mut iter = map.into_iter();
            let (name, opts) = iter
                .next()
                .ok_or_else(|| ConfigError::InvalidPipeline("empty stage entry".to_string()))?;
            if iter.next().is_some() {
                return Err(ConfigError::InvalidPipeline(format!(
                    "stage entry '{name}' has more than one key"
                )));
            }
            Ok(StageEntry {
                name,
                requires: opts.requires,
                run_when: opts.run_when.map(|w| RunCondition {
                    branch: w.branch,
                    tag: w.tag,
                }),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
jobs:
  build:
    docker: [{image: "node:18"}]
    working_directory: "~/app"
    steps:
      - checkout
      - run: {name: "install", command: "npm install"}
      - persist_to_workspace: {root: ".", paths: "dist/*"}
  test:
    docker: [{image: "node:18"}]
    steps:
      - checkout
      - attach_workspace: {at: "/app/dist"}
      - run: {command: "npm test"}
workflows:
  version: 2
  main:
    - build
    - test:
        requires: [build]
        run_when:
          branch: "^main$"
"#;

    #[test]
    fn parses_full_sample() {
        let spec = parse_pipeline(SAMPLE).unwrap();
        assert_eq!(spec.jobs.len(), 2);
        assert!(!spec.workflows.contains_key("version"));
        let stages = &spec.workflows["main"];
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].requires, vec!["build".to_string()]);
        assert_eq!(
            stages[1].run_when.as_ref().unwrap().branch.as_deref(),
            Some("^main$")
        );
    }

    #[test]
    fn bare_checkout_step_normalizes() {
        let spec = parse_pipeline(SAMPLE).unwrap();
        assert_eq!(spec.jobs["build"].steps[0], StepSpec::Checkout);
    }

    #[test]
    fn rejects_dag_violations_via_validate() {
        let yaml = r#"
jobs:
  build:
    docker: [{image: "node:18"}]
    steps: [checkout]
workflows:
  main:
    - build:
        requires: [ghost]
"#;
        assert!(parse_pipeline(yaml).is_err());
    }
}
