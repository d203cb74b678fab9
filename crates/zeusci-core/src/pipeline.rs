//! Pipeline specification types: the in-memory shape of `.zeusci/config.yml`
//! once parsed. Loaded fresh per build and never persisted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One unit of work inside a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StepSpec {
    Checkout,
    Run {
        name: Option<String>,
        command: String,
    },
    PersistToWorkspace {
        root: String,
        paths: String,
    },
    AttachWorkspace {
        at: String,
    },
}

/// A named container job a workflow stage can refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub image: String,
    pub working_directory: Option<String>,
    pub steps: Vec<StepSpec>,
}

/// `run_when` guard on a stage: the build's branch/tag must match the given
/// regex for the stage to run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunCondition {
    pub branch: Option<String>,
    pub tag: Option<String>,
}

/// One entry in a workflow's stage list, normalized from either the bare
/// `- job-name` form or the `- job-name: {requires, run_when}` map form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageEntry {
    pub name: String,
    #[serde(default)]
    pub requires: Vec<String>,
    pub run_when: Option<RunCondition>,
}

/// An ordered list of stages, keyed by workflow name in [`PipelineSpec`].
pub type WorkflowSpec = Vec<StageEntry>;

/// The full parsed contents of a pipeline file: jobs and workflows. The
/// reserved `version` key has already been stripped from `workflows` by the
/// time this type is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineSpec {
    pub jobs: HashMap<String, JobSpec>,
    pub workflows: HashMap<String, WorkflowSpec>,
}

impl PipelineSpec {
    /// Validate that every stage's job exists and that `requires` forms a
    /// DAG (no self-loops, no cycles, no references to unknown stages).
    pub fn validate(&self) -> Result<(), String> {
        for (workflow_name, stages) in &self.workflows {
            let names: std::collections::HashSet<&str> =
                stages.iter().map(|s| s.name.as_str()).collect();
            if names.len() != stages.len() {
                return Err(format!(
                    "workflow '{workflow_name}' has duplicate stage names"
                ));
            }
            for stage in stages {
                if !self.jobs.contains_key(&stage.name) {
                    return Err(format!(
                        "workflow '{workflow_name}' references unknown job '{}'",
                        stage.name
                    ));
                }
                for req in &stage.requires {
                    if req == &stage.name {
                        return Err(format!(
                            "stage '{}' in workflow '{workflow_name}' requires itself",
                            stage.name
                        ));
                    }
                    if !names.contains(req.as_str()) {
                        return Err(format!(
                            "stage '{}' in workflow '{workflow_name}' requires unknown stage '{req}'",
                            stage.name
                        ));
                    }
                }
            }
            detect_cycle(stages).map_err(|cycle| {
                format!("workflow '{workflow_name}' has a cycle through stage '{cycle}'")
            })?;
        }
        Ok(())
    }
}

fn detect_cycle(stages: &[StageEntry]) -> Result<(), String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let by_name: HashMap<&str, &StageEntry> =
        stages.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut marks: HashMap<&str, Mark> =
        stages.iter().map(|s| (s.name.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&'a str, &'a StageEntry>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), String> {
        match marks.get(name).copied().unwrap_or(Mark::Done) {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(name.to_string()),
            Mark::Unvisited => {}
        }
        marks.insert(name, Mark::Visiting);
        if let Some(stage) = by_name.get(name) {
            for req in &stage.requires {
                visit(req, by_name, marks)?;
            }
        }
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for stage in stages {
        visit(&stage.name, &by_name, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobSpec {
        JobSpec {
            image: "alpine".into(),
            working_directory: None,
            steps: vec![StepSpec::Checkout],
        }
    }

    fn entry(name: &str, requires: &[&str]) -> StageEntry {
        StageEntry {
            name: name.to_string(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            run_when: None,
        }
    }

    #[test]
    fn validates_clean_dag() {
        let mut jobs = HashMap::new();
        jobs.insert("build".to_string(), job());
        jobs.insert("test".to_string(), job());
        let mut workflows = HashMap::new();
        workflows.insert("main".to_string(), vec![entry("build", &[]), entry("test", &["build"])]);
        let spec = PipelineSpec { jobs, workflows };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn rejects_self_loop() {
        let mut jobs = HashMap::new();
        jobs.insert("build".to_string(), job());
        let mut workflows = HashMap::new();
        workflows.insert("main".to_string(), vec![entry("build", &["build"])]);
        let spec = PipelineSpec { jobs, workflows };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_cycle() {
        let mut jobs = HashMap::new();
        jobs.insert("a".to_string(), job());
        jobs.insert("b".to_string(), job());
        let mut workflows = HashMap::new();
        workflows.insert("main".to_string(), vec![entry("a", &["b"]), entry("b", &["a"])]);
        let spec = PipelineSpec { jobs, workflows };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_unknown_job_reference() {
        let mut jobs = HashMap::new();
        jobs.insert("build".to_string(), job());
        let mut workflows = HashMap::new();
        workflows.insert("main".to_string(), vec![entry("ghost", &[])]);
        let spec = PipelineSpec { jobs, workflows };
        assert!(spec.validate().is_err());
    }
}
