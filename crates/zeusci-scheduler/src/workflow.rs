//! A [`Workflow`]: one named run of a stage DAG, owning its workspace
//! directory for the lifetime of the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use zeusci_core::pipeline::{JobSpec, StageEntry};
use zeusci_core::{Error, ResourceId, Result, Status};

use crate::stage::Stage;

/// Everything a stage needs about the build it belongs to, beyond its own
/// job definition.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub exec_id: String,
    pub clone_url: String,
    pub checkout_ref: Option<String>,
    pub branch: String,
    pub tag: String,
    pub username: String,
    pub repo_env: Vec<(String, String)>,
}

/// One instantiation of a named workflow from a pipeline spec.
pub struct Workflow {
    pub exec_id: String,
    pub build_id: i64,
    pub name: String,
    pub stages: HashMap<String, Arc<Mutex<Stage>>>,
    pub concurrency: usize,
    pub workspace_dir: PathBuf,
}

impl Workflow {
    /// Build the stage set from a workflow's stage entries and the pipeline's
    /// job map, creating the workspace directory. `entries` is assumed
    /// already validated (`PipelineSpec::validate`) for cycles and
    /// self-loops; job references are rechecked here defensively.
    pub fn new(
        build_id: i64,
        name: &str,
        entries: &[StageEntry],
        jobs: &HashMap<String, JobSpec>,
        workspace_root: &Path,
        concurrency: usize,
    ) -> Result<Self> {
        let exec_id = ResourceId::new().to_hex();
        let workspace_dir = workspace_root.join(&exec_id);
        std::fs::create_dir_all(&workspace_dir)
            .map_err(|e| Error::Internal(format!("failed to create workspace dir: {e}")))?;

        let mut stages = HashMap::with_capacity(entries.len());
        for entry in entries {
            let job = jobs.get(&entry.name).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "workflow '{name}' references unknown job '{}'",
                    entry.name
                ))
            })?;
            let stage = Stage::new(
                entry.name.clone(),
                entry.requires.clone(),
                entry.run_when.clone(),
                job,
            );
            stages.insert(entry.name.clone(), Arc::new(Mutex::new(stage)));
        }

        Ok(Self {
            exec_id,
            build_id,
            name: name.to_string(),
            stages,
            concurrency,
            workspace_dir,
        })
    }

    /// Aggregate every stage's terminal state (`error` beats `failed` beats
    /// `passed`; `skipped` never fails the workflow).
    pub async fn result(&self) -> Status {
        let mut states = Vec::with_capacity(self.stages.len());
        for stage in self.stages.values() {
            states.push(stage.lock().await.state);
        }
        Status::aggregate(states)
    }
}

impl Drop for Workflow {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.workspace_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeusci_core::pipeline::{JobSpec, StepSpec};

    fn jobs() -> HashMap<String, JobSpec> {
        let mut jobs = HashMap::new();
        jobs.insert(
            "build".to_string(),
            JobSpec {
                image: "alpine:3".to_string(),
                working_directory: None,
                steps: vec![StepSpec::Checkout],
            },
        );
        jobs
    }

    #[test]
    fn rejects_unknown_job_reference() {
        let entries = vec![StageEntry {
            name: "ghost".to_string(),
            requires: vec![],
            run_when: None,
        }];
        let tmp = std::env::temp_dir().join("zeusci-workflow-test-unknown-job");
        let result = Workflow::new(1, "main", &entries, &jobs(), &tmp, 4);
        assert!(result.is_err());
    }

    #[test]
    fn creates_and_tears_down_workspace_directory() {
        let entries = vec![StageEntry {
            name: "build".to_string(),
            requires: vec![],
            run_when: None,
        }];
        let tmp = std::env::temp_dir().join("zeusci-workflow-test-teardown");
        let workspace_dir;
        {
            let workflow = Workflow::new(1, "main", &entries, &jobs(), &tmp, 4).unwrap();
            workspace_dir = workflow.workspace_dir.clone();
            assert!(workspace_dir.exists());
        }
        assert!(!workspace_dir.exists());
    }
}
