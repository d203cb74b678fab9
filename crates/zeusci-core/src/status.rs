//! The lifecycle shared by stages, workflows, and builds.
//!
//! Builds, workflows, and stages all move through the same vocabulary of
//! states and aggregate the same way, so a single enum backs all three
//! instead of three near-identical ones.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    Starting,
    Running,
    Passed,
    Failed,
    Skipped,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Passed | Status::Failed | Status::Skipped | Status::Error
        )
    }

    /// True for the states a dependent stage treats as "this will never pass".
    pub fn is_dead(self) -> bool {
        matches!(self, Status::Failed | Status::Skipped | Status::Error)
    }

    /// Monoidal aggregation over a set of terminal statuses: error beats
    /// failed beats passed; skipped never fails an aggregate. An empty
    /// iterator aggregates to `Passed`.
    pub fn aggregate(statuses: impl IntoIterator<Item = Status>) -> Status {
        let mut worst = Status::Passed;
        for s in statuses {
            worst = match (worst, s) {
                (Status::Error, _) | (_, Status::Error) => Status::Error,
                (Status::Failed, _) | (_, Status::Failed) => Status::Failed,
                _ => worst,
            };
        }
        worst
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Status::Created),
            "starting" => Ok(Status::Starting),
            "running" => Ok(Status::Running),
            "passed" => Ok(Status::Passed),
            "failed" => Ok(Status::Failed),
            "skipped" => Ok(Status::Skipped),
            "error" => Ok(Status::Error),
            other => Err(format!("unrecognized status '{other}'")),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Created => "created",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_prefers_error_over_failed_over_passed() {
        assert_eq!(
            Status::aggregate([Status::Passed, Status::Skipped]),
            Status::Passed
        );
        assert_eq!(
            Status::aggregate([Status::Passed, Status::Failed]),
            Status::Failed
        );
        assert_eq!(
            Status::aggregate([Status::Failed, Status::Error]),
            Status::Error
        );
        assert_eq!(Status::aggregate([]), Status::Passed);
    }

    #[test]
    fn dead_states_propagate_skip() {
        assert!(Status::Failed.is_dead());
        assert!(Status::Skipped.is_dead());
        assert!(Status::Error.is_dead());
        assert!(!Status::Passed.is_dead());
    }
}
