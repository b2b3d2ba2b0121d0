use serde::{Deserialize, Serialize};

use crate::error::ScenarioFailure;
use crate::results::{ScenarioResult, StepOutcome, StepResult};
use crate::time::TimeInterval;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    /// Local run timestamp, also the prefix of every artifact of the run.
    pub timestamp: String,
    pub git_sha: Option<String>,
    pub project_root: String,
}

impl RunMeta {
    pub fn new(timestamp: &str, git_sha: Option<String>, project_root: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: timestamp.to_string(),
            git_sha,
            project_root: project_root.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Dotted path, e.g. `GRADLE_BUILD.EXECUTION`.
    pub name: String,
    pub value_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_index: usize,
    pub measured: bool,
    /// Failure reason of a step that was expected to fail.
    pub expected_failure: Option<String>,
    pub metrics: Vec<MetricRecord>,
}

impl From<&StepResult> for StepRecord {
    fn from(result: &StepResult) -> Self {
        Self {
            step_index: result.step_index,
            measured: result.is_measured,
            expected_failure: match &result.outcome {
                StepOutcome::Succeeded => None,
                StepOutcome::FailedAsExpected { reason } => Some(reason.clone()),
            },
            metrics: result
                .metrics
                .flatten()
                .into_iter()
                .map(|(name, value): (String, TimeInterval)| MetricRecord {
                    name,
                    value_ns: value.as_ns(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub scenario: String,
    pub iteration: u32,
    /// Set when the iteration was aborted.
    pub failure: Option<ScenarioFailureRecord>,
    pub steps: Vec<StepRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFailureRecord {
    pub step_index: usize,
    pub reason: String,
}

impl ScenarioRecord {
    pub fn new(scenario: &str, iteration: u32, result: &Result<ScenarioResult, ScenarioFailure>) -> Self {
        match result {
            Ok(r) => Self {
                scenario: scenario.to_string(),
                iteration,
                failure: None,
                steps: r.step_results.iter().map(StepRecord::from).collect(),
            },
            Err(f) => Self {
                scenario: scenario.to_string(),
                iteration,
                failure: Some(ScenarioFailureRecord {
                    step_index: f.step_index,
                    reason: f.reason.clone(),
                }),
                steps: Vec::new(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub run: RunMeta,
    pub scenarios: Vec<ScenarioRecord>,
}
