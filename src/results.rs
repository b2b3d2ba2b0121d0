use crate::metrics::MetricsContainer;
use crate::time::TimeInterval;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// The step declared an expected build failure and the build did fail.
    FailedAsExpected { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    /// Zero-based position of the step in its scenario.
    pub step_index: usize,
    pub is_measured: bool,
    pub outcome: StepOutcome,
    pub metrics: MetricsContainer<TimeInterval>,
}

/// Results of one completed scenario iteration, in step order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioResult {
    /// One-based iteration counter.
    pub iteration: u32,
    pub step_results: Vec<StepResult>,
}
