use crate::error::{ListenerError, ScenarioFailure, StepError};
use crate::listener::ProgressListener;
use crate::results::{ScenarioResult, StepOutcome, StepResult};
use crate::suite::{Scenario, Step, Task};
use crate::time::TimeInterval;
use std::time::Instant;

/// Logs progress and step timings through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingReporter {
    scenario_start: Option<Instant>,
}

impl LoggingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressListener for LoggingReporter {
    fn scenario_started(&mut self, scenario: &Scenario, iteration: u32) -> Result<(), ListenerError> {
        self.scenario_start = Some(Instant::now());
        tracing::info!(scenario = %scenario.name, iteration, "scenario started");
        Ok(())
    }

    fn scenario_finished(
        &mut self,
        scenario: &Scenario,
        iteration: u32,
        result: &Result<ScenarioResult, ScenarioFailure>,
    ) -> Result<(), ListenerError> {
        let elapsed = self
            .scenario_start
            .take()
            .map(|start| TimeInterval::from(start.elapsed()))
            .unwrap_or_default();
        match result {
            Ok(r) => tracing::info!(
                scenario = %scenario.name,
                iteration,
                steps = r.step_results.len(),
                %elapsed,
                "scenario finished"
            ),
            Err(failure) => tracing::error!(
                scenario = %scenario.name,
                iteration,
                %failure,
                "scenario failed"
            ),
        }
        Ok(())
    }

    fn step_started(&mut self, scenario: &Scenario, step_index: usize, _step: &Step) -> Result<(), ListenerError> {
        tracing::info!(scenario = %scenario.name, step = step_index + 1, "step started");
        Ok(())
    }

    fn step_finished(
        &mut self,
        scenario: &Scenario,
        step_index: usize,
        _step: &Step,
        result: &Result<StepResult, StepError>,
    ) -> Result<(), ListenerError> {
        let step = step_index + 1;
        match result {
            Ok(r) => {
                if let StepOutcome::FailedAsExpected { reason } = &r.outcome {
                    tracing::info!(scenario = %scenario.name, step, %reason, "step failed as expected");
                }
                if r.is_measured {
                    for (metric, time) in r.metrics.flatten() {
                        tracing::info!(scenario = %scenario.name, step, %metric, %time);
                    }
                }
            }
            Err(e) => tracing::error!(scenario = %scenario.name, step, error = %e, "step failed"),
        }
        Ok(())
    }

    fn task_execution_started(&mut self, tasks: &[Task]) -> Result<(), ListenerError> {
        let paths: Vec<String> = tasks.iter().map(Task::path).collect();
        tracing::debug!(tasks = ?paths, "running build");
        Ok(())
    }

    fn cleanup_started(&mut self) -> Result<(), ListenerError> {
        tracing::info!("cleanup after last scenario started");
        Ok(())
    }

    fn cleanup_finished(&mut self) -> Result<(), ListenerError> {
        tracing::info!("cleanup after last scenario finished");
        Ok(())
    }
}
