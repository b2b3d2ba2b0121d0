//! The benchmark evaluation engine.
//!
//! Scenarios run strictly one after another because every step builds on the
//! working tree left by the previous one. For each scenario iteration:
//!
//! ```text
//! Cleanup -> Started -> { StepStarted -> ChangeApplied | ChangeFailed
//!                         -> BuildRun -> StepSucceeded | StepFailed }* -> Finished
//! ```
//!
//! A failing step aborts the rest of its iteration only; the run carries on
//! with the next iteration. Validation and listener errors end the run. On
//! every exit path the working tree is restored.

use crate::changes::ChangesApplier;
use crate::error::{BenchError, ScenarioFailure, StepError};
use crate::harness::{BuildLogs, LogTarget};
use crate::invoker::{BuildFailure, BuildInvoker, BuildRequest};
use crate::listener::{CompositeProgressListener, ProgressListener};
use crate::phases::{self, BuildReport};
use crate::results::{ScenarioResult, StepOutcome, StepResult};
use crate::suite::{Scenario, Step, Suite, Task};
use crate::validation;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome counts of a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    /// `(scenario name, iteration, failure)` per aborted iteration.
    pub failed: Vec<(String, u32, ScenarioFailure)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Restores the working tree if the run unwinds before the explicit revert.
struct RevertGuard<'a> {
    changes: &'a mut ChangesApplier,
    armed: bool,
}

impl<'a> RevertGuard<'a> {
    fn new(changes: &'a mut ChangesApplier) -> Self {
        Self {
            changes,
            armed: true,
        }
    }

    fn finish(mut self) -> Result<(), BenchError> {
        self.armed = false;
        self.changes
            .revert_applied_changes()
            .map_err(BenchError::Revert)
    }
}

impl Drop for RevertGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.changes.revert_applied_changes() {
                tracing::error!(error = %e, "could not restore the working tree");
            }
        }
    }
}

pub struct BenchmarkEvaluator<B> {
    project_root: PathBuf,
    invoker: B,
    changes: ChangesApplier,
    progress: CompositeProgressListener,
    build_logs: Option<Box<dyn BuildLogs>>,
}

impl<B: BuildInvoker> BenchmarkEvaluator<B> {
    pub fn new(project_root: impl Into<PathBuf>, invoker: B) -> Self {
        let project_root = project_root.into();
        Self {
            changes: ChangesApplier::new(project_root.clone()),
            project_root,
            invoker,
            progress: CompositeProgressListener::new(),
            build_logs: None,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn ProgressListener>) {
        self.progress.add(listener);
    }

    pub fn set_build_logs(&mut self, logs: Box<dyn BuildLogs>) {
        self.build_logs = Some(logs);
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn invoker(&self) -> &B {
        &self.invoker
    }

    /// Validate `suite`, run every scenario iteration, and restore the working tree.
    pub fn run_benchmarks(&mut self, suite: &Suite) -> Result<RunSummary, BenchError> {
        validation::check_benchmarks(&self.project_root, suite)?;

        let mut session = Session {
            invoker: &mut self.invoker,
            progress: &mut self.progress,
            build_logs: &mut self.build_logs,
        };
        let mut guard = RevertGuard::new(&mut self.changes);
        let mut summary = RunSummary::default();
        let outcome = run_scenarios(&mut session, &mut *guard.changes, suite, &mut summary);
        let reverted = guard.finish();
        let finished = session.progress.all_finished().map_err(BenchError::from);

        outcome?;
        reverted?;
        finished?;
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            "all scenarios finished"
        );
        Ok(summary)
    }
}

/// Borrowed collaborators of one run.
struct Session<'a, B> {
    invoker: &'a mut B,
    progress: &'a mut CompositeProgressListener,
    build_logs: &'a mut Option<Box<dyn BuildLogs>>,
}

impl<B: BuildInvoker> Session<'_, B> {
    fn open_log(&mut self, target: &LogTarget<'_>) -> Option<Box<dyn Write>> {
        let logs = self.build_logs.as_mut()?;
        match logs.open(target) {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::warn!(error = %e, log = ?target, "could not open build log");
                None
            }
        }
    }

    fn build(
        &mut self,
        request: &BuildRequest<'_>,
        log: &LogTarget<'_>,
    ) -> Result<Result<BuildReport, BuildFailure>, BenchError> {
        self.progress.task_execution_started(request.tasks)?;
        let mut sink = self.open_log(log);
        let output = sink.as_mut().map(|s| s.as_mut() as &mut dyn Write);
        let result = self.invoker.run(request, output);
        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.flush() {
                tracing::warn!(error = %e, "could not flush build log");
            }
        }
        Ok(result)
    }
}

fn run_scenarios<B: BuildInvoker>(
    session: &mut Session<'_, B>,
    changes: &mut ChangesApplier,
    suite: &Suite,
    summary: &mut RunSummary,
) -> Result<(), BenchError> {
    let mut previous: Option<(&Scenario, u32)> = None;

    for scenario in &suite.scenarios {
        for iteration in 1..=u32::from(scenario.repeat.get()) {
            if let Some((prev, prev_iteration)) = previous {
                cleanup(session, changes, suite, prev, prev_iteration)?;
            }
            previous = Some((scenario, iteration));

            let result = run_iteration(session, changes, suite, scenario, iteration)?;
            match &result {
                Ok(_) => summary.succeeded += 1,
                Err(failure) => {
                    summary
                        .failed
                        .push((scenario.name.clone(), iteration, failure.clone()));
                }
            }
            session.progress.scenario_finished(scenario, iteration, &result)?;
        }
    }
    Ok(())
}

/// Task set of the settle build: every task `scenario` runs, in declaration
/// order, without `CLEAN` (cleaning would discard the incremental state the
/// next measurement starts from).
fn cleanup_tasks(suite: &Suite, scenario: &Scenario) -> Vec<Task> {
    let mut tasks = Vec::new();
    for step in &scenario.steps {
        for task in suite.resolve_tasks(scenario, step) {
            if *task != Task::Clean && !tasks.contains(task) {
                tasks.push(*task);
            }
        }
    }
    tasks
}

fn cleanup<B: BuildInvoker>(
    session: &mut Session<'_, B>,
    changes: &mut ChangesApplier,
    suite: &Suite,
    previous: &Scenario,
    previous_iteration: u32,
) -> Result<(), BenchError> {
    if !changes.has_applied_changes() {
        return Ok(());
    }

    session.progress.cleanup_started()?;
    changes.revert_applied_changes().map_err(BenchError::Revert)?;

    let tasks = cleanup_tasks(suite, previous);
    if tasks.is_empty() {
        tracing::debug!(scenario = %previous.name, "no tasks to settle after revert");
    } else {
        let request = BuildRequest {
            tasks: &tasks,
            jdk: suite.resolve_jdk(previous),
            arguments: suite.resolve_arguments(previous),
            expect_failure: false,
        };
        let log = LogTarget::Cleanup {
            scenario: &previous.name,
            iteration: previous_iteration,
        };
        if let Err(failure) = session.build(&request, &log)? {
            tracing::warn!(
                scenario = %previous.name,
                reason = %failure,
                "cleanup build failed"
            );
        }
    }
    session.progress.cleanup_finished()?;
    Ok(())
}

/// Runs one iteration. The outer error is run-fatal, the inner one is the
/// iteration's own outcome.
fn run_iteration<B: BuildInvoker>(
    session: &mut Session<'_, B>,
    changes: &mut ChangesApplier,
    suite: &Suite,
    scenario: &Scenario,
    iteration: u32,
) -> Result<Result<ScenarioResult, ScenarioFailure>, BenchError> {
    session.progress.scenario_started(scenario, iteration)?;

    let mut step_results = Vec::with_capacity(scenario.steps.len());
    for (step_index, step) in scenario.steps.iter().enumerate() {
        session.progress.step_started(scenario, step_index, step)?;

        let result = run_step(session, changes, suite, scenario, iteration, step_index, step)?;
        session
            .progress
            .step_finished(scenario, step_index, step, &result)?;

        match result {
            Ok(step_result) => step_results.push(step_result),
            Err(e) => {
                tracing::error!(
                    scenario = %scenario.name,
                    iteration,
                    step = step_index + 1,
                    error = %e,
                    "aborting scenario"
                );
                return Ok(Err(ScenarioFailure {
                    step_index,
                    reason: e.to_string(),
                }));
            }
        }
    }

    Ok(Ok(ScenarioResult {
        iteration,
        step_results,
    }))
}

fn run_step<B: BuildInvoker>(
    session: &mut Session<'_, B>,
    changes: &mut ChangesApplier,
    suite: &Suite,
    scenario: &Scenario,
    iteration: u32,
    step_index: usize,
    step: &Step,
) -> Result<Result<StepResult, StepError>, BenchError> {
    if let Err(e) = changes.apply_step_changes(step) {
        return Ok(Err(StepError::Changes(e)));
    }

    let request = BuildRequest {
        tasks: suite.resolve_tasks(scenario, step),
        jdk: suite.resolve_jdk(scenario),
        arguments: suite.resolve_arguments(scenario),
        expect_failure: step.is_expected_to_fail(),
    };
    let log = LogTarget::Step {
        scenario: &scenario.name,
        iteration,
        step: step_index + 1,
    };

    let (report, outcome) = match session.build(&request, &log)? {
        Ok(report) => {
            if step.is_expected_to_fail() {
                tracing::warn!(
                    scenario = %scenario.name,
                    step = step_index + 1,
                    "build was expected to fail but succeeded"
                );
            }
            (report, StepOutcome::Succeeded)
        }
        Err(failure) if step.is_expected_to_fail() => {
            let BuildFailure { reason, report } = failure;
            (
                report.unwrap_or_default(),
                StepOutcome::FailedAsExpected { reason },
            )
        }
        Err(failure) => return Ok(Err(StepError::Build(failure))),
    };

    let metrics = match phases::build_metrics(&report) {
        Ok(metrics) => metrics,
        Err(e) => {
            return Ok(Err(StepError::Build(BuildFailure::new(format!(
                "invalid build metrics: {e}"
            )))))
        }
    };

    Ok(Ok(StepResult {
        step_index,
        is_measured: step.is_measured(),
        outcome,
        metrics,
    }))
}
