//! Reserved build-phase metric names and the merge of a [`BuildReport`] into a
//! step's metrics tree.
//!
//! Phase timings reported by the build tool form the fixed skeleton
//! (`GRADLE_BUILD` > `CONFIGURATION` / `EXECUTION` > ...). Per-task metrics,
//! when the build produced them, are aggregated per task type and hung below
//! `COMPILATION_TASKS` or `NON_COMPILATION_TASKS`.

use crate::metrics::{Metric, MetricsContainer, MetricsError};
use crate::time::TimeInterval;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Task types whose time counts as compilation.
pub const COMPILE_TASK_TYPES: [&str; 4] = [
    "JavaCompile",
    "KotlinCompile",
    "KotlinCompileCommon",
    "Kotlin2JsCompile",
];

/// Task whose wall time is reported as `KOTLIN_COMPILE_BUILD_SRC`.
pub const BUILD_SRC_COMPILE_TASK: &str = ":buildSrc:compileKotlin";

pub const JAVA_INSTRUMENTATION_METRIC: &str = "Not null instrumentation";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    GradleBuild,
    Configuration,
    Execution,
    CompilationTasks,
    NonCompilationTasks,
    KotlinCompileBuildSrc,
    FirstTestExecutionWaiting,
    UpToDateChecks,
    UpToDateChecksBeforeTask,
    UpToDateChecksAfterTask,
}

impl BuildPhase {
    pub fn name(&self) -> &'static str {
        match self {
            BuildPhase::GradleBuild => "GRADLE_BUILD",
            BuildPhase::Configuration => "CONFIGURATION",
            BuildPhase::Execution => "EXECUTION",
            BuildPhase::CompilationTasks => "COMPILATION_TASKS",
            BuildPhase::NonCompilationTasks => "NON_COMPILATION_TASKS",
            BuildPhase::KotlinCompileBuildSrc => "KOTLIN_COMPILE_BUILD_SRC",
            BuildPhase::FirstTestExecutionWaiting => "FIRST_TEST_EXECUTION_WAITING",
            BuildPhase::UpToDateChecks => "UP_TO_DATE_CHECKS",
            BuildPhase::UpToDateChecksBeforeTask => "UP_TO_DATE_CHECKS_BEFORE_TASK",
            BuildPhase::UpToDateChecksAfterTask => "UP_TO_DATE_CHECKS_AFTER_TASK",
        }
    }

    pub fn parent(&self) -> Option<BuildPhase> {
        match self {
            BuildPhase::GradleBuild => None,
            BuildPhase::Configuration | BuildPhase::Execution => Some(BuildPhase::GradleBuild),
            BuildPhase::CompilationTasks
            | BuildPhase::NonCompilationTasks
            | BuildPhase::FirstTestExecutionWaiting
            | BuildPhase::UpToDateChecks => Some(BuildPhase::Execution),
            BuildPhase::KotlinCompileBuildSrc => Some(BuildPhase::CompilationTasks),
            BuildPhase::UpToDateChecksBeforeTask | BuildPhase::UpToDateChecksAfterTask => {
                Some(BuildPhase::UpToDateChecks)
            }
        }
    }

    /// Dotted path from the root, e.g. `GRADLE_BUILD.EXECUTION.UP_TO_DATE_CHECKS`.
    pub fn path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}.{}", parent.path(), self.name()),
            None => self.name().to_string(),
        }
    }
}

pub fn set_phase(
    metrics: &mut MetricsContainer<TimeInterval>,
    phase: BuildPhase,
    time: TimeInterval,
) -> Result<(), MetricsError> {
    metrics.set_value(phase.name(), time, phase.parent().map(|p| p.name()))
}

/// Metrics reported by the build tool for a single task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskData {
    pub path: String,
    pub type_fq_name: String,
    pub did_work: bool,
    /// Metric name -> nanoseconds.
    #[serde(default)]
    pub time_metrics: BTreeMap<String, i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetricsData {
    /// Metric name -> parent metric name. Metrics absent here are roots.
    #[serde(default)]
    pub parent_metric: BTreeMap<String, String>,
    #[serde(default)]
    pub tasks: Vec<TaskData>,
}

/// Raw timings of one build, as produced by a build invoker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildReport {
    pub build_time: TimeInterval,
    pub configuration_time: TimeInterval,
    pub execution_time: TimeInterval,
    pub up_to_date_checks_before_task: TimeInterval,
    pub up_to_date_checks_after_task: TimeInterval,
    pub first_test_execution_waiting: Option<TimeInterval>,
    pub java_instrumentation_time: TimeInterval,
    /// Task path -> wall time, collected outside the build tool's own metrics.
    pub task_times: BTreeMap<String, TimeInterval>,
    pub task_metrics: Option<TaskMetricsData>,
}

impl BuildReport {
    /// Report carrying only a measured wall time.
    pub fn wall_time_only(elapsed: TimeInterval) -> Self {
        Self {
            build_time: elapsed,
            execution_time: elapsed,
            ..Self::default()
        }
    }
}

/// `org.gradle.api.tasks.compile.JavaCompile_Decorated` -> `JavaCompile`
pub fn short_task_type_name(fq_name: &str) -> &str {
    let short = fq_name.rsplit('.').next().unwrap_or(fq_name);
    short.strip_suffix("_Decorated").unwrap_or(short)
}

/// Build the metrics tree of one step from a build report.
pub fn build_metrics(report: &BuildReport) -> Result<MetricsContainer<TimeInterval>, MetricsError> {
    let mut metrics = MetricsContainer::new();
    set_phase(&mut metrics, BuildPhase::GradleBuild, report.build_time)?;
    set_phase(&mut metrics, BuildPhase::Configuration, report.configuration_time)?;
    set_phase(&mut metrics, BuildPhase::Execution, report.execution_time)?;
    set_phase(
        &mut metrics,
        BuildPhase::UpToDateChecks,
        report.up_to_date_checks_before_task + report.up_to_date_checks_after_task,
    )?;
    set_phase(
        &mut metrics,
        BuildPhase::UpToDateChecksBeforeTask,
        report.up_to_date_checks_before_task,
    )?;
    set_phase(
        &mut metrics,
        BuildPhase::UpToDateChecksAfterTask,
        report.up_to_date_checks_after_task,
    )?;
    if let Some(waiting) = report.first_test_execution_waiting {
        set_phase(&mut metrics, BuildPhase::FirstTestExecutionWaiting, waiting)?;
    }

    if let Some(data) = &report.task_metrics {
        add_task_execution_data(&mut metrics, data, report)?;
    }
    Ok(metrics)
}

/// Root metrics of a task (those without a parent) are reported under the
/// task type's name, so several roots add up to one value.
fn replace_root_name<'a>(data: &TaskMetricsData, name: &'a str, type_name: &'a str) -> &'a str {
    if data.parent_metric.contains_key(name) {
        name
    } else {
        type_name
    }
}

fn add_task_execution_data(
    metrics: &mut MetricsContainer<TimeInterval>,
    data: &TaskMetricsData,
    report: &BuildReport,
) -> Result<(), MetricsError> {
    let task_time = |path: &str| report.task_times.get(path).copied().unwrap_or_default();

    let mut by_type: BTreeMap<&str, Vec<&TaskData>> = BTreeMap::new();
    for task in &data.tasks {
        by_type
            .entry(short_task_type_name(&task.type_fq_name))
            .or_default()
            .push(task);
    }

    let mut compilation_time = TimeInterval::ZERO;
    let mut non_compilation_time = TimeInterval::ZERO;

    for (type_name, tasks) in by_type {
        let mut time_for_type = TimeInterval::ZERO;
        let mut type_metrics: MetricsContainer<TimeInterval> = MetricsContainer::new();

        for task in tasks.iter().filter(|t| t.did_work) {
            time_for_type += task_time(&task.path);
            for (name, &nanos) in &task.time_metrics {
                if nanos <= 0 {
                    continue;
                }
                let parent = data
                    .parent_metric
                    .get(name)
                    .map(|p| replace_root_name(data, p, type_name));
                let name = replace_root_name(data, name, type_name);
                let value = TimeInterval::ns(nanos.unsigned_abs());
                if let Err(e) = type_metrics.add_value(name, value, parent) {
                    tracing::warn!(task_type = type_name, error = %e, "ignoring metric parent");
                    type_metrics.add_value(name, value, None)?;
                }
            }
        }

        if type_name == "JavaCompile" {
            type_metrics.set_value(
                JAVA_INSTRUMENTATION_METRIC,
                report.java_instrumentation_time,
                Some(type_name),
            )?;
        }

        let parent = if COMPILE_TASK_TYPES.contains(&type_name) {
            compilation_time += time_for_type;
            BuildPhase::CompilationTasks
        } else {
            non_compilation_time += time_for_type;
            BuildPhase::NonCompilationTasks
        };
        metrics.set(type_name, Metric::Container(type_metrics), Some(parent.name()))?;
    }

    let build_src = task_time(BUILD_SRC_COMPILE_TASK);
    compilation_time += build_src;
    set_phase(metrics, BuildPhase::KotlinCompileBuildSrc, build_src)?;
    set_phase(metrics, BuildPhase::CompilationTasks, compilation_time)?;
    set_phase(metrics, BuildPhase::NonCompilationTasks, non_compilation_time)?;
    Ok(())
}
