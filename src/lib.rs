use clap::ValueEnum;

pub mod builder;
pub mod changes;
pub mod error;
pub mod evaluator;
pub mod harness;
pub mod invoker;
pub mod listener;
pub mod metrics;
pub mod phases;
pub mod reporters;
pub mod results;
pub mod scenarios;
pub mod schema;
pub mod suite;
pub mod time;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use error::{BenchError, ChangeError, ListenerError, ScenarioFailure, StepError, ValidationError};
pub use evaluator::{BenchmarkEvaluator, RunSummary};
pub use invoker::{BuildFailure, BuildInvoker, BuildRequest, CommandBuildInvoker};
pub use listener::{CompositeProgressListener, ProgressListener};
pub use metrics::{Metric, MetricsContainer};
pub use suite::{ChangeableFile, FileChange, Scenario, Step, StepOptions, Suite, Task, TypeOfChange};
pub use time::TimeInterval;

/// Which predefined scenarios to run.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum BenchmarkSelection {
    /// Every scenario except the ones marked as slow builds.
    #[default]
    Fast,
    /// Every scenario, including clean builds.
    All,
}
