//! Error types for suite validation, working-tree mutation, builds and listeners.
//!
//! Step-level errors ([`StepError`]) are recovered by the evaluator: they abort
//! the current scenario iteration and are reported through the listeners.
//! [`BenchError`] terminates the whole run.

use crate::invoker::BuildFailure;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fixture drift or missing change files, detected before anything is mutated.
#[derive(Debug, Error)]
#[error("Benchmark scenarios are not valid:{}", format_problems(.problems))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

fn format_problems(problems: &[String]) -> String {
    problems.iter().map(|p| format!("\n  * {p}")).collect()
}

/// Failure while writing or restoring a file in the benchmarked project.
#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("change file for {change} does not exist: {}", .path.display())]
    MissingChangeFile { change: String, path: PathBuf },

    #[error("could not resolve target file of '{file}': {source}")]
    UnresolvedTarget {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("there is no previous step change to revert")]
    NothingToRevert,
}

/// Why a single step did not complete.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("could not apply step changes: {0}")]
    Changes(#[from] ChangeError),

    #[error("build failed: {0}")]
    Build(#[from] BuildFailure),
}

/// A scenario iteration aborted at `step_index` (zero-based).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {} failed: {reason}", .step_index + 1)]
pub struct ScenarioFailure {
    pub step_index: usize,
    pub reason: String,
}

/// Raised by a progress listener. Never swallowed by the evaluator.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not encode results: {0}")]
    Encode(String),

    #[error("{0}")]
    Other(String),
}

/// Run-fatal errors.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("progress listener failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("could not restore the working tree: {0}")]
    Revert(#[source] ChangeError),

    #[error("test suite for {0} is not defined")]
    UnknownSuite(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
