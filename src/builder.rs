//! Closure-based suite construction.
//!
//! ```
//! use build_bench::builder::suite;
//! use build_bench::{Task, TypeOfChange};
//!
//! let suite = suite("change-files", |s| {
//!     s.default_tasks([Task::Build]);
//!     let strings = s.changeable_file("coreUtil/StringsKt");
//!     s.scenario("add public function", |sc| {
//!         sc.step(|st| {
//!             st.change_file(&strings, TypeOfChange::AddPublicFunction);
//!         });
//!     });
//! });
//! assert_eq!(suite.scenarios.len(), 1);
//! ```

use crate::suite::{ChangeableFile, FileChange, Scenario, Step, StepOptions, Suite, Task, TypeOfChange};
use std::collections::BTreeSet;
use std::num::NonZeroU8;
use std::path::{Path, PathBuf};

/// Build a [`Suite`] whose changeable files resolve under `change_files_root`.
pub fn suite(change_files_root: impl AsRef<Path>, configure: impl FnOnce(&mut SuiteBuilder)) -> Suite {
    let mut builder = SuiteBuilder {
        change_files_root: change_files_root.as_ref().to_path_buf(),
        suite: Suite::default(),
    };
    configure(&mut builder);
    builder.suite
}

pub struct SuiteBuilder {
    change_files_root: PathBuf,
    suite: Suite,
}

impl SuiteBuilder {
    /// Declare a changeable file and return a handle for use in steps.
    pub fn changeable_file(&mut self, name: &str) -> ChangeableFile {
        let file = ChangeableFile::new(&self.change_files_root, name);
        if !self.suite.changeable_files.contains(&file) {
            self.suite.changeable_files.push(file.clone());
        }
        file
    }

    pub fn default_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) -> &mut Self {
        self.suite.default_tasks = tasks.into_iter().collect();
        self
    }

    pub fn default_jdk(&mut self, jdk: impl Into<PathBuf>) -> &mut Self {
        self.suite.default_jdk = Some(jdk.into());
        self
    }

    pub fn default_arguments<S: Into<String>>(&mut self, arguments: impl IntoIterator<Item = S>) -> &mut Self {
        self.suite.default_arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn scenario(&mut self, name: &str, configure: impl FnOnce(&mut ScenarioBuilder)) -> &mut Self {
        let mut builder = ScenarioBuilder {
            scenario: Scenario::new(name, Vec::new()),
        };
        configure(&mut builder);
        self.suite.scenarios.push(builder.scenario);
        self
    }
}

pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl ScenarioBuilder {
    pub fn step(&mut self, configure: impl FnOnce(&mut StepBuilder)) -> &mut Self {
        let mut builder = StepBuilder::default();
        configure(&mut builder);
        self.scenario.steps.push(Step::Apply {
            options: builder.options,
            file_changes: builder.file_changes,
        });
        self
    }

    /// Undo the previous step's edits, then build.
    pub fn revert_last_step(&mut self, configure: impl FnOnce(&mut StepBuilder)) -> &mut Self {
        let mut builder = StepBuilder::default();
        configure(&mut builder);
        if !builder.file_changes.is_empty() {
            tracing::warn!(
                scenario = %self.scenario.name,
                "file changes declared on a revert step are ignored"
            );
        }
        self.scenario.steps.push(Step::RevertLast {
            options: builder.options,
        });
        self
    }

    /// Exclude the scenario from the fast suite.
    pub fn expect_slow_build(&mut self, reason: &str) -> &mut Self {
        self.scenario.expected_slow_build_reason = Some(reason.to_string());
        self
    }

    /// Run the scenario `times` times; zero is treated as one.
    pub fn repeat(&mut self, times: u8) -> &mut Self {
        self.scenario.repeat = NonZeroU8::new(times).unwrap_or(NonZeroU8::MIN);
        self
    }

    pub fn jdk(&mut self, jdk: impl Into<PathBuf>) -> &mut Self {
        self.scenario.jdk = Some(jdk.into());
        self
    }

    pub fn arguments<S: Into<String>>(&mut self, arguments: impl IntoIterator<Item = S>) -> &mut Self {
        self.scenario.arguments = Some(arguments.into_iter().map(Into::into).collect());
        self
    }

    pub fn tasks(&mut self, tasks: impl IntoIterator<Item = Task>) -> &mut Self {
        self.scenario.tasks = Some(tasks.into_iter().collect());
        self
    }

    /// Restrict the metrics surfaced as CI parameters to `names`.
    pub fn track_metrics<S: Into<String>>(&mut self, names: impl IntoIterator<Item = S>) -> &mut Self {
        let tracked = self.scenario.tracked_metrics.get_or_insert_with(BTreeSet::new);
        tracked.extend(names.into_iter().map(Into::into));
        self
    }
}

#[derive(Default)]
pub struct StepBuilder {
    options: StepOptions,
    file_changes: Vec<FileChange>,
}

impl StepBuilder {
    pub fn do_not_measure(&mut self) -> &mut Self {
        self.options.is_measured = false;
        self
    }

    pub fn expect_build_to_fail(&mut self) -> &mut Self {
        self.options.is_expected_to_fail = true;
        self
    }

    pub fn run_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) -> &mut Self {
        self.options.tasks = Some(tasks.into_iter().collect());
        self
    }

    pub fn change_file(&mut self, file: &ChangeableFile, change: TypeOfChange) -> &mut Self {
        self.file_changes.push(FileChange::new(file, change));
        self
    }
}
