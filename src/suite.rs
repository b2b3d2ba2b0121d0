//! Benchmark suite data model.
//!
//! A [`Suite`] is an ordered list of [`Scenario`]s plus defaults (tasks, JDK,
//! build arguments) and the set of [`ChangeableFile`]s its steps edit. Suites
//! are built once (see [`crate::builder`]) and then only read; derived suites
//! are produced by copying.
//!
//! # Change-files layout
//!
//! ```text
//! <change-files-root>/<changeable file name>/
//!   _target-file.txt             project-relative path of the edited file
//!   _initial.benchmark           last recorded copy of the target file
//!   addPublicFunction.benchmark  one variant per TypeOfChange
//!   ...
//! ```

use clap::ValueEnum;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroU8;
use std::path::{Path, PathBuf};

/// File inside a change-files directory naming the project file it edits.
pub const TARGET_FILE_NAME: &str = "_target-file.txt";

/// Recorded copy of the target file every variant is based on.
pub const INITIAL_FILE_NAME: &str = "_initial.benchmark";

/// Extension of recorded content variants.
pub const VARIANT_EXTENSION: &str = "benchmark";

/// `ADD_PUBLIC_FUNCTION` -> `addPublicFunction`
pub(crate) fn constant_case_to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name.split('_').filter(|w| !w.is_empty()).enumerate() {
        let lower = word.to_ascii_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.extend(chars);
            }
        }
    }
    out
}

/// Kind of source edit a [`FileChange`] applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeOfChange {
    AddPrivateFunction,
    AddPublicFunction,
    AddPrivateClass,
    AddPublicClass,
    ChangeInlineFunction,
    IntroduceCompileError,
    FixCompileError,
    ChangeAndroidResource,
    ChangePublicFunctionBody,
}

impl TypeOfChange {
    pub const ALL: [TypeOfChange; 9] = [
        TypeOfChange::AddPrivateFunction,
        TypeOfChange::AddPublicFunction,
        TypeOfChange::AddPrivateClass,
        TypeOfChange::AddPublicClass,
        TypeOfChange::ChangeInlineFunction,
        TypeOfChange::IntroduceCompileError,
        TypeOfChange::FixCompileError,
        TypeOfChange::ChangeAndroidResource,
        TypeOfChange::ChangePublicFunctionBody,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeOfChange::AddPrivateFunction => "ADD_PRIVATE_FUNCTION",
            TypeOfChange::AddPublicFunction => "ADD_PUBLIC_FUNCTION",
            TypeOfChange::AddPrivateClass => "ADD_PRIVATE_CLASS",
            TypeOfChange::AddPublicClass => "ADD_PUBLIC_CLASS",
            TypeOfChange::ChangeInlineFunction => "CHANGE_INLINE_FUNCTION",
            TypeOfChange::IntroduceCompileError => "INTRODUCE_COMPILE_ERROR",
            TypeOfChange::FixCompileError => "FIX_COMPILE_ERROR",
            TypeOfChange::ChangeAndroidResource => "CHANGE_ANDROID_RESOURCE",
            TypeOfChange::ChangePublicFunctionBody => "CHANGE_PUBLIC_FUNCTION_BODY",
        }
    }

    /// File name of the recorded variant, e.g. `addPublicFunction.benchmark`.
    pub fn variant_file_name(&self) -> String {
        format!(
            "{}.{VARIANT_EXTENSION}",
            constant_case_to_camel_case(self.as_str())
        )
    }
}

impl fmt::Display for TypeOfChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build task identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Task {
    Assemble,
    KotlinNpmInstall,
    Clean,
    Build,
    CoreUtilClasses,
    Dist,
    CompilerTestClasses,
    IdeaTestClasses,
    KotlinGradlePluginCompileJava,
    KotlinGradlePluginTest,
    KotlinGradlePluginTestClean,
    PipelinesTest,
    PipelinesTestClean,
    SantaTrackerTest,
    SantaTrackerTestClean,
    IdeaPlugin,
    Install,
    Classes,
    TestClasses,
    /// Main application of the android benchmark project (module21:module02).
    AndroidCompile,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Assemble => "ASSEMBLE",
            Task::KotlinNpmInstall => "KOTLIN_NPM_INSTALL",
            Task::Clean => "CLEAN",
            Task::Build => "BUILD",
            Task::CoreUtilClasses => "CORE_UTIL_CLASSES",
            Task::Dist => "DIST",
            Task::CompilerTestClasses => "COMPILER_TEST_CLASSES",
            Task::IdeaTestClasses => "IDEA_TEST_CLASSES",
            Task::KotlinGradlePluginCompileJava => "KOTLIN_GRADLE_PLUGIN_COMPILE_JAVA",
            Task::KotlinGradlePluginTest => "KOTLIN_GRADLE_PLUGIN_TEST",
            Task::KotlinGradlePluginTestClean => "KOTLIN_GRADLE_PLUGIN_TEST_CLEAN",
            Task::PipelinesTest => "PIPELINES_TEST",
            Task::PipelinesTestClean => "PIPELINES_TEST_CLEAN",
            Task::SantaTrackerTest => "SANTA_TRACKER_TEST",
            Task::SantaTrackerTestClean => "SANTA_TRACKER_TEST_CLEAN",
            Task::IdeaPlugin => "IDEA_PLUGIN",
            Task::Install => "INSTALL",
            Task::Classes => "CLASSES",
            Task::TestClasses => "TEST_CLASSES",
            Task::AndroidCompile => "ANDROID_COMPILE",
        }
    }

    fn custom_path(&self) -> Option<&'static str> {
        match self {
            Task::KotlinNpmInstall => Some(":kotlinNpmInstall"),
            Task::CoreUtilClasses => Some(":core:util.runtime:classes"),
            Task::CompilerTestClasses => Some(":compiler:testClasses"),
            Task::IdeaTestClasses => Some(":idea:testClasses"),
            Task::KotlinGradlePluginCompileJava => Some(":kotlin-gradle-plugin:compileJava"),
            Task::KotlinGradlePluginTest => Some(":kotlin-gradle-plugin:test"),
            Task::KotlinGradlePluginTestClean => Some(":kotlin-gradle-plugin:cleanTest"),
            Task::PipelinesTest => {
                Some(":plugins:pipelines:pipelines-config:pipelines-config-api:test")
            }
            Task::PipelinesTestClean => {
                Some(":plugins:pipelines:pipelines-config:pipelines-config-api:cleanTest")
            }
            Task::SantaTrackerTest => Some(":santa-tracker:test"),
            Task::SantaTrackerTestClean => Some(":santa-tracker:cleanTest"),
            Task::AndroidCompile => Some(":module21:module02:compileDebugJavaWithJavac"),
            _ => None,
        }
    }

    /// Task path handed to the build tool.
    pub fn path(&self) -> String {
        match self.custom_path() {
            Some(p) => p.to_string(),
            None => constant_case_to_camel_case(self.as_str()),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical edit target backed by a directory of recorded content variants.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeableFile {
    name: String,
    dir: PathBuf,
}

impl ChangeableFile {
    /// Relative names resolve under `change_files_root`; absolute names are used as is.
    pub fn new(change_files_root: &Path, name: &str) -> Self {
        let dir = if Path::new(name).is_absolute() {
            PathBuf::from(name)
        } else {
            change_files_root.join(name)
        };
        Self {
            name: name.to_string(),
            dir,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn change_files_dir(&self) -> &Path {
        &self.dir
    }

    /// Project-relative path of the edited file, read from `_target-file.txt`.
    pub fn target_file(&self) -> io::Result<PathBuf> {
        let raw = fs::read_to_string(self.dir.join(TARGET_FILE_NAME))?;
        Ok(PathBuf::from(raw.trim()))
    }

    /// Last recorded copy of the target file. Every variant is a modification of
    /// this snapshot, so it must be refreshed whenever the target changes upstream.
    pub fn expected_initial_file(&self) -> PathBuf {
        self.dir.join(INITIAL_FILE_NAME)
    }

    pub fn changed_file(&self, change: TypeOfChange) -> PathBuf {
        self.dir.join(change.variant_file_name())
    }
}

impl fmt::Display for ChangeableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileChange {
    pub changeable_file: ChangeableFile,
    pub type_of_change: TypeOfChange,
}

impl FileChange {
    pub fn new(changeable_file: &ChangeableFile, type_of_change: TypeOfChange) -> Self {
        Self {
            changeable_file: changeable_file.clone(),
            type_of_change,
        }
    }

    pub fn changed_file(&self) -> PathBuf {
        self.changeable_file.changed_file(self.type_of_change)
    }
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.changeable_file, self.type_of_change)
    }
}

/// Attributes shared by every step kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOptions {
    pub is_measured: bool,
    pub is_expected_to_fail: bool,
    pub tasks: Option<Vec<Task>>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            is_measured: true,
            is_expected_to_fail: false,
            tasks: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Overwrite targets with recorded variants, then build.
    Apply {
        options: StepOptions,
        file_changes: Vec<FileChange>,
    },
    /// Undo the previous step's edits, then build.
    RevertLast { options: StepOptions },
}

impl Step {
    pub fn options(&self) -> &StepOptions {
        match self {
            Step::Apply { options, .. } | Step::RevertLast { options } => options,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.options().is_measured
    }

    pub fn is_expected_to_fail(&self) -> bool {
        self.options().is_expected_to_fail
    }

    pub fn tasks(&self) -> Option<&[Task]> {
        self.options().tasks.as_deref()
    }

    pub fn file_changes(&self) -> &[FileChange] {
        match self {
            Step::Apply { file_changes, .. } => file_changes,
            Step::RevertLast { .. } => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
    pub repeat: NonZeroU8,
    /// Set for scenarios excluded from the fast suite.
    pub expected_slow_build_reason: Option<String>,
    pub jdk: Option<PathBuf>,
    pub arguments: Option<Vec<String>>,
    pub tasks: Option<Vec<Task>>,
    /// Metric names surfaced to CI parameters; `None` surfaces everything.
    pub tracked_metrics: Option<BTreeSet<String>>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
            repeat: NonZeroU8::MIN,
            expected_slow_build_reason: None,
            jdk: None,
            arguments: None,
            tasks: None,
            tracked_metrics: None,
        }
    }

    pub fn is_slow(&self) -> bool {
        self.expected_slow_build_reason.is_some()
    }

    pub fn tracks_metric(&self, full_name: &str) -> bool {
        self.tracked_metrics
            .as_ref()
            .map_or(true, |tracked| tracked.contains(full_name))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Suite {
    pub scenarios: Vec<Scenario>,
    pub default_tasks: Vec<Task>,
    pub changeable_files: Vec<ChangeableFile>,
    pub default_jdk: Option<PathBuf>,
    pub default_arguments: Vec<String>,
}

impl Suite {
    /// Copy of this suite with a different scenario list.
    pub fn with_scenarios(&self, scenarios: Vec<Scenario>) -> Suite {
        Suite {
            scenarios,
            ..self.clone()
        }
    }

    /// Copy without the scenarios marked as slow.
    pub fn fast_only(&self) -> Suite {
        self.with_scenarios(
            self.scenarios
                .iter()
                .filter(|s| !s.is_slow())
                .cloned()
                .collect(),
        )
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Step override, then scenario override, then suite default.
    pub fn resolve_tasks<'a>(&'a self, scenario: &'a Scenario, step: &'a Step) -> &'a [Task] {
        step.tasks()
            .or(scenario.tasks.as_deref())
            .unwrap_or(&self.default_tasks)
    }

    pub fn resolve_jdk<'a>(&'a self, scenario: &'a Scenario) -> Option<&'a Path> {
        scenario.jdk.as_deref().or(self.default_jdk.as_deref())
    }

    pub fn resolve_arguments<'a>(&'a self, scenario: &'a Scenario) -> &'a [String] {
        scenario
            .arguments
            .as_deref()
            .unwrap_or(&self.default_arguments)
    }
}
