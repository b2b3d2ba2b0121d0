//! Predefined benchmark suites.

use crate::builder::suite;
use crate::error::BenchError;
use crate::suite::{Suite, Task, TypeOfChange};
use crate::BenchmarkSelection;
use std::path::Path;

/// Tasks run by every step that does not override them.
pub const DEFAULT_TASKS: [Task; 3] = [Task::Dist, Task::CompilerTestClasses, Task::IdeaTestClasses];

/// Where the recorded change files live, relative to the working directory.
pub const DEFAULT_CHANGE_FILES_ROOT: &str = "src/main/resources/change-files";

/// Project names with a predefined suite.
pub const KNOWN_PROJECTS: [&str; 1] = ["kotlin"];

pub fn kotlin_benchmarks(change_files_root: &Path, default_tasks: &[Task]) -> Suite {
    suite(change_files_root, |s| {
        let core_util_strings = s.changeable_file("coreUtil/StringsKt");
        let core_util_core_lib = s.changeable_file("coreUtil/CoreLibKt");

        s.default_tasks(default_tasks.iter().copied());

        s.scenario("clean build", |sc| {
            sc.expect_slow_build("clean build");
            sc.step(|st| {
                st.do_not_measure().run_tasks([Task::Clean]);
            });
            sc.step(|_| {});
        });

        for (name, change) in [
            ("add private function", TypeOfChange::AddPrivateFunction),
            ("add public function", TypeOfChange::AddPublicFunction),
            ("add private class", TypeOfChange::AddPrivateClass),
            ("add public class", TypeOfChange::AddPublicClass),
        ] {
            s.scenario(name, |sc| {
                sc.step(|st| {
                    st.change_file(&core_util_strings, change);
                });
            });
        }

        s.scenario("build after error", |sc| {
            sc.step(|st| {
                st.do_not_measure()
                    .expect_build_to_fail()
                    .change_file(&core_util_strings, TypeOfChange::IntroduceCompileError);
            });
            sc.step(|st| {
                st.change_file(&core_util_strings, TypeOfChange::FixCompileError);
            });
        });

        s.scenario("change popular inline function", |sc| {
            sc.step(|st| {
                st.change_file(&core_util_core_lib, TypeOfChange::ChangeInlineFunction);
            });
        });
    })
}

/// Every scenario defined for `project_name`.
pub fn all_benchmarks(project_name: &str, change_files_root: &Path, default_tasks: &[Task]) -> Result<Suite, BenchError> {
    match project_name {
        "kotlin" => Ok(kotlin_benchmarks(change_files_root, default_tasks)),
        other => Err(BenchError::UnknownSuite(other.to_string())),
    }
}

/// [`all_benchmarks`] without the scenarios expected to be slow.
pub fn fast_benchmarks(project_name: &str, change_files_root: &Path, default_tasks: &[Task]) -> Result<Suite, BenchError> {
    all_benchmarks(project_name, change_files_root, default_tasks).map(|suite| suite.fast_only())
}

pub fn select(
    selection: BenchmarkSelection,
    project_name: &str,
    change_files_root: &Path,
    default_tasks: &[Task],
) -> Result<Suite, BenchError> {
    match selection {
        BenchmarkSelection::Fast => fast_benchmarks(project_name, change_files_root, default_tasks),
        BenchmarkSelection::All => all_benchmarks(project_name, change_files_root, default_tasks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::Step;

    fn names(suite: &Suite) -> Vec<&str> {
        suite.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_kotlin_suite_shape() {
        let suite = all_benchmarks("kotlin", Path::new("cf"), &DEFAULT_TASKS).unwrap();
        assert_eq!(
            names(&suite),
            vec![
                "clean build",
                "add private function",
                "add public function",
                "add private class",
                "add public class",
                "build after error",
                "change popular inline function",
            ]
        );
        assert_eq!(suite.default_tasks, DEFAULT_TASKS.to_vec());
        assert_eq!(suite.changeable_files.len(), 2);

        let clean = suite.scenario("clean build").unwrap();
        assert!(clean.is_slow());
        assert_eq!(clean.steps[0].tasks(), Some(&[Task::Clean][..]));
        assert!(!clean.steps[0].is_measured());

        let after_error = suite.scenario("build after error").unwrap();
        assert!(after_error.steps[0].is_expected_to_fail());
        assert!(!after_error.steps[0].is_measured());
        assert!(after_error.steps[1].is_measured());

        let inline = suite.scenario("change popular inline function").unwrap();
        match &inline.steps[0] {
            Step::Apply { file_changes, .. } => {
                assert_eq!(file_changes[0].changeable_file.name(), "coreUtil/CoreLibKt");
                assert_eq!(file_changes[0].type_of_change, TypeOfChange::ChangeInlineFunction);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_fast_suite_drops_slow_scenarios() {
        let all = all_benchmarks("kotlin", Path::new("cf"), &DEFAULT_TASKS).unwrap();
        let fast = select(BenchmarkSelection::Fast, "kotlin", Path::new("cf"), &DEFAULT_TASKS).unwrap();
        assert_eq!(fast.scenarios.len(), all.scenarios.len() - 1);
        assert!(fast.scenario("clean build").is_none());
        assert_eq!(fast.changeable_files, all.changeable_files);
    }

    #[test]
    fn test_unknown_project_is_an_error() {
        let err = all_benchmarks("gradle", Path::new("cf"), &DEFAULT_TASKS).unwrap_err();
        assert_eq!(err.to_string(), "test suite for gradle is not defined");
    }
}
