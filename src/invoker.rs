//! Build invocation.
//!
//! The evaluator only knows the [`BuildInvoker`] trait: given task paths, an
//! optional JDK and extra arguments, run a build to completion and return its
//! [`BuildReport`]. [`CommandBuildInvoker`] is the process-based
//! implementation used by the CLI.

use crate::phases::BuildReport;
use crate::suite::Task;
use crate::time::TimeInterval;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use thiserror::Error;

/// Env var through which a build can locate the report file it should write.
pub const REPORT_FILE_ENV: &str = "BUILD_BENCH_REPORT_FILE";

#[derive(Clone, Copy, Debug)]
pub struct BuildRequest<'a> {
    pub tasks: &'a [Task],
    pub jdk: Option<&'a Path>,
    pub arguments: &'a [String],
    pub expect_failure: bool,
}

/// A build that did not complete successfully.
///
/// `report` holds whatever timings were collected before the failure.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct BuildFailure {
    pub reason: String,
    pub report: Option<BuildReport>,
}

impl BuildFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            report: None,
        }
    }
}

pub trait BuildInvoker {
    /// Run one build and block until it finishes.
    fn run(
        &mut self,
        request: &BuildRequest<'_>,
        output: Option<&mut dyn Write>,
    ) -> Result<BuildReport, BuildFailure>;
}

/// Runs a build program (e.g. `./gradlew`) in the project directory.
///
/// The program receives the task paths followed by the request arguments.
/// A fresh report file path is exported through [`REPORT_FILE_ENV`] and, when
/// `report_property` is set, passed as `-P<property>=<path>`. A non-empty JSON
/// report is parsed into a [`BuildReport`]; otherwise the measured wall time is
/// reported as the whole build.
#[derive(Clone, Debug)]
pub struct CommandBuildInvoker {
    pub program: PathBuf,
    pub project_root: PathBuf,
    pub report_property: Option<String>,
    pub jvm_arguments: Vec<String>,
}

impl CommandBuildInvoker {
    pub fn new(program: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            project_root: project_root.into(),
            report_property: None,
            jvm_arguments: Vec::new(),
        }
    }

    fn command(&self, request: &BuildRequest<'_>, report_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.project_root)
            .env(REPORT_FILE_ENV, report_path)
            .args(request.tasks.iter().map(Task::path));
        if let Some(property) = &self.report_property {
            let mut arg = OsString::from(format!("-P{property}="));
            arg.push(report_path);
            cmd.arg(arg);
        }
        if !self.jvm_arguments.is_empty() {
            cmd.arg(format!("-Dorg.gradle.jvmargs={}", self.jvm_arguments.join(" ")));
        }
        cmd.args(request.arguments);
        if let Some(jdk) = request.jdk {
            cmd.env("JAVA_HOME", jdk);
        }
        cmd
    }

    fn read_report(path: &Path, elapsed: TimeInterval) -> BuildReport {
        let bytes = match fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return BuildReport::wall_time_only(elapsed),
        };
        match serde_json::from_slice::<BuildReport>(&bytes) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(report = %path.display(), error = %e, "could not read build metrics");
                BuildReport::wall_time_only(elapsed)
            }
        }
    }
}

impl BuildInvoker for CommandBuildInvoker {
    fn run(
        &mut self,
        request: &BuildRequest<'_>,
        output: Option<&mut dyn Write>,
    ) -> Result<BuildReport, BuildFailure> {
        let report_file = tempfile::Builder::new()
            .prefix("build-bench-")
            .suffix("-metrics.json")
            .tempfile()
            .map_err(|e| BuildFailure::new(format!("could not create metrics file: {e}")))?;

        let mut cmd = self.command(request, report_file.path());
        tracing::debug!(program = %self.program.display(), ?cmd, "starting build");

        let start = Instant::now();
        let result = cmd.output();
        let elapsed = TimeInterval::from(start.elapsed());

        let out = result.map_err(|e| {
            BuildFailure::new(format!("could not start {}: {e}", self.program.display()))
        })?;
        if let Some(sink) = output {
            if let Err(e) = write_output(sink, &out.stdout, &out.stderr) {
                tracing::warn!(error = %e, "could not write build output");
            }
        }

        let report = Self::read_report(report_file.path(), elapsed);
        if out.status.success() {
            return Ok(report);
        }

        let reason = format!("build exited with {}", out.status);
        if request.expect_failure {
            tracing::debug!(%reason, "build failed as expected");
        } else {
            tracing::warn!(%reason, "build failed");
        }
        Err(BuildFailure {
            reason,
            report: Some(report),
        })
    }
}

fn write_output(sink: &mut dyn Write, stdout: &[u8], stderr: &[u8]) -> io::Result<()> {
    sink.write_all(stdout)?;
    sink.write_all(stderr)?;
    sink.flush()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-build.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn request<'a>(tasks: &'a [Task], arguments: &'a [String], expect_failure: bool) -> BuildRequest<'a> {
        BuildRequest {
            tasks,
            jdk: None,
            arguments,
            expect_failure,
        }
    }

    #[test]
    fn test_reads_json_report_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            &dir,
            r#"echo "tasks: $@"
echo '{"build_time": 7000000, "configuration_time": 2000000, "execution_time": 5000000}' > "$BUILD_BENCH_REPORT_FILE""#,
        );
        let mut invoker = CommandBuildInvoker::new(program, dir.path());
        let args = vec!["--offline".to_string()];
        let mut log = Vec::new();

        let report = invoker
            .run(&request(&[Task::Build, Task::CompilerTestClasses], &args, false), Some(&mut log))
            .unwrap();

        assert_eq!(report.build_time, TimeInterval::ms(7));
        assert_eq!(report.configuration_time, TimeInterval::ms(2));
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("tasks: build :compiler:testClasses --offline"), "{log}");
    }

    #[test]
    fn test_missing_report_falls_back_to_wall_time() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "exit 0");
        let mut invoker = CommandBuildInvoker::new(program, dir.path());

        let report = invoker.run(&request(&[Task::Build], &[], false), None).unwrap();
        assert_eq!(report.build_time, report.execution_time);
        assert_eq!(report.configuration_time, TimeInterval::ZERO);
    }

    #[test]
    fn test_report_property_and_java_home() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, r#"echo "$@ JAVA_HOME=$JAVA_HOME""#);
        let mut invoker = CommandBuildInvoker::new(program, dir.path());
        invoker.report_property = Some("metrics.file".into());
        invoker.jvm_arguments = vec!["-XX:HeapDumpOnOutOfMemoryError".into()];
        let jdk = PathBuf::from("/opt/jdk-17");
        let mut log = Vec::new();

        invoker
            .run(
                &BuildRequest {
                    tasks: &[Task::Assemble],
                    jdk: Some(&jdk),
                    arguments: &[],
                    expect_failure: false,
                },
                Some(&mut log),
            )
            .unwrap();

        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("assemble -Pmetrics.file="), "{log}");
        assert!(log.contains("-Dorg.gradle.jvmargs=-XX:HeapDumpOnOutOfMemoryError"), "{log}");
        assert!(log.contains("JAVA_HOME=/opt/jdk-17"), "{log}");
    }

    #[test]
    fn test_failed_build_keeps_partial_report() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            &dir,
            r#"echo '{"build_time": 3000000}' > "$BUILD_BENCH_REPORT_FILE"
exit 1"#,
        );
        let mut invoker = CommandBuildInvoker::new(program, dir.path());

        let failure = invoker.run(&request(&[Task::Build], &[], true), None).unwrap_err();
        assert!(failure.reason.contains("exited"));
        assert_eq!(failure.report.unwrap().build_time, TimeInterval::ms(3));
    }

    #[test]
    fn test_missing_program_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut invoker = CommandBuildInvoker::new(dir.path().join("nope"), dir.path());
        let failure = invoker.run(&request(&[Task::Build], &[], false), None).unwrap_err();
        assert!(failure.reason.contains("could not start"));
        assert_eq!(failure.to_string(), failure.reason);
        assert!(failure.report.is_none());
    }
}
