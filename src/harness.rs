use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::BenchmarkSelection;

/// Per-run settings shared by the CLI, the reporters and the log provider.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub project_root: PathBuf,
    pub results_dir: PathBuf,
    pub selection: BenchmarkSelection,
    /// Prefix of every artifact written by this run.
    pub timestamp: String,
    pub git_sha: Option<String>,
}

impl HarnessConfig {
    pub fn new(project_root: PathBuf, results_dir: PathBuf, selection: BenchmarkSelection) -> Self {
        Self {
            project_root,
            results_dir,
            selection,
            timestamp: run_timestamp(),
            git_sha: git_sha_short(),
        }
    }

    pub fn compact_results_file(&self) -> PathBuf {
        self.results_dir.join(format!("{}.result.bin", self.timestamp))
    }

    pub fn json_results_file(&self) -> PathBuf {
        self.results_dir.join(format!("{}.result.json", self.timestamp))
    }

    pub fn build_logs(&self) -> FileBuildLogs {
        FileBuildLogs::new(&self.results_dir, &self.timestamp)
    }
}

/// Local time formatted for file names, e.g. `2024-03-01-17-05-59`.
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

pub fn git_sha_short() -> Option<String> {
    // Exported by CI; absent for local runs.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

/// TeamCity exports `TEAMCITY_VERSION` to every build step.
pub fn is_teamcity_run() -> bool {
    std::env::var_os("TEAMCITY_VERSION").is_some()
}

/// JVM arguments requested through `HEAP_DUMP_PATH`.
pub fn heap_dump_jvm_arguments() -> Vec<String> {
    match std::env::var("HEAP_DUMP_PATH") {
        Ok(path) if !path.is_empty() => vec![
            format!("-XX:HeapDumpPath={path}"),
            "-XX:+HeapDumpOnOutOfMemoryError".to_string(),
        ],
        _ => Vec::new(),
    }
}

/// Which build a log file belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogTarget<'a> {
    /// `step` is one-based.
    Step {
        scenario: &'a str,
        iteration: u32,
        step: usize,
    },
    /// Settle build run after `scenario` before the next iteration.
    Cleanup { scenario: &'a str, iteration: u32 },
}

/// Provides the output sink of each build.
pub trait BuildLogs {
    fn open(&mut self, target: &LogTarget<'_>) -> io::Result<Box<dyn Write>>;
}

/// Writes one log file per build into a directory.
#[derive(Clone, Debug)]
pub struct FileBuildLogs {
    dir: PathBuf,
    timestamp: String,
}

impl FileBuildLogs {
    pub fn new(dir: &Path, timestamp: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            timestamp: timestamp.to_string(),
        }
    }

    pub fn file_name(&self, target: &LogTarget<'_>) -> String {
        let safe = |s: &str| s.replace(['/', '\\'], "_");
        match target {
            LogTarget::Step {
                scenario,
                iteration,
                step,
            } => format!("{}-build-{}-#{iteration}-{step}.log", self.timestamp, safe(scenario)),
            LogTarget::Cleanup {
                scenario,
                iteration,
            } => format!("{}-cleanup-{}-#{iteration}.log", self.timestamp, safe(scenario)),
        }
    }
}

impl BuildLogs for FileBuildLogs {
    fn open(&mut self, target: &LogTarget<'_>) -> io::Result<Box<dyn Write>> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(self.dir.join(self.file_name(target)))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_names_are_deterministic() {
        let logs = FileBuildLogs::new(Path::new("/results"), "2024-01-02-03-04-05");
        assert_eq!(
            logs.file_name(&LogTarget::Step {
                scenario: "add public function",
                iteration: 2,
                step: 1
            }),
            "2024-01-02-03-04-05-build-add public function-#2-1.log"
        );
        assert_eq!(
            logs.file_name(&LogTarget::Cleanup {
                scenario: "a/b",
                iteration: 1
            }),
            "2024-01-02-03-04-05-cleanup-a_b-#1.log"
        );
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("nested/results");
        let mut logs = FileBuildLogs::new(&results, "t");
        let target = LogTarget::Step {
            scenario: "s",
            iteration: 1,
            step: 1,
        };
        {
            let mut sink = logs.open(&target).unwrap();
            sink.write_all(b"BUILD SUCCESSFUL").unwrap();
        }
        let written = fs::read_to_string(results.join(logs.file_name(&target))).unwrap();
        assert_eq!(written, "BUILD SUCCESSFUL");
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = run_timestamp();
        assert_eq!(ts.len(), "2024-01-02-03-04-05".len());
        assert_eq!(ts.matches('-').count(), 5);
    }

    #[test]
    fn test_artifact_paths_share_timestamp() {
        let mut cfg = HarnessConfig::new(
            PathBuf::from("/project"),
            PathBuf::from("/results"),
            BenchmarkSelection::Fast,
        );
        cfg.timestamp = "T".into();
        assert_eq!(cfg.compact_results_file(), PathBuf::from("/results/T.result.bin"));
        assert_eq!(cfg.json_results_file(), PathBuf::from("/results/T.result.json"));
    }
}
