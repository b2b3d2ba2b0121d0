use crate::error::{ListenerError, ScenarioFailure};
use crate::listener::ProgressListener;
use crate::results::ScenarioResult;
use crate::schema::{BenchmarkResults, RunMeta, ScenarioRecord};
use crate::suite::Scenario;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultFormat {
    /// bincode, `.result.bin`
    Compact,
    /// pretty-printed JSON, `.result.json`
    Json,
}

impl ResultFormat {
    /// Guess from the file extension; anything but `.json` is compact.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ResultFormat::Json,
            _ => ResultFormat::Compact,
        }
    }
}

/// Collects every finished iteration and writes them when the run ends.
pub struct ResultsFileReporter {
    path: PathBuf,
    format: ResultFormat,
    results: BenchmarkResults,
}

impl ResultsFileReporter {
    pub fn new(path: impl Into<PathBuf>, run: RunMeta) -> Self {
        let path = path.into();
        Self {
            format: ResultFormat::from_path(&path),
            path,
            results: BenchmarkResults {
                run,
                scenarios: Vec::new(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<(), ListenerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&self.path)?);
        match self.format {
            ResultFormat::Compact => bincode::serialize_into(&mut out, &self.results)
                .map_err(|e| ListenerError::Encode(e.to_string()))?,
            ResultFormat::Json => serde_json::to_writer_pretty(&mut out, &self.results)
                .map_err(|e| ListenerError::Encode(e.to_string()))?,
        }
        out.flush()?;
        tracing::info!(
            path = %self.path.display(),
            scenarios = self.results.scenarios.len(),
            "benchmark results written"
        );
        Ok(())
    }
}

impl ProgressListener for ResultsFileReporter {
    fn scenario_finished(
        &mut self,
        scenario: &Scenario,
        iteration: u32,
        result: &Result<ScenarioResult, ScenarioFailure>,
    ) -> Result<(), ListenerError> {
        self.results
            .scenarios
            .push(ScenarioRecord::new(&scenario.name, iteration, result));
        Ok(())
    }

    fn all_finished(&mut self) -> Result<(), ListenerError> {
        self.write()
    }
}

/// Load a results file written by [`ResultsFileReporter`].
pub fn read_results(path: &Path) -> io::Result<BenchmarkResults> {
    let reader = BufReader::new(File::open(path)?);
    match ResultFormat::from_path(path) {
        ResultFormat::Compact => bincode::deserialize_from(reader).map_err(io::Error::other),
        ResultFormat::Json => serde_json::from_reader(reader).map_err(io::Error::other),
    }
}
