//! TeamCity service messages.
//!
//! Each scenario iteration is reported as a test. Every measured step's metrics
//! become build statistic values keyed
//! `<scenario>.iter-<N>.step-<M>.<metric path>` (milliseconds); tracked metrics
//! are also exported as `env.br.<key>` build parameters.

use crate::error::{ListenerError, ScenarioFailure, StepError};
use crate::listener::ProgressListener;
use crate::results::ScenarioResult;
use crate::results::StepResult;
use crate::suite::{Scenario, Step};
use std::io::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageStatus {
    Normal,
    Warning,
    Failure,
    Error,
}

impl MessageStatus {
    fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Normal => "NORMAL",
            MessageStatus::Warning => "WARNING",
            MessageStatus::Failure => "FAILURE",
            MessageStatus::Error => "ERROR",
        }
    }
}

/// Escapes a value for use inside a service message attribute.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => out.push_str("||"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            '\'' => out.push_str("|'"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            c => out.push(c),
        }
    }
    out
}

/// Replaces everything except ASCII word characters and dots with `_`.
pub fn statistic_key(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct TeamCityReporter<W> {
    out: W,
}

impl<W: Write> TeamCityReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn message(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ListenerError> {
        let mut line = format!("##teamcity[{name}");
        for (key, value) in attributes {
            line.push_str(&format!(" {key}='{}'", escape(value)));
        }
        line.push(']');
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }

    fn report_message(&mut self, text: &str, status: MessageStatus) -> Result<(), ListenerError> {
        self.message("message", &[("text", text), ("status", status.as_str())])
    }

    fn report_statistics(
        &mut self,
        scenario: &Scenario,
        iteration: u32,
        result: &ScenarioResult,
    ) -> Result<(), ListenerError> {
        for step in result.step_results.iter().filter(|s| s.is_measured) {
            for (metric, time) in step.metrics.flatten() {
                let key = statistic_key(&format!(
                    "{}.iter-{iteration}.step-{}.{metric}",
                    scenario.name,
                    step.step_index + 1
                ));
                let value = time.as_ms().to_string();
                if scenario.tracks_metric(&metric) {
                    self.message(
                        "setParameter",
                        &[("key", format!("env.br.{key}").as_str()), ("value", value.as_str())],
                    )?;
                }
                self.message("buildStatisticValue", &[("key", key.as_str()), ("value", value.as_str())])?;
            }
        }
        Ok(())
    }
}

impl<W: Write> ProgressListener for TeamCityReporter<W> {
    fn scenario_started(&mut self, scenario: &Scenario, _iteration: u32) -> Result<(), ListenerError> {
        self.message("testStarted", &[("name", scenario.name.as_str())])
    }

    fn step_finished(
        &mut self,
        _scenario: &Scenario,
        _step_index: usize,
        _step: &Step,
        result: &Result<StepResult, StepError>,
    ) -> Result<(), ListenerError> {
        match result {
            Ok(_) => self.report_message("Step finished", MessageStatus::Normal),
            Err(e) => self.report_message(&format!("Step finished with error: {e}"), MessageStatus::Failure),
        }
    }

    fn scenario_finished(
        &mut self,
        scenario: &Scenario,
        iteration: u32,
        result: &Result<ScenarioResult, ScenarioFailure>,
    ) -> Result<(), ListenerError> {
        match result {
            Ok(r) => self.report_statistics(scenario, iteration, r)?,
            Err(failure) => self.message(
                "testFailed",
                &[("name", scenario.name.as_str()), ("message", failure.to_string().as_str())],
            )?,
        }
        self.message("testFinished", &[("name", scenario.name.as_str())])
    }

    fn cleanup_started(&mut self) -> Result<(), ListenerError> {
        self.report_message("Cleanup after last scenario is started", MessageStatus::Normal)
    }

    fn cleanup_finished(&mut self) -> Result<(), ListenerError> {
        self.report_message("Cleanup after last scenario is finished", MessageStatus::Normal)
    }
}
