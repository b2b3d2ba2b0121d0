//! Progress listeners that report a run: structured logs, TeamCity service
//! messages, and the persisted results file.

pub mod logging;
pub mod results;
pub mod teamcity;

pub use logging::LoggingReporter;
pub use results::{read_results, ResultFormat, ResultsFileReporter};
pub use teamcity::TeamCityReporter;

use crate::listener::ProgressListener;
use std::io;

/// Console reporter for the current environment: TeamCity service messages on
/// stdout when running under TeamCity, log lines otherwise.
pub fn console_reporter(teamcity: bool) -> Box<dyn ProgressListener> {
    if teamcity {
        Box::new(TeamCityReporter::new(io::stdout()))
    } else {
        Box::new(LoggingReporter::new())
    }
}
