//! Pre-run validation of a suite against the benchmarked project.
//!
//! Recorded fixtures go stale whenever the project's sources move on. Rather
//! than benchmark against an outdated edit, validation refuses to start: every
//! problem is collected into one [`ValidationError`]. A stale
//! `_initial.benchmark` is refreshed from the live file so the diff can be
//! reviewed and committed.

use crate::error::ValidationError;
use crate::suite::{ChangeableFile, FileChange, Suite, TypeOfChange, INITIAL_FILE_NAME, VARIANT_EXTENSION};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn normalized(content: &str) -> String {
    content.trim().replace("\r\n", "\n")
}

fn all_changeable_files(suite: &Suite) -> BTreeSet<&ChangeableFile> {
    let mut files: BTreeSet<&ChangeableFile> = suite.changeable_files.iter().collect();
    for scenario in &suite.scenarios {
        for step in &scenario.steps {
            files.extend(step.file_changes().iter().map(|c| &c.changeable_file));
        }
    }
    files
}

pub fn check_benchmarks(project_root: &Path, suite: &Suite) -> Result<(), ValidationError> {
    let mut problems = Vec::new();
    let files = all_changeable_files(suite);

    let mut seen_names = HashSet::new();
    for scenario in &suite.scenarios {
        if !seen_names.insert(scenario.name.as_str()) {
            problems.push(format!("Duplicate scenario name: {}", scenario.name));
        }
    }

    let mut resolved = Vec::new();
    let mut existing = BTreeSet::new();
    for file in &files {
        let target = match file.target_file() {
            Ok(relative) => project_root.join(relative),
            Err(e) => {
                problems.push(format!("Could not read target file of {file}: {e}"));
                continue;
            }
        };
        existing.insert(target.clone());
        existing.insert(file.expected_initial_file());
        resolved.push((*file, target));
    }
    for path in &existing {
        if !path.is_file() {
            problems.push(format!("File does not exist: {}", path.display()));
        }
    }

    for (file, target) in &resolved {
        let initial_path = file.expected_initial_file();
        if !initial_path.is_file() || !target.is_file() {
            continue;
        }
        let (expected, actual) = match (fs::read_to_string(&initial_path), fs::read_to_string(target)) {
            (Ok(expected), Ok(actual)) => (expected, actual),
            (Err(e), _) | (_, Err(e)) => {
                problems.push(format!("Could not read {file}: {e}"));
                continue;
            }
        };
        if normalized(&expected) == normalized(&actual) {
            continue;
        }

        tracing::warn!(file = %file, "recorded initial content is out of date; refreshing it");
        match fs::copy(target, &initial_path) {
            Ok(_) => problems.push(format!(
                "Content of {} does not match {}.\n{} was updated. Please review the changes and commit.",
                target.display(),
                initial_path.display(),
                initial_path.display()
            )),
            Err(e) => problems.push(format!(
                "Content of {} does not match {} and it could not be updated: {e}",
                target.display(),
                initial_path.display()
            )),
        }
    }

    let mut seen_changes: HashSet<&FileChange> = HashSet::new();
    for scenario in &suite.scenarios {
        for change in scenario.steps.iter().flat_map(|s| s.file_changes()) {
            if !seen_changes.insert(change) {
                continue;
            }
            let path = change.changed_file();
            if !path.exists() {
                problems.push(format!(
                    "Change file for {change} in {} does not exist: {}",
                    scenario.name,
                    path.display()
                ));
            }
        }
    }

    for file in &files {
        warn_unknown_variants(file);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { problems })
    }
}

/// Logs `.benchmark` files that no `TypeOfChange` maps to (usually a typo).
fn warn_unknown_variants(file: &ChangeableFile) {
    let known: HashSet<String> = TypeOfChange::ALL
        .iter()
        .map(|c| c.variant_file_name())
        .chain(std::iter::once(INITIAL_FILE_NAME.to_string()))
        .collect();

    let entries = WalkDir::new(file.change_files_dir())
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok);
    for entry in entries {
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(VARIANT_EXTENSION)
        {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !known.contains(name.as_ref()) {
            tracing::warn!(file = %file, variant = %name, "unrecognized change file");
        }
    }
}
