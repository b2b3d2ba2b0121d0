//! Working-tree mutation and rollback.
//!
//! Changes are applied by overwriting target files with pre-recorded variants.
//! The applier remembers the pre-scenario bytes of every file it touches so it
//! can restore them, and keeps a single undo record for `RevertLast` steps.

use crate::error::ChangeError;
use crate::suite::{ChangeableFile, FileChange, Step};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn read(path: &Path) -> Result<Vec<u8>, ChangeError> {
    fs::read(path).map_err(|source| ChangeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, content: &[u8]) -> Result<(), ChangeError> {
    fs::write(path, content).map_err(|source| ChangeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug)]
struct AppliedFile {
    original: Vec<u8>,
    /// Digest of the content this applier last wrote.
    written: [u8; 32],
}

#[derive(Debug)]
pub struct ChangesApplier {
    project_root: PathBuf,
    applied: BTreeMap<PathBuf, AppliedFile>,
    last_step: Option<Vec<(PathBuf, Vec<u8>)>>,
}

impl ChangesApplier {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            applied: BTreeMap::new(),
            last_step: None,
        }
    }

    pub fn has_applied_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Absolute paths of the files that currently deviate from their pre-scenario content.
    pub fn applied_files(&self) -> impl Iterator<Item = &Path> {
        self.applied.keys().map(PathBuf::as_path)
    }

    pub fn apply_step_changes(&mut self, step: &Step) -> Result<(), ChangeError> {
        match step {
            Step::Apply { file_changes, .. } => self.apply_file_changes(file_changes),
            Step::RevertLast { .. } => self.revert_last_step(),
        }
    }

    fn resolve_target(&self, file: &ChangeableFile) -> Result<PathBuf, ChangeError> {
        let target = file
            .target_file()
            .map_err(|source| ChangeError::UnresolvedTarget {
                file: file.name().to_string(),
                source,
            })?;
        Ok(self.project_root.join(target))
    }

    fn apply_file_changes(&mut self, changes: &[FileChange]) -> Result<(), ChangeError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut undo = Vec::new();
        let result = changes
            .iter()
            .try_for_each(|change| self.apply_file_change(change, &mut undo));
        // Kept even when a change failed: the files already written must stay revertible.
        self.last_step = Some(undo);
        result
    }

    fn apply_file_change(
        &mut self,
        change: &FileChange,
        undo: &mut Vec<(PathBuf, Vec<u8>)>,
    ) -> Result<(), ChangeError> {
        let target = self.resolve_target(&change.changeable_file)?;
        let source = change.changed_file();
        if !source.is_file() {
            return Err(ChangeError::MissingChangeFile {
                change: change.to_string(),
                path: source,
            });
        }
        let content = read(&source)?;
        let current = read(&target)?;

        if !undo.iter().any(|(path, _)| path == &target) {
            undo.push((target.clone(), current.clone()));
        }
        let written = sha256(&current);
        let entry = self
            .applied
            .entry(target.clone())
            .or_insert(AppliedFile {
                original: current,
                written,
            });

        write(&target, &content)?;
        entry.written = sha256(&content);
        tracing::debug!(change = %change, file = %target.display(), "applied file change");
        Ok(())
    }

    fn revert_last_step(&mut self) -> Result<(), ChangeError> {
        let undo = self.last_step.take().ok_or(ChangeError::NothingToRevert)?;
        for (path, content) in undo {
            write(&path, &content)?;
            if let Some(entry) = self.applied.get_mut(&path) {
                entry.written = sha256(&content);
            }
            tracing::debug!(file = %path.display(), "reverted last step change");
        }
        Ok(())
    }

    /// Restore every touched file to its pre-scenario content.
    ///
    /// Safe to call when nothing is applied. Files that cannot be restored stay
    /// recorded and the first error is returned.
    pub fn revert_applied_changes(&mut self) -> Result<(), ChangeError> {
        self.last_step = None;
        let mut first_error = None;

        for (path, file) in mem::take(&mut self.applied) {
            if let Ok(current) = fs::read(&path) {
                if sha256(&current) != file.written {
                    tracing::warn!(
                        file = %path.display(),
                        "file was modified outside of the benchmark run; restoring it anyway"
                    );
                }
            }

            match fs::write(&path, &file.original) {
                Ok(()) => tracing::debug!(file = %path.display(), "restored original content"),
                Err(source) => {
                    tracing::error!(file = %path.display(), error = %source, "could not restore file");
                    if first_error.is_none() {
                        first_error = Some(ChangeError::Io {
                            path: path.clone(),
                            source,
                        });
                    }
                    self.applied.insert(path, file);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
