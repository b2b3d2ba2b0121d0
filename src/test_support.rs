//! Project + change-files fixtures shared by unit tests.

use crate::suite::{ChangeableFile, TypeOfChange, INITIAL_FILE_NAME, TARGET_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct Fixture {
    _dir: TempDir,
    pub project: PathBuf,
    pub change_files: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        let change_files = dir.path().join("change-files");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&change_files).unwrap();
        Self {
            _dir: dir,
            project,
            change_files,
        }
    }

    /// Creates the live target (with `initial` content), the `_initial.benchmark`
    /// snapshot, `_target-file.txt` and one file per variant.
    pub fn changeable_file(
        &self,
        name: &str,
        target: &str,
        initial: &str,
        variants: &[(TypeOfChange, &str)],
    ) -> ChangeableFile {
        let file = ChangeableFile::new(&self.change_files, name);
        let dir = file.change_files_dir();
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(TARGET_FILE_NAME), format!("{target}\n")).unwrap();
        fs::write(dir.join(INITIAL_FILE_NAME), initial).unwrap();
        for (change, content) in variants {
            fs::write(file.changed_file(*change), content).unwrap();
        }

        let target_path = self.project.join(target);
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(target_path, initial).unwrap();
        file
    }

    pub fn target_path(&self, target: &str) -> PathBuf {
        self.project.join(target)
    }

    pub fn read(&self, target: &str) -> String {
        fs::read_to_string(self.target_path(target)).unwrap()
    }

    pub fn write(&self, target: &str, content: &str) {
        fs::write(self.target_path(target), content).unwrap();
    }

    pub fn project(&self) -> &Path {
        &self.project
    }
}
