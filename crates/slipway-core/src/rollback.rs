//! Rollback bookkeeping for local filesystem mutations
//!
//! Every file the pipeline rewrites is snapshotted here first. If a phase
//! fails before the point of no return, the ledger is replayed in reverse:
//! restore backups, delete created files, remove created directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Outcome of a single rollback entry.
#[derive(Debug)]
pub enum RollbackStep {
    Restored(PathBuf),
    Deleted(PathBuf),
    RemovedDir(PathBuf),
    Failed(PathBuf, std::io::Error),
}

/// Summary of a completed rollback pass.
#[derive(Debug, Default)]
pub struct RollbackReport {
    pub steps: Vec<RollbackStep>,
}

impl RollbackReport {
    /// Number of entries that could not be undone.
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, RollbackStep::Failed(..)))
            .count()
    }
}

/// Tracks reversible local mutations for a single run.
///
/// The ledger is created empty at run start, populated as mutations occur,
/// and consumed exactly once by a terminal rollback or discarded on success.
/// It is never reused across runs.
#[derive(Debug, Default)]
pub struct RollbackManager {
    backed_up: HashMap<PathBuf, String>,
    created_files: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a file's contents before the first modification. A path is
    /// backed up at most once: restoring to the first captured state is the
    /// correct undo target, so later calls for the same path are no-ops.
    /// Missing paths are also no-ops.
    pub fn backup(&mut self, path: &Path) -> std::io::Result<()> {
        if !path.exists() || self.backed_up.contains_key(path) {
            return Ok(());
        }
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "backed up file");
        self.backed_up.insert(path.to_path_buf(), content);
        Ok(())
    }

    /// Record a newly created file for deletion on rollback.
    pub fn track_created(&mut self, path: &Path) {
        self.created_files.push(path.to_path_buf());
    }

    /// Record a newly created directory for recursive removal on rollback.
    pub fn track_created_dir(&mut self, path: &Path) {
        self.created_dirs.push(path.to_path_buf());
    }

    /// True if nothing has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.backed_up.is_empty() && self.created_files.is_empty() && self.created_dirs.is_empty()
    }

    /// Undo all tracked mutations, best effort. A failure on one entry is
    /// recorded and the remaining entries are still attempted; all three
    /// phases always run.
    pub fn rollback(&mut self) -> RollbackReport {
        let mut report = RollbackReport::default();

        for (path, content) in self.backed_up.drain() {
            match std::fs::write(&path, content) {
                Ok(()) => report.steps.push(RollbackStep::Restored(path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to restore file");
                    report.steps.push(RollbackStep::Failed(path, e));
                }
            }
        }

        for path in self.created_files.drain(..) {
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => report.steps.push(RollbackStep::Deleted(path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to delete file");
                    report.steps.push(RollbackStep::Failed(path, e));
                }
            }
        }

        for path in self.created_dirs.drain(..) {
            if !path.exists() {
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => report.steps.push(RollbackStep::RemovedDir(path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove directory");
                    report.steps.push(RollbackStep::Failed(path, e));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_backup_wins() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("project.pbxproj");
        std::fs::write(&file, "original").unwrap();

        let mut manager = RollbackManager::new();
        manager.backup(&file).unwrap();

        // Mutate, back up again (no-op), mutate again
        std::fs::write(&file, "first edit").unwrap();
        manager.backup(&file).unwrap();
        std::fs::write(&file, "second edit").unwrap();

        let report = manager.rollback();
        assert_eq!(report.failures(), 0);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
    }

    #[test]
    fn test_backup_missing_path_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut manager = RollbackManager::new();
        manager.backup(&temp.path().join("absent")).unwrap();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_created_files_and_dirs_removed() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("ExportOptions.plist");
        let dir = temp.path().join("dmg_contents");
        std::fs::write(&file, "plist").unwrap();
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("nested"), "x").unwrap();

        let mut manager = RollbackManager::new();
        manager.track_created(&file);
        manager.track_created_dir(&dir);

        let report = manager.rollback();
        assert_eq!(report.failures(), 0);
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_already_deleted_entries_are_skipped() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("gone");

        let mut manager = RollbackManager::new();
        manager.track_created(&file);
        manager.track_created_dir(&temp.path().join("gone-dir"));

        let report = manager.rollback();
        assert_eq!(report.failures(), 0);
        assert!(report.steps.is_empty());
    }

    #[test]
    fn test_rollback_consumes_ledger() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        std::fs::write(&file, "v1").unwrap();

        let mut manager = RollbackManager::new();
        manager.backup(&file).unwrap();
        std::fs::write(&file, "v2").unwrap();
        manager.rollback();

        // Second rollback finds an empty ledger and does nothing
        std::fs::write(&file, "v3").unwrap();
        let report = manager.rollback();
        assert!(report.steps.is_empty());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "v3");
    }
}
