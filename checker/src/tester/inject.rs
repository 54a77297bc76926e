//! Overlaying external folders onto a working copy, with guaranteed
//! restoration of whatever was there before.

use super::CheckError;
use crate::config::InjectionSpec;
use crate::fs::{canonical_join, copy_tree};
use std::path::{Path, PathBuf};

/// Name of the folder that keeps displaced content while an injection is
/// live.
pub const BACKUP_FOLDER: &str = ".backup";

/// A batch of live folder injections on one working copy.
///
/// Destinations that already existed are moved into a backup area first, so
/// several distinct destinations can be overlaid at the same time. Reverting
/// deletes the injected folders (including any modifications a test made to
/// them), restores the backups and removes the backup area, leaving the
/// working copy byte-identical to before.
///
/// [`revert`](Self::revert) is the checked path; dropping an unreverted set
/// restores as much as possible and logs anything it could not undo.
#[derive(Debug)]
pub struct InjectionSet {
    work_dir: PathBuf,
    backup_dir: PathBuf,
    injected: Vec<PathBuf>,
    reverted: bool,
}

impl InjectionSet {
    /// Apply all `specs` in order. Sources are resolved against `job_root`,
    /// destinations against `work_dir`. If one spec fails, the ones already
    /// applied are unwound before the error is returned.
    pub fn apply(
        work_dir: &Path,
        job_root: &Path,
        specs: &[InjectionSpec],
    ) -> Result<InjectionSet, CheckError> {
        let mut set = InjectionSet {
            work_dir: work_dir.to_owned(),
            backup_dir: work_dir.join(BACKUP_FOLDER),
            injected: Vec::new(),
            reverted: false,
        };
        for spec in specs {
            if let Err(e) = set.inject_one(job_root, spec) {
                set.reverted = true;
                if let Err(undo) = set.revert_inner() {
                    tracing::warn!(error = %undo, "Failed to unwind partial injections");
                }
                return Err(e);
            }
        }
        Ok(set)
    }

    fn inject_one(&mut self, job_root: &Path, spec: &InjectionSpec) -> Result<(), CheckError> {
        let source = canonical_join(job_root, &spec.source);
        if !source.is_dir() {
            return Err(CheckError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Injection source {:?} does not exist", source),
            )));
        }
        let destination = self.work_dir.join(&spec.destination);
        if destination.exists() {
            // Move the existing data out of the way before overlaying.
            let backup = self.backup_dir.join(&spec.destination);
            if let Some(parent) = backup.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&destination, &backup)?;
        }
        copy_tree(&source, &destination)?;
        self.injected.push(spec.destination.clone());
        Ok(())
    }

    /// Undo every injection and remove the backup area.
    pub fn revert(mut self) -> Result<(), CheckError> {
        self.reverted = true;
        self.revert_inner()
    }

    fn revert_inner(&mut self) -> Result<(), CheckError> {
        let mut first_error = None;
        for destination in std::mem::take(&mut self.injected).into_iter().rev() {
            if let Err(e) = self.revert_one(&destination) {
                tracing::warn!(
                    destination = %destination.display(),
                    error = %e,
                    "Failed to revert injection"
                );
                first_error.get_or_insert(e);
            }
        }
        remove_empty_tree(&self.backup_dir);
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    fn revert_one(&self, destination: &Path) -> Result<(), CheckError> {
        let injected = self.work_dir.join(destination);
        if injected.is_dir() {
            std::fs::remove_dir_all(&injected)?;
        }
        let backup = self.backup_dir.join(destination);
        if backup.is_dir() {
            // There was original content; put it back.
            std::fs::rename(&backup, &injected)?;
        }
        Ok(())
    }
}

impl Drop for InjectionSet {
    fn drop(&mut self) {
        if self.reverted {
            return;
        }
        if let Err(e) = self.revert_inner() {
            tracing::warn!(error = %e, "Injections were not fully reverted");
        }
    }
}

/// Remove a directory tree that is expected to contain only empty folders.
/// Anything still holding content is deliberately left behind.
fn remove_empty_tree(dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            remove_empty_tree(&entry.path());
        }
    }
    let _ = std::fs::remove_dir(dir);
}
