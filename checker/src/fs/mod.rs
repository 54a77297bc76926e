//! File-system helpers: tree copies, guaranteed removal and the isolated
//! scratch copies that grading runs on.

use path_absolutize::Absolutize;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Folder under the system temp dir that holds all scratch copies.
pub const SCRATCH_ROOT: &str = "homework-checker";

/// Generate a stable unique string for a seed, e.g. a source path.
pub fn unique_str(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_owned()
}

/// Copy a directory tree, creating `to` if needed.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a directory tree if it exists. A missing directory is fine.
pub fn ensure_removed_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to remove directory");
            Err(e)
        }
    }
}

/// Join a `relative` path onto a `base` path and canonicalize the result.
pub fn canonical_join(base: impl AsRef<Path>, relative: impl AsRef<Path>) -> PathBuf {
    base.as_ref()
        .to_owned()
        .join(relative)
        .absolutize()
        .expect("Failed to execute canonical_join on paths")
        .into_owned()
}

/// Expand the path if it is not absolute.
///
/// A leading `~` resolves against `$HOME`; everything else is taken as
/// relative to the current working directory.
pub fn expand_path(input: &Path) -> PathBuf {
    if input.is_absolute() {
        return input.to_owned();
    }
    if let Ok(rest) = input.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    let cwd = std::env::current_dir().expect("current directory is accessible");
    canonical_join(cwd, input)
}

/// A disposable copy of a submission folder.
///
/// The copy lives under [`SCRATCH_ROOT`] with a name derived from the source
/// path, so repeated runs land on the same location while distinct sources
/// never collide. Creation refuses to reuse a live scratch dir; the copy is
/// exclusively owned and removed again when the guard drops.
#[derive(Debug)]
pub struct ScratchCopy {
    path: PathBuf,
}

impl ScratchCopy {
    pub fn create(source: &Path, prefix: Option<&str>) -> io::Result<ScratchCopy> {
        let folder_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("task");
        let unique_hash = unique_str(&source.display().to_string());
        let scratch_name = match prefix {
            Some(prefix) => format!("{}_{}_{}", prefix, folder_name, unique_hash),
            None => format!("{}_{}", folder_name, unique_hash),
        };
        let path = std::env::temp_dir().join(SCRATCH_ROOT).join(scratch_name);
        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "Cannot create scratch copy {:?} as it already exists",
                    path
                ),
            ));
        }
        std::fs::create_dir_all(&path)?;
        // If the copy fails halfway the partial scratch dir must not linger.
        let cleanup = scopeguard::guard(path, |path| {
            let _ = std::fs::remove_dir_all(&path);
        });
        copy_tree(source, &cleanup)?;
        let path = scopeguard::ScopeGuard::into_inner(cleanup);
        Ok(ScratchCopy { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchCopy {
    fn drop(&mut self) {
        let _ = ensure_removed_dir(&self.path);
    }
}
