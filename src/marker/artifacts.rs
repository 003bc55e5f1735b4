use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

static NEXT_ARTIFACT: AtomicU64 = AtomicU64::new(0);

/// Delete a file if it is there. Returns whether something was removed.
pub fn remove_if_exists(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Intermediate files of one marker run
///
/// Every tracked path is deleted on `cleanup` and again on drop, so no
/// exit path leaves them behind.
#[derive(Debug)]
pub struct TempArtifacts {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            paths: Vec::new(),
        }
    }

    /// Reserve a fresh path in the work directory and track it
    pub fn allocate(&mut self, stem: &str, extension: &str) -> PathBuf {
        let n = NEXT_ARTIFACT.fetch_add(1, Ordering::Relaxed);
        let name = format!(".frame-scout-{}-{}-{}.{}", std::process::id(), n, stem, extension);
        let path = self.dir.join(name);
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn cleanup(&self) {
        for path in &self.paths {
            remove_if_exists(path);
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}
