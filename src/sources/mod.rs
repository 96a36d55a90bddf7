//! Readers for the kernel's textual counter sources.
//!
//! Every read is a fresh, uncached read of the whole file so that the counters
//! reflect the instant of sampling. There are no retries and no timeouts: a
//! read that blocks holds up the sampling cycle.

#[cfg(feature = "test-utils")]
pub mod test_utils;

use crate::core::{CollectError, FileSystem};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Default mount point of procfs.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// The well-known files under the proc root that collectors read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    MemInfo,
    Stat,
    DiskStats,
    NetDev,
}

impl SourceKind {
    /// Path of the source relative to the proc root.
    pub fn relative_path(&self) -> &'static str {
        match self {
            SourceKind::MemInfo => "meminfo",
            SourceKind::Stat => "stat",
            SourceKind::DiskStats => "diskstats",
            SourceKind::NetDev => "net/dev",
        }
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Resolves [`SourceKind`]s under a proc root and reads them.
#[derive(Clone)]
pub struct ProcSource {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl std::fmt::Debug for ProcSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcSource")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl ProcSource {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// A source reading the host's real `/proc`.
    pub fn host() -> Self {
        Self::new(Arc::new(RealFs::new()), DEFAULT_PROC_ROOT)
    }

    pub fn path_of(&self, kind: SourceKind) -> PathBuf {
        self.root.join(kind.relative_path())
    }

    /// Reads the full text of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::SourceUnavailable`] when the file is missing,
    /// unreadable, or not valid UTF-8.
    pub fn read(&self, kind: SourceKind) -> Result<String, CollectError> {
        let path = self.path_of(kind);
        match self.fs.read_to_string(&path) {
            Ok(text) => {
                trace!(path = %path.display(), bytes = text.len(), "Read source");
                Ok(text)
            }
            Err(source) => Err(CollectError::SourceUnavailable { path, source }),
        }
    }
}
