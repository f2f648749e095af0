use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockCheckpointFile;
use crate::pal::{BuildTargetCheckpointFile, CheckpointFile};

/// Checkpoint file handle shared by the whole thread team.
///
/// Dispatches to the real file in production. In test builds it can also wrap a mock,
/// which lets tests inject short writes and write failures.
#[derive(Clone)]
pub enum CheckpointFileFacade {
    /// Real file on disk.
    Target(Arc<BuildTargetCheckpointFile>),

    /// Mock file for testing.
    #[cfg(test)]
    Mock(Arc<MockCheckpointFile>),
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl fmt::Debug for CheckpointFileFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(file) => f.debug_tuple("Target").field(file).finish(),
            #[cfg(test)]
            Self::Mock(_) => f.debug_struct("Mock").finish_non_exhaustive(),
        }
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl CheckpointFileFacade {
    /// Opens (creating if needed) the checkpoint file at `path` on the real filesystem.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the file cannot be opened or created.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::Target(Arc::new(BuildTargetCheckpointFile::open(
            path,
        )?)))
    }

    /// Wraps a mock file (test builds only).
    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockCheckpointFile) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl CheckpointFile for CheckpointFileFacade {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        match self {
            Self::Target(file) => file.write_at(buf, offset),
            #[cfg(test)]
            Self::Mock(mock) => mock.write_at(buf, offset),
        }
    }

    fn len(&self) -> io::Result<u64> {
        match self {
            Self::Target(file) => file.len(),
            #[cfg(test)]
            Self::Mock(mock) => mock.len(),
        }
    }
}
