use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::pal::CheckpointFile;

/// Permission bits for a newly created checkpoint: owner read/write, group and others read.
#[cfg(unix)]
const CHECKPOINT_MODE: u32 = 0o644;

/// A checkpoint file on the real filesystem.
#[derive(Debug)]
pub struct BuildTargetCheckpointFile {
    file: File,
}

impl BuildTargetCheckpointFile {
    /// Opens `path` for reading and writing, creating it if it does not exist.
    ///
    /// An existing file is neither truncated nor resized; checkpoints overwrite it in place.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the file cannot be opened or created.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(CHECKPOINT_MODE);
        }

        Ok(Self {
            file: options.open(path)?,
        })
    }
}

// Trivial forwarder to system APIs - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl CheckpointFile for BuildTargetCheckpointFile {
    #[cfg(unix)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(&self.file, buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        // Unlike pwrite, this moves the file cursor. Nothing in this crate relies on the cursor.
        std::os::windows::fs::FileExt::seek_write(&self.file, buf, offset)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
