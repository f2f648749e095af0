use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a checkpoint benchmark run.
///
/// Every variant is fatal: the run stops, and the binary reports the error and exits
/// with a failure status. There is no degraded mode that skips a checkpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CheckpointError {
    /// Storage for the matrix could not be reserved.
    #[error("allocating matrix failed: could not reserve {cells} cells")]
    Allocation {
        /// How many `f64` cells were requested.
        cells: usize,
    },

    /// The matrix dimension is so large that its cell or byte count overflows `usize`.
    #[error("matrix size {matrix_size} is too large to address in memory")]
    SizeOverflow {
        /// The requested matrix dimension.
        matrix_size: usize,
    },

    /// The operating system refused to start a thread of the team.
    #[error("could not start team thread {index} of {threads}: {source}")]
    Spawn {
        /// Index of the thread that could not be started.
        index: usize,

        /// Size of the requested team.
        threads: usize,

        /// The underlying operating system error.
        source: io::Error,
    },

    /// The checkpoint file could not be opened or created.
    #[error("could not open checkpoint '{}': {source}", path.display())]
    Open {
        /// Path of the checkpoint file.
        path: PathBuf,

        /// The underlying operating system error.
        source: io::Error,
    },

    /// A positional write to the checkpoint file failed.
    #[error("cannot write to checkpoint at offset {offset} (thread {thread}): {source}")]
    Write {
        /// Index of the team member that issued the write.
        thread: usize,

        /// File offset at which the failed write started.
        offset: u64,

        /// The underlying operating system error.
        source: io::Error,
    },

    /// A positional write accepted zero bytes even though data remained in the range.
    #[error("cannot write to checkpoint at offset {offset} (thread {thread}): no bytes accepted")]
    WriteZero {
        /// Index of the team member that issued the write.
        thread: usize,

        /// File offset at which the write was attempted.
        offset: u64,
    },
}

/// A specialized `Result` type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
