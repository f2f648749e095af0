use std::mem;
use std::num::NonZero;
use std::path::{Path, PathBuf};

use new_zealand::nz;

use crate::{CheckpointError, Result};

/// Matrix dimension used when the caller does not choose one.
pub const DEFAULT_MATRIX_SIZE: NonZero<usize> = nz!(360);

/// Checkpoint file used when the caller does not choose one, relative to the working directory.
pub const DEFAULT_CHECKPOINT_PATH: &str = "matrix.out";

/// Parameters of one benchmark run.
///
/// # Examples
///
/// ```
/// use checkpoint_bench::BenchConfig;
/// use new_zealand::nz;
///
/// let config = BenchConfig::new(nz!(4), nz!(10)).with_matrix_size(nz!(64));
///
/// assert_eq!(config.checkpoint_len().unwrap(), 64 * 64 * 8);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BenchConfig {
    threads: NonZero<usize>,
    iterations: NonZero<u64>,
    matrix_size: NonZero<usize>,
    checkpoint_path: PathBuf,
}

impl BenchConfig {
    /// Creates a configuration with the default matrix size and checkpoint path.
    #[must_use]
    pub fn new(threads: NonZero<usize>, iterations: NonZero<u64>) -> Self {
        Self {
            threads,
            iterations,
            matrix_size: DEFAULT_MATRIX_SIZE,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
        }
    }

    /// Overrides the matrix dimension `N`. The matrix has `N * N` cells.
    #[must_use]
    pub fn with_matrix_size(mut self, matrix_size: NonZero<usize>) -> Self {
        self.matrix_size = matrix_size;
        self
    }

    /// Overrides the path of the checkpoint file.
    #[must_use]
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    /// Size of the thread team.
    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    /// Number of compute + checkpoint passes.
    #[must_use]
    pub fn iterations(&self) -> NonZero<u64> {
        self.iterations
    }

    /// The matrix dimension `N`.
    #[must_use]
    pub fn matrix_size(&self) -> NonZero<usize> {
        self.matrix_size
    }

    /// Path of the checkpoint file.
    #[must_use]
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Number of bytes in one full checkpoint, `N * N * size_of::<f64>()`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::SizeOverflow`] if the byte count does not fit in `usize`.
    pub fn checkpoint_len(&self) -> Result<usize> {
        checkpoint_len(self.matrix_size)
    }
}

pub(crate) fn cell_count(matrix_size: NonZero<usize>) -> Result<usize> {
    matrix_size
        .get()
        .checked_mul(matrix_size.get())
        .ok_or(CheckpointError::SizeOverflow {
            matrix_size: matrix_size.get(),
        })
}

pub(crate) fn checkpoint_len(matrix_size: NonZero<usize>) -> Result<usize> {
    cell_count(matrix_size)?
        .checked_mul(mem::size_of::<f64>())
        .ok_or(CheckpointError::SizeOverflow {
            matrix_size: matrix_size.get(),
        })
}
