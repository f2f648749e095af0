#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Measures what it costs to checkpoint a large in-memory matrix while a parallel kernel
//! keeps mutating it.
//!
//! Every iteration of a run has two phases, both executed by the same fixed [`ThreadTeam`]:
//!
//! 1. **Compute**: each team member applies a [`Kernel`] to its share of the matrix rows.
//! 2. **Checkpoint**: each team member writes its share of the matrix bytes to one file with
//!    positional writes, so the whole file is overwritten from offset 0.
//!
//! Barriers separate the phases. The checkpoint of iteration `k` starts only after the whole
//! compute pass of `k` is done, and the compute pass of `k + 1` starts only after the whole
//! checkpoint of `k` is on disk. Each member times its checkpoint phases and the per-member
//! counters are reduced into [`RunStatistics`] at the end of the run.
//!
//! # Example
//!
//! ```
//! use checkpoint_bench::{BenchConfig, Matrix, run};
//! use new_zealand::nz;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//!
//! let config = BenchConfig::new(nz!(2), nz!(3))
//!     .with_matrix_size(nz!(16))
//!     .with_checkpoint_path(dir.path().join("matrix.out"));
//!
//! let mut matrix = Matrix::allocate(config.matrix_size())?;
//! matrix.initialize();
//!
//! let statistics = run(&config, &mut matrix)?;
//!
//! assert_eq!(statistics.bytes_written(), 3 * 16 * 16 * 8);
//! # Ok(())
//! # }
//! ```
//!
//! The `checkpoint_bench` binary wraps this in a command line tool that prints a summary
//! of runtime, I/O time, throughput and write operations per second.

mod config;
mod coordinator;
mod error;
mod kernel;
mod logging;
mod matrix;
mod pal;
mod partition;
mod stats;
mod team;
mod writer;

pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use kernel::*;
pub use logging::*;
pub use matrix::Matrix;
pub use pal::*;
pub use partition::*;
pub use stats::*;
pub use team::*;
pub use writer::*;
