use std::io;
use std::ops::Range;

use tracing::error;

use crate::pal::CheckpointFile;
use crate::{CheckpointError, Result, TeamMember, ThreadTeam, partition_range};

/// What one or more threads wrote while flushing their checkpoint ranges.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WriteOutcome {
    bytes_written: u64,
    write_calls: u64,
}

impl WriteOutcome {
    /// Total bytes accepted by positional writes.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Number of positional write calls issued, including short ones.
    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.write_calls
    }

    /// Sums two outcomes. Order does not matter.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            bytes_written: self.bytes_written.saturating_add(other.bytes_written),
            write_calls: self.write_calls.saturating_add(other.write_calls),
        }
    }
}

/// Flushes `bytes[range]` to the file at `base_offset + range.start`.
///
/// Short writes are continued from where they stopped until the whole range is on disk.
/// Interrupted calls are reissued. Any other error, and a write that accepts nothing,
/// ends the attempt with an error and no further writes.
pub(crate) fn write_range(
    file: &impl CheckpointFile,
    bytes: &[u8],
    range: Range<usize>,
    base_offset: u64,
    thread: usize,
) -> Result<WriteOutcome> {
    let mut outcome = WriteOutcome::default();
    let mut cursor = range.start;

    while cursor < range.end {
        let offset = base_offset.saturating_add(cursor as u64);

        let remaining = bytes
            .get(cursor..range.end)
            .expect("write range must lie within the checkpoint buffer");

        outcome.write_calls = outcome.write_calls.saturating_add(1);

        match file.write_at(remaining, offset) {
            Ok(0) => {
                error!(thread, offset, "positional write accepted no bytes");
                return Err(CheckpointError::WriteZero { thread, offset });
            }
            Ok(accepted) => {
                cursor = cursor.saturating_add(accepted);
                outcome.bytes_written = outcome.bytes_written.saturating_add(accepted as u64);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => {
                error!(thread, offset, %source, "positional write failed");
                return Err(CheckpointError::Write {
                    thread,
                    offset,
                    source,
                });
            }
        }
    }

    Ok(outcome)
}

/// Flushes the share of `bytes` owned by `member` under the write partition.
pub(crate) fn write_member_range(
    file: &impl CheckpointFile,
    bytes: &[u8],
    base_offset: u64,
    member: TeamMember,
) -> Result<WriteOutcome> {
    let range = partition_range(bytes.len(), member.count(), member.index());

    write_range(file, bytes, range, base_offset, member.index())
}

/// Writes all of `bytes` to `file` at `base_offset`, split across every member of `team`.
///
/// Each member flushes one contiguous, non-overlapping byte range with positional writes.
/// The per-member outcomes are summed into one total.
///
/// # Errors
///
/// Returns the error of the lowest-indexed member that failed. Members that did not fail
/// still finish their ranges.
///
/// # Examples
///
/// ```
/// use checkpoint_bench::{CheckpointFileFacade, ThreadTeam, write_checkpoint};
/// use new_zealand::nz;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let file = CheckpointFileFacade::open(&dir.path().join("checkpoint.bin"))?;
/// let mut team = ThreadTeam::new(nz!(4))?;
///
/// let outcome = write_checkpoint(&mut team, &file, &[7_u8; 1000], 0)?;
///
/// assert_eq!(outcome.bytes_written(), 1000);
/// # Ok(())
/// # }
/// ```
pub fn write_checkpoint(
    team: &mut ThreadTeam,
    file: &impl CheckpointFile,
    bytes: &[u8],
    base_offset: u64,
) -> Result<WriteOutcome> {
    team.execute(|member| write_member_range(file, bytes, base_offset, member))
        .into_iter()
        .try_fold(WriteOutcome::default(), |total, outcome| {
            Ok(total.merge(outcome?))
        })
}
