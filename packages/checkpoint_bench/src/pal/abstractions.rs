use std::fmt::Debug;
use std::io;

/// Positional access to a checkpoint file.
///
/// Positional writes carry their own file offset and do not move a shared cursor, so many
/// threads can write disjoint ranges of the same file at the same time without locking.
#[cfg_attr(test, mockall::automock)]
pub trait CheckpointFile: Debug + Send + Sync + 'static {
    /// Issues one positional write of `buf` at `offset`.
    ///
    /// Like the operating system call it wraps, this may accept fewer bytes than offered.
    /// Returns the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the write failed.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Returns the current length of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the file metadata cannot be read.
    fn len(&self) -> io::Result<u64>;
}
