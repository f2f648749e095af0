use std::marker::PhantomData;
use std::num::NonZero;
use std::ops::Range;
use std::slice;

use crate::config::cell_count;
use crate::{CheckpointError, Result};

/// A dense `N x N` matrix of `f64` cells in one contiguous row-major allocation.
///
/// Row `i` starts at cell offset `i * N` with no padding between rows, so the whole matrix
/// can be viewed as one flat byte range of `N * N * 8` bytes in native endianness. That byte
/// range is exactly what a checkpoint writes to disk.
///
/// # Examples
///
/// ```
/// use checkpoint_bench::Matrix;
/// use new_zealand::nz;
///
/// let mut matrix = Matrix::allocate(nz!(4)).unwrap();
/// matrix.initialize();
///
/// assert_eq!(matrix.row(2), &[0.0, 10.0, 20.0, 30.0]);
/// assert_eq!(matrix.as_bytes().len(), 4 * 4 * 8);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    size: NonZero<usize>,
    cells: Vec<f64>,
}

impl Matrix {
    /// Allocates a zero-filled `size x size` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::SizeOverflow`] if the cell count does not fit in `usize` and
    /// [`CheckpointError::Allocation`] if the memory cannot be reserved. Both are fatal for
    /// the benchmark, which cannot proceed without its working set.
    pub fn allocate(size: NonZero<usize>) -> Result<Self> {
        let cell_count = cell_count(size)?;

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(cell_count)
            .map_err(|_| CheckpointError::Allocation { cells: cell_count })?;
        cells.resize(cell_count, 0.0);

        Ok(Self { size, cells })
    }

    /// Fills every cell with a deterministic starting value: `cell[i][j] = 10 * j`.
    ///
    /// Calling this again without any compute pass in between yields the same values.
    pub fn initialize(&mut self) {
        for row in self.cells.chunks_exact_mut(self.size.get()) {
            for (column, cell) in row.iter_mut().enumerate() {
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "column indexes of any matrix that fits in memory are exact in f64"
                )]
                let column = column as f64;

                *cell = 10.0 * column;
            }
        }
    }

    /// The matrix dimension `N`.
    #[must_use]
    pub fn size(&self) -> NonZero<usize> {
        self.size
    }

    /// Returns row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        self.cells
            .chunks_exact(self.size.get())
            .nth(index)
            .expect("row index out of bounds")
    }

    /// Iterates over the rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.cells.chunks_exact(self.size.get())
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.cells
    }

    /// All cells in row-major order, mutable.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.cells
    }

    /// The raw native-endian bytes of all cells, as written to a checkpoint.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::must_cast_slice(&self.cells)
    }
}

/// A view of a [`Matrix`] that a whole thread team can hold at the same time.
///
/// The view itself does not prevent data races. Callers partition the work so that no two
/// members touch the same rows while mutating, and separate mutation from reading with a
/// barrier. The accessors are `unsafe` to make that obligation visible at every call site.
#[derive(Debug)]
pub(crate) struct SharedMatrix<'a> {
    cells: *mut f64,
    cell_count: usize,
    size: NonZero<usize>,

    _borrow: PhantomData<&'a mut [f64]>,
}

// SAFETY: The pointer comes from an exclusive borrow that outlives the view, and all access
// goes through unsafe accessors whose callers guarantee the absence of data races.
unsafe impl Send for SharedMatrix<'_> {}
// SAFETY: See `Send` above.
unsafe impl Sync for SharedMatrix<'_> {}

impl<'a> SharedMatrix<'a> {
    pub(crate) fn new(matrix: &'a mut Matrix) -> Self {
        let size = matrix.size;
        let cells = matrix.as_mut_slice();

        Self {
            cell_count: cells.len(),
            cells: cells.as_mut_ptr(),
            size,
            _borrow: PhantomData,
        }
    }

    pub(crate) fn size(&self) -> NonZero<usize> {
        self.size
    }

    /// Returns the cells of `rows` for exclusive mutation.
    ///
    /// # Panics
    ///
    /// Panics if the row range is out of bounds.
    ///
    /// # Safety
    ///
    /// While the returned slice is alive, no other thread may read or write any cell
    /// in these rows, including through [`as_bytes()`][Self::as_bytes].
    #[expect(
        clippy::mut_from_ref,
        reason = "disjointness is the caller's documented safety obligation"
    )]
    pub(crate) unsafe fn rows_mut(&self, rows: Range<usize>) -> &mut [f64] {
        let start = rows
            .start
            .checked_mul(self.size.get())
            .expect("row range start out of bounds");
        let end = rows
            .end
            .checked_mul(self.size.get())
            .expect("row range end out of bounds");

        assert!(start <= end && end <= self.cell_count, "row range out of bounds");

        // SAFETY: The range is in bounds of the original allocation (asserted above) and the
        // caller guarantees nobody else accesses these cells while the slice is alive.
        unsafe { slice::from_raw_parts_mut(self.cells.add(start), end.wrapping_sub(start)) }
    }

    /// Returns the raw bytes of the whole matrix for reading.
    ///
    /// # Safety
    ///
    /// While the returned slice is alive, no thread may mutate any cell.
    pub(crate) unsafe fn as_bytes(&self) -> &[u8] {
        // SAFETY: The pointer and length describe the original allocation and the caller
        // guarantees nobody mutates it while the slice is alive.
        let cells = unsafe { slice::from_raw_parts(self.cells.cast_const(), self.cell_count) };

        bytemuck::must_cast_slice(cells)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::float_cmp, reason = "initial values are exact small integers")]

    use new_zealand::nz;

    use super::*;

    #[test]
    fn allocate_is_zeroed_and_contiguous() {
        let matrix = Matrix::allocate(nz!(5)).unwrap();

        assert_eq!(matrix.size().get(), 5);
        assert_eq!(matrix.as_slice().len(), 25);
        assert_eq!(matrix.as_bytes().len(), 200);
        assert!(matrix.as_slice().iter().all(|cell| *cell == 0.0));
    }

    #[test]
    fn initialize_depends_only_on_column() {
        let mut matrix = Matrix::allocate(nz!(3)).unwrap();
        matrix.initialize();

        for row in matrix.rows() {
            assert_eq!(row, &[0.0, 10.0, 20.0]);
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut matrix = Matrix::allocate(nz!(6)).unwrap();
        matrix.initialize();
        let first = matrix.clone();

        matrix.initialize();

        assert_eq!(matrix, first);
    }

    #[test]
    fn rows_are_offsets_into_one_allocation() {
        let mut matrix = Matrix::allocate(nz!(4)).unwrap();
        matrix.initialize();

        let base = matrix.as_slice().as_ptr();

        for (index, row) in matrix.rows().enumerate() {
            assert_eq!(row.as_ptr(), base.wrapping_add(index * 4));
        }
    }

    #[test]
    fn bytes_are_native_endian_cells() {
        let mut matrix = Matrix::allocate(nz!(2)).unwrap();
        matrix.initialize();

        let bytes = matrix.as_bytes();

        assert_eq!(&bytes[8..16], &10.0_f64.to_ne_bytes());
    }

    #[test]
    fn allocate_overflow_is_error() {
        assert!(matches!(
            Matrix::allocate(NonZero::new(usize::MAX).unwrap()),
            Err(CheckpointError::SizeOverflow { .. })
        ));
    }

    #[test]
    fn shared_rows_mut_writes_through() {
        let mut matrix = Matrix::allocate(nz!(3)).unwrap();

        {
            let shared = SharedMatrix::new(&mut matrix);

            // SAFETY: Single-threaded test, nothing else touches the matrix.
            let rows = unsafe { shared.rows_mut(1..2) };
            rows.fill(7.0);
        }

        assert_eq!(matrix.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(matrix.row(1), &[7.0, 7.0, 7.0]);
        assert_eq!(matrix.row(2), &[0.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn shared_rows_mut_out_of_bounds_panics() {
        let mut matrix = Matrix::allocate(nz!(3)).unwrap();
        let shared = SharedMatrix::new(&mut matrix);

        // SAFETY: Single-threaded test, nothing else touches the matrix.
        _ = unsafe { shared.rows_mut(2..4) };
    }
}
