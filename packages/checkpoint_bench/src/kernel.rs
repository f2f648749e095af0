use crate::matrix::SharedMatrix;
use crate::{Matrix, TeamMember, partition_range};

/// How many times the transform is applied to each cell in one compute pass.
pub const SUB_STEPS: u32 = 4;

/// An elementwise transform applied to every matrix cell in each compute pass.
///
/// The transform must be pure: the new value of a cell depends only on its old value, the
/// 1-based iteration index and the 1-based sub-step. Cells have no dependencies on each other,
/// so any row-disjoint split of the matrix across threads yields the same end state.
///
/// Closures with the matching signature implement this trait.
///
/// # Examples
///
/// ```
/// use checkpoint_bench::Kernel;
///
/// let double = |cell: f64, _iteration: u64, _step: u32| cell * 2.0;
///
/// assert_eq!(double.transform(1.5, 1, 1), 3.0);
/// ```
pub trait Kernel: Sync {
    /// Returns the new value of a cell.
    fn transform(&self, cell: f64, iteration: u64, step: u32) -> f64;
}

impl<F> Kernel for F
where
    F: Fn(f64, u64, u32) -> f64 + Sync,
{
    fn transform(&self, cell: f64, iteration: u64, step: u32) -> f64 {
        self(cell, iteration, step)
    }
}

/// The trigonometric benchmark kernel:
/// `cos(x) * sin(x) * sqrt(x) / tan(x) / ln(x) * iteration * step`.
///
/// Cells at poles or outside the domain (zero, negative values) produce NaN or infinity,
/// which propagate silently.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrigKernel;

impl Kernel for TrigKernel {
    #[expect(
        clippy::cast_precision_loss,
        reason = "iteration counts beyond 2^52 are not a realistic benchmark input"
    )]
    fn transform(&self, cell: f64, iteration: u64, step: u32) -> f64 {
        cell.cos() * cell.sin() * cell.sqrt() / cell.tan() / cell.ln()
            * iteration as f64
            * f64::from(step)
    }
}

/// Applies all sub-steps of `iteration` to every cell of `cells`.
pub(crate) fn transform_cells(kernel: &impl Kernel, cells: &mut [f64], iteration: u64) {
    for cell in cells {
        for step in 1..=SUB_STEPS {
            *cell = kernel.transform(*cell, iteration, step);
        }
    }
}

/// Runs one compute pass over the rows owned by `member`.
///
/// # Safety
///
/// Every other thread accessing `matrix` at the same time must be a different member of the
/// same team running this function for the same pass, so that row ranges are disjoint.
pub(crate) unsafe fn compute_member_rows(
    kernel: &impl Kernel,
    matrix: &SharedMatrix<'_>,
    member: TeamMember,
    iteration: u64,
) {
    let rows = partition_range(matrix.size().get(), member.count(), member.index());

    // SAFETY: Members of one team get disjoint row ranges and the caller guarantees that
    // nobody outside the team touches the matrix during the pass.
    let cells = unsafe { matrix.rows_mut(rows) };

    transform_cells(kernel, cells, iteration);
}

/// Runs one compute pass over the whole matrix on the current thread.
///
/// Produces the same end state as a pass split across a thread team.
pub fn compute_pass(kernel: &impl Kernel, matrix: &mut Matrix, iteration: u64) {
    transform_cells(kernel, matrix.as_mut_slice(), iteration);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::float_cmp, reason = "test kernels produce exact values")]

    use new_zealand::nz;

    use super::*;
    use crate::ThreadTeam;

    #[test]
    fn sub_steps_run_in_order() {
        let kernel = |cell: f64, iteration: u64, step: u32| {
            cell * 10.0 + f64::from(step) + f64::from(u32::try_from(iteration).unwrap()) * 100.0
        };
        let mut cells = [0.0];

        transform_cells(&kernel, &mut cells, 0);

        assert_eq!(cells[0], 1234.0);
    }

    #[test]
    fn trig_kernel_matches_formula() {
        let x = 2.0_f64;
        let expected = x.cos() * x.sin() * x.sqrt() / x.tan() / x.ln() * 3.0 * 2.0;

        assert_eq!(TrigKernel.transform(x, 3, 2), expected);
    }

    #[test]
    fn trig_kernel_propagates_nan_at_zero() {
        assert!(TrigKernel.transform(0.0, 1, 1).is_nan());
    }

    #[test]
    fn team_pass_matches_sequential_pass() {
        let mut expected = Matrix::allocate(nz!(7)).unwrap();
        expected.initialize();
        let mut actual = expected.clone();

        compute_pass(&TrigKernel, &mut expected, 1);

        let mut team = ThreadTeam::new(nz!(3)).unwrap();
        let shared = SharedMatrix::new(&mut actual);

        team.execute(|member| {
            // SAFETY: Every member runs the same pass, nothing else touches the matrix.
            unsafe {
                compute_member_rows(&TrigKernel, &shared, member, 1);
            }
        });

        drop(shared);

        // NaN != NaN, so compare bit patterns.
        assert_eq!(actual.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn more_members_than_rows() {
        let mut matrix = Matrix::allocate(nz!(2)).unwrap();
        matrix.initialize();

        let mut team = ThreadTeam::new(nz!(4)).unwrap();
        let shared = SharedMatrix::new(&mut matrix);
        let add_one = |cell: f64, _: u64, _: u32| cell + 1.0;

        team.execute(|member| {
            // SAFETY: Every member runs the same pass, nothing else touches the matrix.
            unsafe {
                compute_member_rows(&add_one, &shared, member, 1);
            }
        });

        drop(shared);

        assert_eq!(matrix.row(0), &[4.0, 14.0]);
        assert_eq!(matrix.row(1), &[4.0, 14.0]);
    }
}
