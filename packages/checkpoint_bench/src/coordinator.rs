use std::num::NonZero;
use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use crate::kernel::compute_member_rows;
use crate::matrix::SharedMatrix;
use crate::pal::{CheckpointFile, CheckpointFileFacade};
use crate::writer::write_member_range;
use crate::{
    BenchConfig, CheckpointError, Kernel, Matrix, Result, RunStatistics, TeamMember, ThreadIoStats,
    ThreadTeam, TrigKernel,
};

/// Runs the benchmark with the trigonometric kernel.
///
/// See [`run_with_kernel()`] for details.
///
/// # Errors
///
/// Returns an error if the checkpoint file cannot be opened, the thread team cannot be
/// started, or any checkpoint write fails.
///
/// # Panics
///
/// Panics if the size of `matrix` differs from the configured matrix size.
pub fn run(config: &BenchConfig, matrix: &mut Matrix) -> Result<RunStatistics> {
    run_with_kernel(config, matrix, &TrigKernel)
}

/// Runs the benchmark: every iteration transforms `matrix` in parallel and then checkpoints
/// all of it to the configured file, overwriting the file from offset 0.
///
/// The checkpoint file is opened (and created if absent) once before the first iteration and
/// closed when the run ends. A team of [`BenchConfig::threads()`] threads is spawned once and
/// executes both phases of every iteration:
///
/// 1. Each member transforms its share of the rows.
/// 2. All members wait until the whole compute pass is done.
/// 3. Each member writes its share of the checkpoint bytes.
/// 4. All members wait until the whole checkpoint is written, so the next compute pass never
///    mutates the buffer while it is still being written.
///
/// Each member measures the time from step 2 to the end of step 4 as its I/O time.
///
/// # Errors
///
/// Returns an error if the checkpoint file cannot be opened, the thread team cannot be
/// started, or any checkpoint write fails. A failed write stops the whole team after the current checkpoint, before the next compute
/// pass, so no later checkpoint is issued.
///
/// # Panics
///
/// Panics if the size of `matrix` differs from the configured matrix size.
pub fn run_with_kernel(
    config: &BenchConfig,
    matrix: &mut Matrix,
    kernel: &impl Kernel,
) -> Result<RunStatistics> {
    assert_eq!(
        matrix.size(),
        config.matrix_size(),
        "matrix must be allocated with the configured size"
    );

    let path = config.checkpoint_path();

    let file = CheckpointFileFacade::open(path).map_err(|source| CheckpointError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut team = ThreadTeam::new(config.threads())?;

    info!(
        threads = config.threads().get(),
        iterations = config.iterations().get(),
        matrix_size = config.matrix_size().get(),
        path = %path.display(),
        "starting checkpoint benchmark"
    );

    let statistics = run_iterations(&mut team, &file, matrix, kernel, config.iterations())?;

    info!(
        bytes_written = statistics.bytes_written(),
        write_calls = statistics.write_calls(),
        io_time = ?statistics.io_time(),
        "checkpoint benchmark completed"
    );

    Ok(statistics)
}

/// Synchronization state shared by all members for the whole run.
#[derive(derive_more::Debug)]
struct Region<'a, K, F> {
    matrix: SharedMatrix<'a>,
    #[debug(ignore)]
    kernel: &'a K,
    #[debug(ignore)]
    file: &'a F,
    iterations: NonZero<u64>,

    compute_done: Barrier,
    write_done: Barrier,

    // Set by any member whose write fails. Read by all members after `write_done`.
    failed: AtomicBool,

    // Bytes written by all members in the current checkpoint. Reset by the barrier leader.
    checkpoint_bytes: AtomicU64,
}

pub(crate) fn run_iterations<K, F>(
    team: &mut ThreadTeam,
    file: &F,
    matrix: &mut Matrix,
    kernel: &K,
    iterations: NonZero<u64>,
) -> Result<RunStatistics>
where
    K: Kernel,
    F: CheckpointFile,
{
    let threads = team.thread_count();

    let region = Region {
        matrix: SharedMatrix::new(matrix),
        kernel,
        file,
        iterations,
        compute_done: Barrier::new(threads.get()),
        write_done: Barrier::new(threads.get()),
        failed: AtomicBool::new(false),
        checkpoint_bytes: AtomicU64::new(0),
    };

    let results = team.execute(|member| run_member(&region, member));

    let mut members = Vec::with_capacity(results.len());

    for result in results {
        members.push(result?);
    }

    Ok(RunStatistics::from_members(threads, iterations, &members))
}

fn run_member<K, F>(region: &Region<'_, K, F>, member: TeamMember) -> Result<ThreadIoStats>
where
    K: Kernel,
    F: CheckpointFile,
{
    let mut stats = ThreadIoStats::default();

    for iteration in 1..=region.iterations.get() {
        // SAFETY: All members run the same pass on disjoint rows. Nobody reads the matrix
        // during the pass: the previous checkpoint ended at `write_done`.
        unsafe {
            compute_member_rows(region.kernel, &region.matrix, member, iteration);
        }

        region.compute_done.wait();

        let started = Instant::now();

        let result = {
            // SAFETY: Nobody mutates the matrix between `compute_done` and `write_done`.
            let bytes = unsafe { region.matrix.as_bytes() };

            write_member_range(region.file, bytes, 0, member)
        };

        let outcome = match result {
            Ok(outcome) => {
                region
                    .checkpoint_bytes
                    .fetch_add(outcome.bytes_written(), Ordering::Relaxed);
                outcome
            }
            Err(e) => {
                region.failed.store(true, Ordering::Relaxed);
                // Still wait for the rest of the team so nobody is left behind at the barrier.
                region.write_done.wait();
                return Err(e);
            }
        };

        let wait = region.write_done.wait();

        stats.record(outcome, started.elapsed());

        if wait.is_leader() {
            // Every add for this checkpoint happened before `write_done` and every add for the
            // next one happens after `compute_done`, which the leader has not yet reached.
            let checkpoint_bytes = region.checkpoint_bytes.swap(0, Ordering::Relaxed);
            debug!(iteration, checkpoint_bytes, "checkpoint written");
        }

        // The barrier orders the store of a failing member before this load.
        if region.failed.load(Ordering::Relaxed) {
            debug!(
                member = member.index(),
                iteration, "stopping after another member failed to write"
            );
            return Ok(stats);
        }
    }

    Ok(stats)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    use new_zealand::nz;

    use super::*;
    use crate::kernel::compute_pass;
    use crate::pal::MockCheckpointFile;
    use crate::partition_range;

    type WriteLog = Arc<Mutex<Vec<(u64, Vec<u8>)>>>;

    fn recording_mock() -> (MockCheckpointFile, WriteLog) {
        let log: WriteLog = Arc::new(Mutex::new(Vec::new()));
        let mut mock = MockCheckpointFile::new();

        mock.expect_write_at().returning({
            let log = Arc::clone(&log);
            move |buf, offset| {
                log.lock().unwrap().push((offset, buf.to_vec()));
                Ok(buf.len())
            }
        });

        (mock, log)
    }

    fn initialized(size: NonZero<usize>) -> Matrix {
        let mut matrix = Matrix::allocate(size).unwrap();
        matrix.initialize();
        matrix
    }

    /// Splits the write log into one byte image per checkpoint. All writes of one checkpoint
    /// precede all writes of the next, so the boundaries follow from the checkpoint length.
    fn checkpoint_images(log: &[(u64, Vec<u8>)], checkpoint_len: usize) -> Vec<Vec<u8>> {
        let mut images = Vec::new();
        let mut current = vec![0_u8; checkpoint_len];
        let mut filled = 0;

        for (offset, data) in log {
            let start = usize::try_from(*offset).unwrap();
            current[start..start + data.len()].copy_from_slice(data);
            filled += data.len();

            if filled == checkpoint_len {
                images.push(std::mem::replace(&mut current, vec![0_u8; checkpoint_len]));
                filled = 0;
            }
        }

        assert_eq!(filled, 0, "log ends in the middle of a checkpoint");
        images
    }

    #[test]
    fn one_checkpoint_per_iteration() {
        let (mock, log) = recording_mock();
        let mut team = ThreadTeam::new(nz!(2)).unwrap();
        let mut matrix = initialized(nz!(4));

        let statistics =
            run_iterations(&mut team, &mock, &mut matrix, &TrigKernel, nz!(3)).unwrap();

        assert_eq!(statistics.bytes_written(), 3 * 128);
        assert_eq!(statistics.write_calls(), 6);
        assert_eq!(statistics.iterations().get(), 3);
        assert_eq!(statistics.threads().get(), 2);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 6);
        assert!(log.iter().all(|(offset, _)| *offset < 128));
    }

    #[test]
    fn each_checkpoint_matches_state_after_its_compute_pass() {
        let (mock, log) = recording_mock();
        let mut team = ThreadTeam::new(nz!(3)).unwrap();
        let mut matrix = initialized(nz!(5));
        let kernel = |cell: f64, iteration: u64, step: u32| {
            cell + f64::from(step) * f64::from(u32::try_from(iteration).unwrap())
        };

        run_iterations(&mut team, &mock, &mut matrix, &kernel, nz!(4)).unwrap();

        let images = checkpoint_images(&log.lock().unwrap(), 5 * 5 * 8);
        assert_eq!(images.len(), 4);

        let mut expected = initialized(nz!(5));

        for (index, image) in images.iter().enumerate() {
            compute_pass(&kernel, &mut expected, index as u64 + 1);
            assert_eq!(image.as_slice(), expected.as_bytes(), "checkpoint {index}");
        }

        assert_eq!(matrix, expected);
    }

    #[test]
    fn write_failure_stops_before_next_checkpoint() {
        const THREADS: NonZero<usize> = nz!(4);
        let checkpoint_len = 6 * 6 * 8;
        let failing_range = partition_range(checkpoint_len, THREADS, 2);
        let failing_offset = failing_range.start as u64;

        let attempts_at_failing_offset = Arc::new(AtomicUsize::new(0));
        let writes_at_zero = Arc::new(AtomicUsize::new(0));

        let mut mock = MockCheckpointFile::new();
        mock.expect_write_at().returning({
            let attempts_at_failing_offset = Arc::clone(&attempts_at_failing_offset);
            let writes_at_zero = Arc::clone(&writes_at_zero);

            move |buf, offset| {
                if offset == 0 {
                    writes_at_zero.fetch_add(1, Ordering::SeqCst);
                }

                // Fail the third member's range during the second checkpoint.
                if offset == failing_offset
                    && attempts_at_failing_offset.fetch_add(1, Ordering::SeqCst) == 1
                {
                    return Err(io::Error::other("injected failure"));
                }

                Ok(buf.len())
            }
        });

        let mut team = ThreadTeam::new(THREADS).unwrap();
        let mut matrix = initialized(nz!(6));

        let result = run_iterations(&mut team, &mock, &mut matrix, &TrigKernel, nz!(3));

        assert!(matches!(
            result,
            Err(CheckpointError::Write { thread: 2, offset, .. }) if offset == failing_offset
        ));

        // Two checkpoints started, the third never did.
        assert_eq!(writes_at_zero.load(Ordering::SeqCst), 2);
        assert_eq!(attempts_at_failing_offset.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn team_survives_a_failed_run() {
        let mut failing = MockCheckpointFile::new();
        failing
            .expect_write_at()
            .returning(|_, _| Err(io::Error::other("injected failure")));

        let mut team = ThreadTeam::new(nz!(2)).unwrap();
        let mut matrix = initialized(nz!(4));

        run_iterations(&mut team, &failing, &mut matrix, &TrigKernel, nz!(2)).unwrap_err();

        // The barriers were released, so the same team can run again.
        let (mock, _log) = recording_mock();
        let statistics =
            run_iterations(&mut team, &mock, &mut matrix, &TrigKernel, nz!(1)).unwrap();

        assert_eq!(statistics.bytes_written(), 128);
    }

    #[test]
    fn more_threads_than_rows() {
        let (mock, log) = recording_mock();
        let mut team = ThreadTeam::new(nz!(8)).unwrap();
        let mut matrix = initialized(nz!(3));

        let statistics =
            run_iterations(&mut team, &mock, &mut matrix, &TrigKernel, nz!(2)).unwrap();

        assert_eq!(statistics.bytes_written(), 2 * 72);

        let images = checkpoint_images(&log.lock().unwrap(), 72);
        assert_eq!(images.last().unwrap().as_slice(), matrix.as_bytes());
    }
}
