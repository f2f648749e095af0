use std::fmt;
use std::num::NonZero;
use std::time::Duration;

use crate::WriteOutcome;

/// I/O counters accumulated by one team member over a whole run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ThreadIoStats {
    bytes_written: u64,
    write_calls: u64,
    io_time: Duration,
}

impl ThreadIoStats {
    /// Adds the outcome of one checkpoint and the time this member spent in it.
    pub fn record(&mut self, outcome: WriteOutcome, elapsed: Duration) {
        self.bytes_written = self.bytes_written.saturating_add(outcome.bytes_written());
        self.write_calls = self.write_calls.saturating_add(outcome.write_calls());
        self.io_time = self.io_time.saturating_add(elapsed);
    }

    /// Bytes this member wrote.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Positional write calls this member issued.
    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.write_calls
    }

    /// Wall-clock time this member spent in checkpoint phases.
    #[must_use]
    pub fn io_time(&self) -> Duration {
        self.io_time
    }
}

/// Aggregated I/O statistics of a finished run.
///
/// Byte and call counts are sums over all members and iterations. The I/O time is the sum of
/// every member's checkpoint time divided by the team size, which approximates the wall-clock
/// time the run spent checkpointing because members write concurrently.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunStatistics {
    threads: NonZero<usize>,
    iterations: NonZero<u64>,
    bytes_written: u64,
    write_calls: u64,
    io_time_total: Duration,
}

impl RunStatistics {
    /// Reduces the counters of all team members into run-wide statistics.
    #[must_use]
    pub fn from_members<'a>(
        threads: NonZero<usize>,
        iterations: NonZero<u64>,
        members: impl IntoIterator<Item = &'a ThreadIoStats>,
    ) -> Self {
        members.into_iter().fold(
            Self {
                threads,
                iterations,
                bytes_written: 0,
                write_calls: 0,
                io_time_total: Duration::ZERO,
            },
            |mut total, member| {
                total.bytes_written = total.bytes_written.saturating_add(member.bytes_written);
                total.write_calls = total.write_calls.saturating_add(member.write_calls);
                total.io_time_total = total.io_time_total.saturating_add(member.io_time);
                total
            },
        )
    }

    /// Size of the thread team that executed the run.
    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    /// Number of completed iterations, each with one checkpoint.
    #[must_use]
    pub fn iterations(&self) -> NonZero<u64> {
        self.iterations
    }

    /// Total bytes written across all checkpoints.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Total positional write calls across all checkpoints and members.
    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.write_calls
    }

    /// Sum of the checkpoint time of every member.
    #[must_use]
    pub fn io_time_total(&self) -> Duration {
        self.io_time_total
    }

    /// Checkpoint time averaged over the team.
    #[must_use]
    pub fn io_time(&self) -> Duration {
        let nanos_per_thread = self
            .io_time_total
            .as_nanos()
            .checked_div(self.threads.get() as u128)
            .expect("thread count is NonZero, so division by zero is impossible");

        Duration::from_nanos(
            nanos_per_thread
                .try_into()
                .expect("overflowing u64 nanoseconds is unrealistic when using a real clock"),
        )
    }
}

/// Human-readable summary of a run, combining its statistics with the total wall-clock time
/// measured around it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use checkpoint_bench::{Report, RunStatistics, ThreadIoStats};
/// use new_zealand::nz;
///
/// let statistics = RunStatistics::from_members(nz!(1), nz!(1), &[ThreadIoStats::default()]);
/// let report = Report::new(statistics, Duration::from_secs(2));
///
/// assert_eq!(report.compute_time(), Duration::from_secs(2));
/// println!("{report}");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Report {
    statistics: RunStatistics,
    total_time: Duration,
}

impl Report {
    /// Creates a report for a run that took `total_time` from start to completion.
    #[must_use]
    pub fn new(statistics: RunStatistics, total_time: Duration) -> Self {
        Self {
            statistics,
            total_time,
        }
    }

    /// The statistics this report is based on.
    #[must_use]
    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Total time minus I/O time.
    #[must_use]
    pub fn compute_time(&self) -> Duration {
        self.total_time.saturating_sub(self.statistics.io_time())
    }

    /// Checkpoint throughput in MiB per second of I/O time, or 0 if no I/O time was measured.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "rates are displayed with limited precision anyway"
    )]
    pub fn throughput_mib_per_sec(&self) -> f64 {
        self.per_io_second(self.statistics.bytes_written as f64 / 1024.0 / 1024.0)
    }

    /// Positional write calls per second of I/O time, or 0 if no I/O time was measured.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "rates are displayed with limited precision anyway"
    )]
    pub fn write_calls_per_sec(&self) -> f64 {
        self.per_io_second(self.statistics.write_calls as f64)
    }

    fn per_io_second(&self, amount: f64) -> f64 {
        let seconds = self.statistics.io_time().as_secs_f64();

        if seconds > 0.0 { amount / seconds } else { 0.0 }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Runtime:    {:.6}s", self.compute_time().as_secs_f64())?;
        writeln!(f, "I/O time:   {:.6}s", self.statistics.io_time().as_secs_f64())?;
        writeln!(f, "Throughput: {:.6} MB/s", self.throughput_mib_per_sec())?;
        writeln!(f, "IOPS:       {:.6} Op/s", self.write_calls_per_sec())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::float_cmp, reason = "inputs are chosen to give exact results")]

    use new_zealand::nz;

    use super::*;

    fn member(bytes: u64, calls: u64, millis: u64) -> ThreadIoStats {
        ThreadIoStats {
            bytes_written: bytes,
            write_calls: calls,
            io_time: Duration::from_millis(millis),
        }
    }

    #[test]
    fn record_accumulates() {
        let mut stats = ThreadIoStats::default();

        stats.record(WriteOutcome::default(), Duration::from_millis(5));
        stats.record(WriteOutcome::default(), Duration::from_millis(7));

        assert_eq!(stats.io_time(), Duration::from_millis(12));
        assert_eq!(stats.bytes_written(), 0);
    }

    #[test]
    fn reduces_members() {
        let members = [member(100, 1, 10), member(200, 2, 30)];

        let statistics = RunStatistics::from_members(nz!(2), nz!(3), &members);

        assert_eq!(statistics.bytes_written(), 300);
        assert_eq!(statistics.write_calls(), 3);
        assert_eq!(statistics.io_time_total(), Duration::from_millis(40));
        assert_eq!(statistics.io_time(), Duration::from_millis(20));
        assert_eq!(statistics.iterations().get(), 3);
    }

    #[test]
    fn report_rates() {
        let members = [member(1024 * 1024, 4, 500), member(1024 * 1024, 4, 500)];
        let statistics = RunStatistics::from_members(nz!(2), nz!(1), &members);

        let report = Report::new(statistics, Duration::from_secs(3));

        assert_eq!(report.compute_time(), Duration::from_millis(2500));
        assert_eq!(report.throughput_mib_per_sec(), 4.0);
        assert_eq!(report.write_calls_per_sec(), 16.0);
    }

    #[test]
    fn report_without_io_time_has_zero_rates() {
        let statistics = RunStatistics::from_members(nz!(1), nz!(1), &[member(10, 1, 0)]);

        let report = Report::new(statistics, Duration::from_secs(1));

        assert_eq!(report.throughput_mib_per_sec(), 0.0);
        assert_eq!(report.write_calls_per_sec(), 0.0);
    }

    #[test]
    fn report_display_lists_all_lines() {
        let statistics = RunStatistics::from_members(nz!(1), nz!(1), &[member(10, 1, 250)]);

        let text = Report::new(statistics, Duration::from_secs(1)).to_string();

        assert!(text.contains("Runtime:    0.750000s"), "{text}");
        assert!(text.contains("I/O time:   0.250000s"), "{text}");
        assert!(text.contains("Throughput:"), "{text}");
        assert!(text.contains("IOPS:       4.000000 Op/s"), "{text}");
    }
}
