use std::num::NonZero;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::{iter, mem};

use tracing::error;

use crate::{CheckpointError, Result};

/// A fixed team of worker threads, spawned once and reused for every task.
///
/// The team mirrors a parallel region: [`execute()`][Self::execute] runs the same task on
/// every member at the same time and returns when all members have finished. Members learn
/// their position from the [`TeamMember`] they receive, which is how they pick their share
/// of the work.
///
/// # Examples
///
/// ```
/// use checkpoint_bench::ThreadTeam;
/// use new_zealand::nz;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut team = ThreadTeam::new(nz!(3))?;
///
/// let indexes = team.execute(|member| member.index());
///
/// assert_eq!(&*indexes, &[0, 1, 2]);
/// # Ok(())
/// # }
/// ```
///
/// # Lifecycle
///
/// Dropping the team waits for all threads to finish executing their tasks.
#[derive(Debug)]
pub struct ThreadTeam {
    command_txs: Vec<mpsc::Sender<Command>>,
    join_handles: Vec<JoinHandle<()>>,
    thread_count: NonZero<usize>,
}

impl ThreadTeam {
    /// Spawns a team of `thread_count` worker threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the operating system refuses to create one of the threads. Any
    /// threads already started exit once the partially built team is dropped.
    pub fn new(thread_count: NonZero<usize>) -> Result<Self> {
        let mut command_txs = Vec::with_capacity(thread_count.get());
        let mut join_handles = Vec::with_capacity(thread_count.get());

        for index in 0..thread_count.get() {
            let (tx, rx) = mpsc::channel();

            let handle = thread::Builder::new()
                .name(format!("checkpoint-team-{index}"))
                .spawn(move || worker_entrypoint(&rx))
                .map_err(|source| CheckpointError::Spawn {
                    index,
                    threads: thread_count.get(),
                    source,
                })?;

            command_txs.push(tx);
            join_handles.push(handle);
        }

        Ok(Self {
            command_txs,
            join_handles,
            thread_count,
        })
    }

    /// Returns the number of threads in the team.
    #[must_use]
    pub fn thread_count(&self) -> NonZero<usize> {
        self.thread_count
    }

    /// Executes `f` on every member of the team, waiting for all of them to complete.
    ///
    /// Returns one result per member, ordered by member index.
    ///
    /// The task may borrow from the caller. This is sound because this method does not return
    /// before every member has finished with the task. If any member panics, the process is
    /// aborted right there on the panicking thread, as other members may still hold those
    /// borrows or be waiting for the panicked member at a barrier.
    #[cfg_attr(test, mutants::skip)] // If work does not get enqueued, deadlocks are very easy.
    #[expect(
        clippy::needless_pass_by_ref_mut,
        reason = "protects users from deadlock through concurrent usage"
    )]
    pub fn execute<'f, F, R>(&mut self, f: F) -> Box<[R]>
    where
        F: FnOnce(TeamMember) -> R + Clone + Send + 'f,
        R: Send + 'static,
    {
        // Tasks commonly wait on barriers sized for the whole team, so two concurrent executions
        // on the same team would deadlock. The `&mut` receiver rules that out.

        let (result_txs, result_rxs): (Vec<_>, Vec<_>) = iter::repeat_with(oneshot::channel::<R>)
            .take(self.thread_count.get())
            .unzip();

        for (index, (command_tx, result_tx)) in self.command_txs.iter().zip(result_txs).enumerate()
        {
            let member = TeamMember {
                index,
                count: self.thread_count,
            };

            let f: Box<dyn FnOnce(TeamMember) -> R + Send + 'f> = Box::new(f.clone());

            // SAFETY: We wait below for every member to send its result (or abort the process),
            // so the task never outlives 'f even though the channel requires 'static.
            let f = unsafe {
                mem::transmute::<
                    Box<dyn FnOnce(TeamMember) -> R + Send + 'f>,
                    Box<dyn FnOnce(TeamMember) -> R + Send + 'static>,
                >(f)
            };

            command_tx
                .send(Command::Execute(Box::new(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| f(member)))
                        .unwrap_or_else(|_| {
                            error!(
                                member = member.index,
                                "team member panicked while executing a task"
                            );
                            process::abort()
                        });

                    // The receiver only disappears if the caller is already aborting.
                    _ = result_tx.send(result);
                })))
                .expect("team member must still exist - the team cannot operate without workers");
        }

        result_rxs
            .into_iter()
            .enumerate()
            .map(|(index, rx)| {
                rx.recv().unwrap_or_else(|_| {
                    error!(member = index, "team member exited without a result");
                    process::abort()
                })
            })
            .collect()
    }
}

impl Drop for ThreadTeam {
    #[cfg_attr(test, mutants::skip)] // Impractical to test that stuff stops happening.
    fn drop(&mut self) {
        if thread::panicking() {
            // Shutting down may hide the original panic behind a second one.
            return;
        }

        for tx in self.command_txs.drain(..) {
            _ = tx.send(Command::Shutdown);
        }

        for handle in self.join_handles.drain(..) {
            _ = handle.join();
        }
    }
}

/// Identifies one member of a [`ThreadTeam`] to the task it executes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TeamMember {
    index: usize,
    count: NonZero<usize>,
}

impl TeamMember {
    /// Creates member metadata outside of a team, e.g. to drive a single-threaded pass.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than `count`.
    #[must_use]
    pub fn new(index: usize, count: NonZero<usize>) -> Self {
        assert!(index < count.get(), "member index out of bounds");

        Self { index, count }
    }

    /// Index of this member, starting from 0.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Total number of members in the team.
    #[must_use]
    pub fn count(&self) -> NonZero<usize> {
        self.count
    }
}

enum Command {
    Execute(Box<dyn FnOnce() + Send>),
    Shutdown,
}

#[cfg_attr(test, mutants::skip)] // Impractical to test that things do not happen when worker function is missing.
fn worker_entrypoint(rx: &mpsc::Receiver<Command>) {
    while let Ok(Command::Execute(f)) = rx.recv() {
        f();
    }
}
