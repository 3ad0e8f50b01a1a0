//! Cold deferred write actions.
//!
//! # Responsibility
//! - Wrap each persistence write as a unit of work that runs only once
//!   explicitly started.
//! - Report exactly one terminal success/failure signal per started action.
//!
//! # Invariants
//! - A `Deferred` that is dropped without being started never executes.
//! - A started action runs to completion or failure; there is no mid-flight
//!   cancellation.
//! - No ordering guarantee exists between independently started actions.

use crate::repo::{RepoError, RepoResult};
use log::error;
use std::sync::mpsc;
use std::thread;

/// A write action that does nothing until started.
pub struct Deferred {
    label: &'static str,
    job: Box<dyn FnOnce() -> RepoResult<()> + Send + 'static>,
}

impl Deferred {
    pub(crate) fn new(
        label: &'static str,
        job: impl FnOnce() -> RepoResult<()> + Send + 'static,
    ) -> Self {
        Self {
            label,
            job: Box::new(job),
        }
    }

    /// Stable name of the wrapped operation, used in logs and errors.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Executes the action on the calling thread, blocking until done.
    pub fn run_blocking(self) -> RepoResult<()> {
        (self.job)()
    }

    /// Starts the action on a dedicated background worker thread.
    ///
    /// The caller is not blocked; the returned [`Completion`] carries the
    /// terminal signal. Dropping the `Completion` does not stop the worker.
    pub fn start(self) -> Completion {
        let (sender, receiver) = mpsc::channel();
        let label = self.label;
        let job = self.job;

        let spawned = thread::Builder::new()
            .name(format!("store-write-{label}"))
            .spawn(move || {
                // The receiver may be gone by the time the job finishes;
                // the write itself must still run to completion.
                let _ = sender.send(job());
            });

        if let Err(err) = spawned {
            error!("event=task_spawn module=task status=error label={label} error={err}");
            let (failed_sender, failed_receiver) = mpsc::channel();
            let _ = failed_sender.send(Err(RepoError::Worker(label)));
            return Completion {
                label,
                receiver: failed_receiver,
            };
        }

        Completion {
            label,
            receiver,
        }
    }
}

/// Terminal signal of one started [`Deferred`] action.
pub struct Completion {
    label: &'static str,
    receiver: mpsc::Receiver<RepoResult<()>>,
}

impl Completion {
    /// Blocks until the action reports success or failure.
    ///
    /// A worker that dies without reporting (a panic in the job) surfaces
    /// as [`RepoError::Worker`].
    pub fn wait(self) -> RepoResult<()> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(mpsc::RecvError) => Err(RepoError::Worker(self.label)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Deferred;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn unstarted_action_never_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let deferred = Deferred::new("probe", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        drop(deferred);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn started_action_reports_terminal_signal() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let deferred = Deferred::new("probe", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        deferred.start().wait().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_worker_surfaces_as_worker_error() {
        let deferred = Deferred::new("probe", || panic!("boom"));
        let result = deferred.start().wait();
        assert!(result.is_err());
    }
}
