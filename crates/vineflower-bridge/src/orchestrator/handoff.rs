//! Runs the engine off a thread that holds exclusive host write access.
//!
//! The engine runs on a scoped worker thread. Each read task it issues is
//! queued back to the owning thread, which executes it as a plain call and
//! acknowledges it through a one-shot handle. A read task that panics is
//! acknowledged like any other and reported once the worker is done.

use crate::host::{ReadAccess, ReadTask};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};

const HANDOFF_CAPACITY: usize = 16;

enum HandoffMessage<R> {
    Read(ReadTask, oneshot::Sender<()>),
    Finished(R),
}

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("Decompiler worker thread panicked: {0}")]
    WorkerPanicked(String),
    #[error("Host read task panicked: {0}")]
    ReadTaskPanicked(String),
    #[error("Decompiler worker thread exited without a result")]
    NoResult,
}

struct QueuedReadAccess<R> {
    tx: mpsc::Sender<HandoffMessage<R>>,
}

impl<R: Send> ReadAccess for QueuedReadAccess<R> {
    fn run(&self, task: ReadTask) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.blocking_send(HandoffMessage::Read(task, done_tx)).is_err() {
            log::warn!("Read task dropped: owning thread is no longer draining");
            return;
        }
        let _ = done_rx.blocking_recv();
    }
}

/// Run `work` on a worker thread while draining its read tasks here.
///
/// Must be called from a plain thread, not from inside an async runtime.
pub fn run_with_handoff<R, F>(work: F) -> Result<R, HandoffError>
where
    R: Send,
    F: FnOnce(&dyn ReadAccess) -> R + Send,
{
    let (tx, mut rx) = mpsc::channel::<HandoffMessage<R>>(HANDOFF_CAPACITY);

    std::thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let access = QueuedReadAccess { tx };
            let result = work(&access);
            let _ = access.tx.blocking_send(HandoffMessage::Finished(result));
        });

        let mut outcome = None;
        let mut read_panic = None;
        while let Some(message) = rx.blocking_recv() {
            match message {
                HandoffMessage::Read(task, done) => {
                    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        let message = panic_message(panic.as_ref());
                        log::error!("Host read task panicked: {}", message);
                        read_panic.get_or_insert(message);
                    }
                    let _ = done.send(());
                }
                HandoffMessage::Finished(result) => {
                    outcome = Some(result);
                    break;
                }
            }
        }

        match worker.join() {
            Err(panic) => Err(HandoffError::WorkerPanicked(panic_message(panic.as_ref()))),
            Ok(()) => match read_panic {
                Some(message) => Err(HandoffError::ReadTaskPanicked(message)),
                None => outcome.ok_or(HandoffError::NoResult),
            },
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
