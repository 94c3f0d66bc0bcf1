//! FIFO task dispatchers.
//!
//! A [`Dispatcher`] owns one worker thread fed by an unbounded queue.
//! Tasks run one at a time, in submission order. Channels hold two of
//! them: one for I/O (every transport write) and one for events
//! (subscriber fan-out and promise callbacks), so slow subscribers never
//! stall writes and slow writes never stall subscribers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, ErrorKind, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;
type ErrorHandler = Box<dyn FnOnce(Error) + Send + 'static>;

struct Job {
    task: Task,
    on_error: Option<ErrorHandler>,
}

struct Inner {
    name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: ThreadId,
    submitted: AtomicU64,
    completed: Arc<AtomicU64>,
}

/// A task the dispatcher refused, with its payload handed back.
pub struct Rejected<T> {
    pub payload: T,
    pub error: Error,
}

impl<T> From<Rejected<T>> for Error {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}

impl<T> core::fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish()
    }
}

/// Handle to a single-worker FIFO task queue. Clones share the worker.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Starts a dispatcher whose worker thread carries `name`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let completed = Arc::new(AtomicU64::new(0));

        let worker_name = name.clone();
        let worker_completed = Arc::clone(&completed);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                log::debug!("[{}] dispatcher started", worker_name);
                while let Some(job) = rx.blocking_recv() {
                    run_job(&worker_name, job);
                    worker_completed.fetch_add(1, Ordering::Release);
                }
                log::debug!("[{}] dispatcher stopped", worker_name);
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                tx: Mutex::new(Some(tx)),
                worker: handle.thread().id(),
                submitted: AtomicU64::new(0),
                completed,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queues `task(payload)` behind every task already submitted.
    ///
    /// Once the dispatcher is shut down the payload comes back inside
    /// [`Rejected`] so the caller can still settle it.
    pub fn submit<T, F>(&self, payload: T, task: F) -> core::result::Result<(), Rejected<T>>
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let guard = self.inner.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(Rejected {
                payload,
                error: self.rejected(),
            });
        };
        // The worker only exits after every sender is gone, so this send
        // cannot fail while `tx` is held.
        let job = Job {
            task: Box::new(move || task(payload)),
            on_error: None,
        };
        if tx.send(job).is_ok() {
            self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Like [`submit`](Self::submit), but failures go to `on_error`.
    ///
    /// `on_error` runs on the calling thread if the task is rejected, or
    /// on the worker if the task panics.
    pub fn submit_or_else<T, F, E>(&self, payload: T, task: F, on_error: E)
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        let guard = self.inner.tx.lock();
        let Some(tx) = guard.as_ref() else {
            drop(guard);
            on_error(self.rejected());
            return;
        };
        let job = Job {
            task: Box::new(move || task(payload)),
            on_error: Some(Box::new(on_error)),
        };
        if tx.send(job).is_ok() {
            self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn rejected(&self) -> Error {
        Error::new(
            ErrorKind::Rejected,
            format!("dispatcher '{}' is shut down", self.inner.name),
        )
    }

    /// Stops accepting tasks. Already queued tasks still run.
    pub fn shutdown(&self) {
        if self.inner.tx.lock().take().is_some() {
            log::debug!("[{}] dispatcher shutting down", self.inner.name);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.tx.lock().is_none()
    }

    /// Number of tasks accepted so far.
    pub fn submitted(&self) -> u64 {
        self.inner.submitted.load(Ordering::Relaxed)
    }

    /// Number of tasks that finished running, panicked ones included.
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// True when called from this dispatcher's worker thread.
    pub fn in_worker(&self) -> bool {
        thread::current().id() == self.inner.worker
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.inner.name)
            .field("submitted", &self.submitted())
            .field("completed", &self.completed())
            .finish()
    }
}

fn run_job(name: &str, job: Job) {
    let Job { task, on_error } = job;
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let message = panic_message(panic.as_ref());
        log::error!("[{}] task panicked: {}", name, message);
        if let Some(on_error) = on_error {
            on_error(Error::new(ErrorKind::Panicked, message));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
