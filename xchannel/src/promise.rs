//! Single-assignment write completion.
//!
//! [`channel`] hands out a [`Completer`], which resolves the outcome
//! exactly once (it is consumed by value), and a [`Promise`], which any
//! number of clones may observe:
//!
//! ```rust,ignore
//! let (completer, promise) = promise::channel(Some(&events));
//! io.submit(bytes, move |bytes| transport.write(bytes.into(), Some(completer), true))?;
//! promise.await?;
//! ```
//!
//! A completer dropped without being resolved fails its promise with
//! [`ErrorKind::Abandoned`], so waiters never hang on a lost write.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, ErrorKind, Result};

type Callback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

struct State {
    outcome: Option<Result<()>>,
    callbacks: Vec<Callback>,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
    notify: Notify,
    events: Option<Dispatcher>,
}

impl Shared {
    fn new(outcome: Option<Result<()>>, events: Option<Dispatcher>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                outcome,
                callbacks: Vec::new(),
            }),
            cond: Condvar::new(),
            notify: Notify::new(),
            events,
        })
    }

    fn resolve(&self, result: Result<()>) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return;
            }
            state.outcome = Some(result.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.cond.notify_all();
        self.notify.notify_waiters();
        for callback in callbacks {
            self.notify_callback(callback, result.clone());
        }
    }

    fn notify_callback(&self, callback: Callback, result: Result<()>) {
        match &self.events {
            Some(events) => {
                // Run inline if the events dispatcher is gone; the outcome
                // must still reach the callback.
                let slot = Arc::new(Mutex::new(Some(callback)));
                let task_slot = Arc::clone(&slot);
                if events
                    .submit(result.clone(), move |result| {
                        if let Some(callback) = task_slot.lock().take() {
                            callback(result);
                        }
                    })
                    .is_err()
                {
                    if let Some(callback) = slot.lock().take() {
                        callback(result);
                    }
                }
            }
            None => callback(result),
        }
    }
}

/// Creates a pending promise and the completer that resolves it.
///
/// Callbacks attached with [`Promise::on_complete`] run on `events`
/// when given, inline on the resolving thread otherwise.
pub fn channel(events: Option<&Dispatcher>) -> (Completer, Promise) {
    let shared = Shared::new(None, events.cloned());
    (
        Completer {
            shared: Some(Arc::clone(&shared)),
        },
        Promise { shared },
    )
}

/// The resolving half. Consumed by [`complete`](Self::complete) or
/// [`fail`](Self::fail).
pub struct Completer {
    shared: Option<Arc<Shared>>,
}

impl Completer {
    pub fn complete(self) {
        self.resolve(Ok(()));
    }

    pub fn fail(self, error: Error) {
        self.resolve(Err(error));
    }

    pub fn resolve(mut self, result: Result<()>) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(result);
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(Err(Error::new(
                ErrorKind::Abandoned,
                "completion dropped without being resolved",
            )));
        }
    }
}

impl core::fmt::Debug for Completer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}

/// The observing half of a write outcome.
#[derive(Clone)]
pub struct Promise {
    shared: Arc<Shared>,
}

impl Promise {
    /// An already-successful promise.
    pub fn success(events: Option<&Dispatcher>) -> Self {
        Self {
            shared: Shared::new(Some(Ok(())), events.cloned()),
        }
    }

    /// An already-failed promise.
    pub fn failed(error: Error, events: Option<&Dispatcher>) -> Self {
        Self {
            shared: Shared::new(Some(Err(error)), events.cloned()),
        }
    }

    /// The outcome, if resolved.
    pub fn result(&self) -> Option<Result<()>> {
        self.shared.state.lock().outcome.clone()
    }

    pub fn is_done(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.shared.state.lock().outcome, Some(Ok(())))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.shared.state.lock().outcome, Some(Err(_)))
    }

    /// Blocks the calling thread until resolved.
    ///
    /// Never call this from a dispatcher worker that the write depends on.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = state.outcome.as_ref() {
                return outcome.clone();
            }
            self.shared.cond.wait(&mut state);
        }
    }

    /// Blocks up to `timeout`; `None` if still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut state = self.shared.state.lock();
        if state.outcome.is_none() {
            self.shared.cond.wait_for(&mut state, timeout);
        }
        state.outcome.clone()
    }

    /// Runs `callback` once with the outcome.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let result = {
            let mut state = self.shared.state.lock();
            match state.outcome.as_ref() {
                Some(outcome) => outcome.clone(),
                None => {
                    state.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        self.shared.notify_callback(Box::new(callback), result);
    }

    async fn resolved(self) -> Result<()> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(outcome) = self.result() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl IntoFuture for Promise {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.resolved())
    }
}

impl core::fmt::Debug for Promise {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Promise")
            .field("outcome", &self.result())
            .finish()
    }
}
