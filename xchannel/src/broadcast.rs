//! Hot multicast stream.
//!
//! [`Broadcaster`] is the push side, owned by whoever produces values.
//! [`BroadcastStream`] is the subscribe side handed to consumers. Both
//! share one subscriber list; every delivery runs on the events
//! dispatcher, in push order.
//!
//! Termination is sticky: after [`Broadcaster::error`] or
//! [`Broadcaster::complete`] further values are dropped, and late
//! subscribers receive the terminal signal straight away.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

/// One notification delivered to a callback subscriber.
#[derive(Debug, Clone)]
pub enum Signal<T> {
    Next(T),
    Error(Error),
    Complete,
}

#[derive(Debug, Clone)]
enum Terminal {
    Completed,
    Failed(Error),
}

impl Terminal {
    fn signal<T>(&self) -> Signal<T> {
        match self {
            Terminal::Completed => Signal::Complete,
            Terminal::Failed(err) => Signal::Error(err.clone()),
        }
    }
}

type Callback<T> = Box<dyn FnMut(Signal<T>) + Send + 'static>;

enum Subscriber<T> {
    Queue(mpsc::UnboundedSender<Result<T>>),
    Callback(Callback<T>),
}

impl<T: Clone> Subscriber<T> {
    /// Returns false once the subscriber is gone or terminated.
    fn deliver(&mut self, signal: &Signal<T>) -> bool {
        match self {
            Subscriber::Queue(tx) => match signal {
                Signal::Next(value) => tx.send(Ok(value.clone())).is_ok(),
                Signal::Error(err) => {
                    let _ = tx.send(Err(err.clone()));
                    false
                }
                Signal::Complete => false,
            },
            Subscriber::Callback(callback) => {
                callback(signal.clone());
                matches!(signal, Signal::Next(_))
            }
        }
    }
}

struct State<T> {
    subscribers: Vec<Subscriber<T>>,
    terminal: Option<Terminal>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    events: Dispatcher,
}

impl<T> Shared<T>
where
    T: Clone + Send + 'static,
{
    fn fan_out(self: &Arc<Self>, signal: Signal<T>) {
        let task_shared = Arc::clone(self);
        let submitted = self.events.submit(signal, move |signal| {
            task_shared.deliver_all(signal);
        });
        if let Err(rejected) = submitted {
            log::warn!("{}; delivering on the calling thread", rejected.error);
            self.deliver_all(rejected.payload);
        }
    }

    /// Runs on the events dispatcher, or inline once it has shut down.
    fn deliver_all(&self, signal: Signal<T>) {
        // Deliver outside the lock so callbacks may subscribe.
        let mut subscribers = std::mem::take(&mut self.state.lock().subscribers);
        subscribers.retain_mut(|subscriber| subscriber.deliver(&signal));

        let terminal = !matches!(signal, Signal::Next(_));
        let mut state = self.state.lock();
        if terminal {
            // Whoever joined mid-delivery saw the terminal flag already.
            return;
        }
        subscribers.append(&mut state.subscribers);
        state.subscribers = subscribers;
    }

    fn attach(self: &Arc<Self>, mut subscriber: Subscriber<T>) {
        let terminal = {
            let mut state = self.state.lock();
            match state.terminal.clone() {
                Some(terminal) => terminal,
                None => {
                    state.subscribers.push(subscriber);
                    return;
                }
            }
        };
        let submitted = self.events.submit(terminal, move |terminal| {
            subscriber.deliver(&terminal.signal());
        });
        if let Err(rejected) = submitted {
            log::warn!("late subscriber left without terminal signal: {}", rejected.error);
        }
    }

    fn terminate(self: &Arc<Self>, terminal: Terminal) -> bool {
        {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return false;
            }
            state.terminal = Some(terminal.clone());
        }
        self.fan_out(terminal.signal());
        true
    }
}

/// Push side of a hot multicast stream.
pub struct Broadcaster<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a broadcaster delivering on `events`.
    pub fn new(events: Dispatcher) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    subscribers: Vec::new(),
                    terminal: None,
                }),
                events,
            }),
        }
    }

    /// Publishes a value to every current subscriber.
    ///
    /// Dropped silently once the broadcaster has terminated.
    pub fn next(&self, value: T) {
        if self.shared.state.lock().terminal.is_some() {
            log::trace!("value pushed after termination dropped");
            return;
        }
        self.shared.fan_out(Signal::Next(value));
    }

    /// Terminates the stream with `error`. Returns false if already terminated.
    pub fn error(&self, error: Error) -> bool {
        self.shared.terminate(Terminal::Failed(error))
    }

    /// Terminates the stream normally. Returns false if already terminated.
    pub fn complete(&self) -> bool {
        self.shared.terminate(Terminal::Completed)
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.state.lock().terminal.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().subscribers.len()
    }

    /// The subscribe-only view of this broadcaster.
    pub fn stream(&self) -> BroadcastStream<T> {
        BroadcastStream {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Subscribe side of a [`Broadcaster`]. Cannot push.
pub struct BroadcastStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BroadcastStream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BroadcastStream<T>
where
    T: Clone + Send + 'static,
{
    /// Subscribes with an async stream of values.
    ///
    /// The stream yields `Err` once if the broadcaster fails, then ends.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.attach(Subscriber::Queue(tx));
        Subscription { rx }
    }

    /// Subscribes with a callback run on the events dispatcher.
    pub fn consume<F>(&self, callback: F)
    where
        F: FnMut(Signal<T>) + Send + 'static,
    {
        self.shared.attach(Subscriber::Callback(Box::new(callback)));
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T>>,
}

impl<T> Subscription<T> {
    /// Receives the next value, `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
