use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{Transport, WritePayload};
use crate::error::Error;
use crate::promise::Completer;

/// One write seen by a [`LoopbackTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub bytes: Bytes,
    pub flush: bool,
    /// Whether the payload arrived as an unencoded object.
    pub object: bool,
    /// Name of the thread that performed the write.
    pub thread: Option<String>,
}

/// An in-memory transport for testing.
///
/// Every write is recorded and succeeds, unless a failure was armed
/// with [`fail_writes`](Self::fail_writes).
pub struct LoopbackTransport {
    writes: Mutex<Vec<WriteRecord>>,
    failure: Mutex<Option<Error>>,
    flushes: Mutex<usize>,
    count: watch::Sender<usize>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            flushes: Mutex::new(0),
            count: watch::Sender::new(0),
        }
    }

    /// Makes every following write fail with `error`.
    pub fn fail_writes(&self, error: Error) {
        *self.failure.lock() = Some(error);
    }

    /// Snapshot of the recorded writes.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    /// Number of write calls, failed ones included.
    pub fn write_count(&self) -> usize {
        *self.count.borrow()
    }

    /// Number of explicit `flush` calls.
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }

    /// Waits until at least `n` write calls happened.
    pub async fn wait_for_writes(&self, n: usize) -> Vec<WriteRecord> {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
        self.writes()
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn write(&self, payload: WritePayload, completion: Option<Completer>, flush: bool) {
        let object = !payload.is_bytes();
        let outcome = match self.failure.lock().clone() {
            Some(err) => Err(err),
            None => payload.into_bytes(),
        };

        let outcome = outcome.map(|bytes| {
            let record = WriteRecord {
                bytes,
                flush,
                object,
                thread: std::thread::current().name().map(str::to_string),
            };
            log::trace!("loopback write: {} bytes, flush={}", record.bytes.len(), flush);
            self.writes.lock().push(record);
        });
        self.count.send_modify(|count| *count += 1);

        if let Some(completion) = completion {
            completion.resolve(outcome);
        }
    }

    fn flush(&self) {
        *self.flushes.lock() += 1;
    }
}
