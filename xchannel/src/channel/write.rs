//! Outbound write pipeline.
//!
//! Every write becomes a [`WriteTask`] run on the I/O dispatcher, never
//! on the caller's thread. The task encodes (if a codec is configured),
//! then hands the payload and its completion to the transport. Encoding
//! failures settle the completion here; transport outcomes are settled by
//! the transport.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::codec::Encoder;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::promise::Completer;
use crate::transport::{Transport, WritePayload};

/// What one write carries.
pub(crate) enum Unit<OUT> {
    Object(OUT),
    Buffer(Bytes),
}

pub(crate) struct WriteTask<OUT> {
    pub(crate) unit: Unit<OUT>,
    pub(crate) completion: Option<Completer>,
    pub(crate) flush: bool,
}

/// The I/O side of a channel: dispatcher, encoder and transport.
pub(crate) struct Writer<OUT> {
    channel_id: u64,
    io: Dispatcher,
    encoder: Option<Encoder<OUT>>,
    transport: Arc<dyn Transport>,
}

impl<OUT> Writer<OUT>
where
    OUT: Send + 'static,
{
    pub(crate) fn new(
        channel_id: u64,
        io: Dispatcher,
        encoder: Option<Encoder<OUT>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            channel_id,
            io,
            encoder,
            transport,
        }
    }

    pub(crate) fn encoder(&self) -> Option<&Encoder<OUT>> {
        self.encoder.as_ref()
    }

    pub(crate) fn io(&self) -> &Dispatcher {
        &self.io
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Queues `task` on the I/O dispatcher.
    ///
    /// The completion stays reachable from the error path until the task
    /// hands it to the transport, so a rejected or panicking task fails
    /// the promise with that error.
    pub(crate) fn schedule(self: &Arc<Self>, mut task: WriteTask<OUT>) {
        let slot = Arc::new(Mutex::new(task.completion.take()));
        let task_slot = Arc::clone(&slot);
        let writer = Arc::clone(self);
        let channel_id = self.channel_id;

        self.io.submit_or_else(
            task,
            move |task| writer.run(task, &task_slot),
            move |err| {
                log::warn!("[channel {}] write failed: {}", channel_id, err);
                if let Some(completion) = slot.lock().take() {
                    completion.fail(err);
                }
            },
        );
    }

    /// Queues a transport flush behind every write already scheduled.
    pub(crate) fn schedule_flush(self: &Arc<Self>) {
        let writer = Arc::clone(self);
        if let Err(rejected) = self.io.submit((), move |_| writer.transport.flush()) {
            log::warn!("[channel {}] flush rejected: {}", self.channel_id, rejected.error);
        }
    }

    /// Runs `signal` once every task already scheduled has run. Runs it
    /// inline if the I/O dispatcher is gone.
    pub(crate) fn after_pending<F>(&self, signal: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(rejected) = self.io.submit(signal, |signal| signal()) {
            (rejected.payload)();
        }
    }

    fn run(&self, task: WriteTask<OUT>, slot: &Mutex<Option<Completer>>) {
        let WriteTask { unit, flush, .. } = task;

        let prepared = self.prepare(unit);
        let completion = slot.lock().take();
        match prepared {
            Ok(Some(payload)) => self.transport.write(payload, completion, flush),
            Ok(None) => {
                log::trace!("[channel {}] empty encoding, nothing written", self.channel_id);
                if let Some(completion) = completion {
                    completion.complete();
                }
            }
            Err(err) => {
                log::debug!("[channel {}] encode failed: {}", self.channel_id, err);
                if let Some(completion) = completion {
                    completion.fail(err);
                }
            }
        }
    }

    /// `Ok(None)` means the encoder produced nothing to write.
    fn prepare(&self, unit: Unit<OUT>) -> Result<Option<WritePayload>> {
        let Some(encoder) = &self.encoder else {
            return Ok(Some(match unit {
                Unit::Object(value) => WritePayload::Object(Box::new(value)),
                Unit::Buffer(bytes) => WritePayload::Bytes(bytes),
            }));
        };

        match unit {
            Unit::Object(value) => non_empty(encoder(value)?),
            Unit::Buffer(bytes) => {
                // A buffer only goes through the encoder when OUT is Bytes,
                // so framing codecs still frame raw sends.
                let mut slot = Some(bytes);
                let as_out = (&mut slot as &mut dyn Any)
                    .downcast_mut::<Option<OUT>>()
                    .and_then(Option::take);
                match as_out {
                    Some(value) => non_empty(encoder(value)?),
                    None => Ok(slot.map(WritePayload::Bytes)),
                }
            }
        }
    }
}

fn non_empty(bytes: Bytes) -> Result<Option<WritePayload>> {
    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(WritePayload::Bytes(bytes)))
    }
}

/// Reusable handle for pushing a continuous stream of values without a
/// promise per item. Writes do not flush; call [`flush`](Self::flush).
pub struct WriteThrough<OUT> {
    writer: Arc<Writer<OUT>>,
}

impl<OUT> Clone for WriteThrough<OUT> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<OUT> WriteThrough<OUT>
where
    OUT: Send + 'static,
{
    pub(crate) fn new(writer: Arc<Writer<OUT>>) -> Self {
        Self { writer }
    }

    pub fn accept(&self, data: OUT) {
        self.writer.schedule(WriteTask {
            unit: Unit::Object(data),
            completion: None,
            flush: false,
        });
    }

    pub fn accept_buffer(&self, data: Bytes) {
        self.writer.schedule(WriteTask {
            unit: Unit::Buffer(data),
            completion: None,
            flush: false,
        });
    }

    pub fn flush(&self) {
        self.writer.schedule_flush();
    }

    pub(crate) fn after_pending<F>(&self, signal: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.writer.after_pending(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, DelimitedCodec, StringCodec};
    use crate::error::{Error, ErrorKind};
    use crate::promise;
    use crate::transport::LoopbackTransport;

    fn io_writer<OUT: Send + 'static>(
        encoder: Option<Encoder<OUT>>,
    ) -> (Arc<Writer<OUT>>, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new());
        let io = Dispatcher::new("test-writer-io").unwrap();
        (Arc::new(Writer::new(0, io, encoder, transport.clone())), transport)
    }

    fn task<OUT>(unit: Unit<OUT>, completion: Completer) -> WriteTask<OUT> {
        WriteTask {
            unit,
            completion: Some(completion),
            flush: true,
        }
    }

    #[test]
    fn test_write_runs_on_io_thread() {
        let (writer, transport) = io_writer(Some(StringCodec.encoder()));
        let (completer, promise) = promise::channel(None);

        writer.schedule(task(Unit::Object("hi".to_string()), completer));
        promise.wait().unwrap();

        let writes = transport.writes();
        assert_eq!(writes[0].bytes, "hi");
        assert_eq!(writes[0].thread.as_deref(), Some("test-writer-io"));
    }

    #[test]
    fn test_object_without_encoder_is_opaque() {
        let (writer, transport) = io_writer::<String>(None);
        let (completer, promise) = promise::channel(None);

        writer.schedule(task(Unit::Object("as-is".to_string()), completer));
        promise.wait().unwrap();

        let writes = transport.writes();
        assert!(writes[0].object);
        assert_eq!(writes[0].bytes, "as-is");
    }

    #[test]
    fn test_buffer_bypasses_non_bytes_encoder() {
        let (writer, transport) = io_writer(Some(DelimitedCodec::lines(StringCodec).encoder()));
        let (completer, promise) = promise::channel(None);

        writer.schedule(task(Unit::Buffer(Bytes::from_static(b"raw")), completer));
        promise.wait().unwrap();

        assert_eq!(transport.writes()[0].bytes, "raw");
    }

    #[test]
    fn test_encoder_failure_skips_transport() {
        let encoder: Encoder<u32> = Arc::new(|_: u32| -> Result<Bytes> { Err(Error::encode("no numbers")) });
        let (writer, transport) = io_writer(Some(encoder));
        let (completer, promise) = promise::channel(None);

        writer.schedule(task(Unit::Object(7), completer));

        let err = promise.wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert_eq!(transport.write_count(), 0);
    }

    #[test]
    fn test_panicking_encoder_fails_with_panic_message() {
        let encoder: Encoder<u32> = Arc::new(|_: u32| -> Result<Bytes> { panic!("encoder blew up") });
        let (writer, transport) = io_writer(Some(encoder));
        let (completer, promise) = promise::channel(None);

        writer.schedule(task(Unit::Object(1), completer));

        let err = promise.wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert!(err.message().contains("encoder blew up"));
        assert_eq!(transport.write_count(), 0);
    }

    #[test]
    fn test_after_pending_runs_behind_writes() {
        let (writer, transport) = io_writer(Some(StringCodec.encoder()));
        let (completer, promise) = promise::channel(None);
        let (tx, rx) = std::sync::mpsc::channel();

        writer.schedule(task(Unit::Object("first".to_string()), completer));
        let seen = transport.clone();
        writer.after_pending(move || {
            let _ = tx.send(seen.write_count());
        });

        assert_eq!(rx.recv().unwrap(), 1);
        promise.wait().unwrap();
    }

    #[test]
    fn test_rejected_write_fails_completion() {
        let (writer, transport) = io_writer(Some(StringCodec.encoder()));
        writer.io().shutdown();
        let (completer, promise) = promise::channel(None);

        writer.schedule(task(Unit::Object("late".to_string()), completer));

        assert_eq!(promise.wait().unwrap_err().kind(), ErrorKind::Rejected);
        assert_eq!(transport.write_count(), 0);
    }
}
