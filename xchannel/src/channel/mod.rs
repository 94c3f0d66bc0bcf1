//! The per-connection channel.
//!
//! A [`Channel`] is both an inbound stream of decoded `IN` values (see
//! [`subscribe`](Channel::subscribe)) and an outbound sink of `OUT` values
//! (see [`send`](Channel::send) and [`sink`](Channel::sink)). Writes run on
//! the I/O dispatcher; inbound delivery and promise callbacks run on the
//! events dispatcher.

mod sink;
mod write;

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::broadcast::{BroadcastStream, Broadcaster, Signal, Subscription};
use crate::codec::{self, Codec, Decoder, Encoder};
use crate::config::ChannelConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, ErrorKind, Result};
use crate::peer::Peer;
use crate::promise::{self, Completer, Promise};
use crate::transport::Transport;

use sink::SinkState;
use write::{Unit, WriteTask, Writer};

pub use sink::{OutboundSource, OutboundSources};
pub use write::WriteThrough;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Channel is open and operational.
    Open,

    /// Channel is closed: no further outbound sources are accepted.
    Closed,
}

struct Inner<IN, OUT> {
    id: u64,
    prefetch: u64,
    decoder: Option<Decoder<IN>>,
    events: Dispatcher,
    inbound: Broadcaster<IN>,
    writer: Arc<Writer<OUT>>,
    peer: Arc<dyn Peer<IN, OUT>>,
    sink: Mutex<SinkState<OUT>>,
    drained: Arc<watch::Sender<bool>>,
}

/// Bidirectional pipeline between wire bytes and domain values.
///
/// Cheap to clone; clones share the same connection.
pub struct Channel<IN, OUT> {
    inner: Arc<Inner<IN, OUT>>,
}

impl<IN, OUT> Clone for Channel<IN, OUT> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<IN, OUT> Channel<IN, OUT>
where
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    /// Starts building a channel over `transport`, owned by `peer`.
    pub fn builder(
        transport: Arc<dyn Transport>,
        peer: Arc<dyn Peer<IN, OUT>>,
    ) -> ChannelBuilder<IN, OUT> {
        ChannelBuilder::new(transport, peer)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    // ---- inbound ----

    /// Subscribes to decoded inbound values.
    pub fn subscribe(&self) -> Subscription<IN> {
        self.inner.inbound.stream().subscribe()
    }

    /// Subscribes a callback, run on the events dispatcher.
    pub fn consume<F>(&self, callback: F)
    where
        F: FnMut(Signal<IN>) + Send + 'static,
    {
        self.inner.inbound.stream().consume(callback);
    }

    /// The subscribe-only view of the inbound stream.
    pub fn stream(&self) -> BroadcastStream<IN> {
        self.inner.inbound.stream()
    }

    /// The push side of the inbound stream, for transports that decode
    /// on their own.
    pub fn inbound(&self) -> &Broadcaster<IN> {
        &self.inner.inbound
    }

    /// Feeds one inbound unit through the decode path.
    ///
    /// Returns the last value decoded from it. A decode failure terminates
    /// the inbound stream for every subscriber. Without a codec the bytes
    /// are published as they are, which requires `IN` to be `Bytes`.
    pub fn receive(&self, bytes: Bytes) -> Option<IN> {
        match &self.inner.decoder {
            Some(decoder) => match decoder(bytes) {
                Ok(value) => value,
                Err(err) => {
                    log::debug!("[channel {}] decode failed: {}", self.inner.id, err);
                    self.notify_error(err);
                    None
                }
            },
            None => {
                let mut slot = Some(bytes);
                let value = (&mut slot as &mut dyn Any)
                    .downcast_mut::<Option<IN>>()
                    .and_then(Option::take);
                match value {
                    Some(value) => Some(codec::publish(Some(&self.inner.inbound), value)),
                    None => {
                        self.notify_error(Error::decode(
                            "no codec configured and inbound type is not Bytes",
                        ));
                        None
                    }
                }
            }
        }
    }

    /// Terminates the inbound stream with `error`.
    pub fn notify_error(&self, error: Error) {
        self.inner.inbound.error(error);
    }

    /// Ends the inbound stream, e.g. when the remote side hung up.
    pub fn notify_complete(&self) {
        self.inner.inbound.complete();
    }

    // ---- outbound ----

    /// Encodes and writes `data`, flushing afterwards.
    ///
    /// `None` yields an already-successful promise and schedules nothing.
    pub fn send(&self, data: impl Into<Option<OUT>>) -> Promise {
        self.dispatch(data.into().map(Unit::Object), true)
    }

    /// Like [`send`](Self::send) without the flush.
    pub fn echo(&self, data: impl Into<Option<OUT>>) -> Promise {
        self.dispatch(data.into().map(Unit::Object), false)
    }

    /// Writes an already-encoded buffer, flushing afterwards.
    pub fn send_buffer(&self, data: impl Into<Option<Bytes>>) -> Promise {
        self.dispatch(data.into().map(Unit::Buffer), true)
    }

    /// Like [`send_buffer`](Self::send_buffer) without the flush.
    pub fn echo_buffer(&self, data: impl Into<Option<Bytes>>) -> Promise {
        self.dispatch(data.into().map(Unit::Buffer), false)
    }

    /// Schedules a flushing write of `data` settled through `completion`.
    pub fn send_with(&self, data: OUT, completion: Completer) {
        self.inner.writer.schedule(WriteTask {
            unit: Unit::Object(data),
            completion: Some(completion),
            flush: true,
        });
    }

    /// Schedules a flushing write of raw `data` settled through `completion`.
    pub fn send_raw(&self, data: Bytes, completion: Completer) {
        self.inner.writer.schedule(WriteTask {
            unit: Unit::Buffer(data),
            completion: Some(completion),
            flush: true,
        });
    }

    /// A reusable, promise-less writer for continuous outbound streams.
    pub fn write_through(&self) -> WriteThrough<OUT> {
        WriteThrough::new(Arc::clone(&self.inner.writer))
    }

    fn dispatch(&self, unit: Option<Unit<OUT>>, flush: bool) -> Promise {
        let Some(unit) = unit else {
            return Promise::success(Some(&self.inner.events));
        };
        let (completion, promise) = promise::channel(Some(&self.inner.events));
        self.inner.writer.schedule(WriteTask {
            unit,
            completion: Some(completion),
            flush,
        });
        promise
    }

    /// Attaches another outbound publisher to this connection.
    ///
    /// The first call opens the writer-stream and registers it with the
    /// peer; every call queues `source` behind those attached before it.
    /// Fails with [`ErrorKind::Closed`] once the channel is closed.
    ///
    /// The peer's registration runs under the sink lock and must not call
    /// `sink` on this channel synchronously.
    pub fn sink<S>(&self, source: S) -> Result<()>
    where
        S: Stream<Item = OUT> + Send + 'static,
    {
        let source: OutboundSource<OUT> = source.boxed();
        let mut state = self.inner.sink.lock();

        if matches!(*state, SinkState::Idle) {
            let (tx, rx) = mpsc::unbounded_channel();
            log::debug!("[channel {}] opening writer stream", self.inner.id);
            self.inner
                .peer
                .register_outbound_drain(self.outbound_sources(rx), self.clone());
            *state = SinkState::Draining(tx);
        }

        match &*state {
            SinkState::Draining(tx) => tx.send(source).map_err(|_| {
                Error::new(ErrorKind::Closed, "peer stopped draining outbound sources")
            }),
            _ => {
                log::warn!("[channel {}] source attached after close dropped", self.inner.id);
                Err(Error::closed())
            }
        }
    }

    fn outbound_sources(
        &self,
        rx: mpsc::UnboundedReceiver<OutboundSource<OUT>>,
    ) -> OutboundSources<OUT> {
        OutboundSources::new(rx, self.write_through(), Arc::clone(&self.inner.drained))
    }

    // ---- lifecycle ----

    /// Closes the channel: the writer-stream, if one was opened, is
    /// completed so the peer finishes after the sources already queued.
    ///
    /// The inbound stream is left to the transport.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.sink.lock(), SinkState::Closed);
        match previous {
            SinkState::Draining(tx) => {
                drop(tx);
                log::debug!("[channel {}] closed, writer stream completed", self.inner.id);
            }
            SinkState::Idle => {
                let drained = Arc::clone(&self.inner.drained);
                self.inner.writer.after_pending(move || {
                    drained.send_replace(true);
                });
                log::debug!("[channel {}] closed", self.inner.id);
            }
            SinkState::Closed => {}
        }
    }

    /// Resolves once the channel is closed, its writer-stream is gone and
    /// every write scheduled before that has been handed to the transport.
    pub async fn drained(&self) {
        let mut drained = self.inner.drained.subscribe();
        let _ = drained.wait_for(|done| *done).await;
    }

    pub fn is_drained(&self) -> bool {
        *self.inner.drained.borrow()
    }

    pub fn state(&self) -> ChannelState {
        match *self.inner.sink.lock() {
            SinkState::Closed => ChannelState::Closed,
            _ => ChannelState::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    // ---- accessors ----

    pub fn decoder(&self) -> Option<&Decoder<IN>> {
        self.inner.decoder.as_ref()
    }

    pub fn encoder(&self) -> Option<&Encoder<OUT>> {
        self.inner.writer.encoder()
    }

    pub fn io_dispatcher(&self) -> &Dispatcher {
        self.inner.writer.io()
    }

    pub fn events_dispatcher(&self) -> &Dispatcher {
        &self.inner.events
    }

    pub fn prefetch(&self) -> u64 {
        self.inner.prefetch
    }

    pub fn peer(&self) -> &Arc<dyn Peer<IN, OUT>> {
        &self.inner.peer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        self.inner.writer.transport()
    }
}

impl<IN, OUT> core::fmt::Debug for Channel<IN, OUT>
where
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("prefetch", &self.inner.prefetch)
            .field("codec", &self.inner.decoder.is_some())
            .finish()
    }
}

/// Builds a [`Channel`]. Dispatchers not supplied are started from the
/// names in [`ChannelConfig`].
pub struct ChannelBuilder<IN, OUT> {
    config: ChannelConfig,
    codec: Option<Box<dyn Codec<IN, OUT>>>,
    io: Option<Dispatcher>,
    events: Option<Dispatcher>,
    transport: Arc<dyn Transport>,
    peer: Arc<dyn Peer<IN, OUT>>,
}

impl<IN, OUT> ChannelBuilder<IN, OUT>
where
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    pub fn new(transport: Arc<dyn Transport>, peer: Arc<dyn Peer<IN, OUT>>) -> Self {
        Self {
            config: ChannelConfig::default(),
            codec: None,
            io: None,
            events: None,
            transport,
            peer,
        }
    }

    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the codec. Without one the channel passes bytes through.
    pub fn codec<C>(mut self, codec: C) -> Self
    where
        C: Codec<IN, OUT> + 'static,
    {
        self.codec = Some(Box::new(codec));
        self
    }

    pub fn io_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.io = Some(dispatcher);
        self
    }

    pub fn events_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.events = Some(dispatcher);
        self
    }

    pub fn build(self) -> Result<Channel<IN, OUT>> {
        let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        let io = match self.io {
            Some(io) => io,
            None => Dispatcher::new(format!("{}-{}", self.config.io_dispatcher_name, id))?,
        };
        let events = match self.events {
            Some(events) => events,
            None => Dispatcher::new(format!("{}-{}", self.config.events_dispatcher_name, id))?,
        };

        let inbound = Broadcaster::new(events.clone());
        let (decoder, encoder) = match &self.codec {
            Some(codec) => (Some(codec.decoder(Some(inbound.clone()))), Some(codec.encoder())),
            None => (None, None),
        };

        log::debug!(
            "[channel {}] created (io={}, events={}, codec={})",
            id,
            io.name(),
            events.name(),
            decoder.is_some()
        );

        Ok(Channel {
            inner: Arc::new(Inner {
                id,
                prefetch: self.config.prefetch,
                decoder,
                events,
                inbound,
                writer: Arc::new(Writer::new(id, io, encoder, self.transport)),
                peer: self.peer,
                sink: Mutex::new(SinkState::Idle),
                drained: Arc::new(watch::Sender::new(false)),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use futures::stream;

    use crate::codec::{JsonCodec, PassThroughCodec, StringCodec};
    use crate::peer::DrainPeer;
    use crate::transport::LoopbackTransport;

    /// Keeps writer-streams instead of draining them.
    struct RecordingPeer<OUT> {
        registrations: AtomicUsize,
        sources: Mutex<Vec<OutboundSources<OUT>>>,
    }

    impl<OUT> RecordingPeer<OUT> {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                registrations: AtomicUsize::new(0),
                sources: Mutex::new(Vec::new()),
            })
        }

        fn registrations(&self) -> usize {
            self.registrations.load(Ordering::SeqCst)
        }

        fn take(&self) -> OutboundSources<OUT> {
            self.sources.lock().remove(0)
        }
    }

    impl<IN, OUT> Peer<IN, OUT> for RecordingPeer<OUT>
    where
        OUT: Send + 'static,
    {
        fn register_outbound_drain(&self, sources: OutboundSources<OUT>, _: Channel<IN, OUT>) {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            self.sources.lock().push(sources);
        }
    }

    struct FailingCodec;

    impl Codec<Bytes, u32> for FailingCodec {
        fn decoder(&self, _: Option<Broadcaster<Bytes>>) -> Decoder<Bytes> {
            Arc::new(|bytes: Bytes| -> Result<Option<Bytes>> { Ok(Some(bytes)) })
        }

        fn encoder(&self) -> Encoder<u32> {
            Arc::new(|n: u32| -> Result<Bytes> { Err(Error::encode(format!("{n} is not encodable"))) })
        }
    }

    fn string_channel() -> (
        Channel<String, String>,
        Arc<LoopbackTransport>,
        Arc<RecordingPeer<String>>,
    ) {
        let transport = Arc::new(LoopbackTransport::new());
        let peer = RecordingPeer::<String>::new();
        let channel = Channel::<String, String>::builder(transport.clone(), peer.clone())
            .codec(StringCodec)
            .build()
            .unwrap();
        (channel, transport, peer)
    }

    #[test]
    fn test_absent_send_schedules_nothing() {
        let (channel, transport, _peer) = string_channel();

        assert!(channel.send(None::<String>).is_success());
        assert!(channel.echo(None::<String>).is_success());
        assert!(channel.send_buffer(None::<Bytes>).is_success());
        assert!(channel.echo_buffer(None::<Bytes>).is_success());

        assert_eq!(channel.io_dispatcher().submitted(), 0);
        assert_eq!(transport.write_count(), 0);
    }

    #[test]
    fn test_send_flushes_echo_does_not() {
        let (channel, transport, _peer) = string_channel();

        channel.send("one".to_string()).wait().unwrap();
        channel.echo("two".to_string()).wait().unwrap();

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].bytes, "one");
        assert!(writes[0].flush);
        assert_eq!(writes[1].bytes, "two");
        assert!(!writes[1].flush);
        assert!(writes[0].thread.as_deref().unwrap().starts_with("xchannel-io"));
    }

    #[test]
    fn test_empty_encoding_skips_transport() {
        let (channel, transport, _peer) = string_channel();

        channel.send(String::new()).wait().unwrap();

        assert_eq!(transport.write_count(), 0);
    }

    #[test]
    fn test_encoder_error_fails_promise() {
        let transport = Arc::new(LoopbackTransport::new());
        let channel = Channel::<Bytes, u32>::builder(transport.clone(), RecordingPeer::<u32>::new())
            .codec(FailingCodec)
            .build()
            .unwrap();

        let err = channel.send(7).wait().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Encode);
        assert_eq!(transport.write_count(), 0);
    }

    #[test]
    fn test_transport_failure_fails_promise() {
        let (channel, transport, _peer) = string_channel();
        transport.fail_writes(Error::new(ErrorKind::Transport, "peer reset"));

        let err = channel.send("lost".to_string()).wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_send_with_settles_given_completion() {
        let (channel, transport, _peer) = string_channel();
        let (completer, promise) = promise::channel(None);

        channel.send_raw(Bytes::from_static(b"raw"), completer);
        promise.wait().unwrap();

        assert_eq!(transport.writes()[0].bytes, "raw");
    }

    #[tokio::test]
    async fn test_concurrent_sink_registers_once() {
        let (channel, _transport, peer) = string_channel();

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let channel = channel.clone();
                std::thread::spawn(move || channel.sink(stream::iter(vec![format!("s{i}")])))
            })
            .collect();
        for thread in threads {
            thread.join().unwrap().unwrap();
        }
        assert_eq!(peer.registrations(), 1);

        channel.close();
        let sources: Vec<_> = peer.take().collect().await;
        assert_eq!(sources.len(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_sink_keeps_attach_order() {
        use std::sync::Barrier;

        let (channel, _transport, peer) = string_channel();
        let order = [5usize, 2, 7, 0, 3, 6, 1, 4];
        let barrier = Arc::new(Barrier::new(order.len()));
        let turn = Arc::new(AtomicUsize::new(0));
        let attached = Arc::new(Mutex::new(Vec::new()));

        let threads: Vec<_> = order
            .iter()
            .enumerate()
            .map(|(position, &id)| {
                let channel = channel.clone();
                let barrier = Arc::clone(&barrier);
                let turn = Arc::clone(&turn);
                let attached = Arc::clone(&attached);
                std::thread::spawn(move || {
                    barrier.wait();
                    while turn.load(Ordering::SeqCst) != position {
                        std::thread::yield_now();
                    }
                    channel.sink(stream::iter(vec![format!("s{id}")])).unwrap();
                    attached.lock().push(format!("s{id}"));
                    turn.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(peer.registrations(), 1);

        channel.close();
        let items: Vec<String> = peer.take().flatten().collect().await;
        assert_eq!(items, *attached.lock());
        assert_eq!(items[0], "s5");
    }

    #[tokio::test]
    async fn test_close_completes_writer_stream() {
        let (channel, _transport, peer) = string_channel();

        channel.sink(stream::iter(vec!["a".to_string()])).unwrap();
        channel.close();
        assert!(channel.is_closed());

        let err = channel.sink(stream::iter(vec!["b".to_string()])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
        assert_eq!(peer.registrations(), 1);

        let items: Vec<String> = peer.take().flatten().collect().await;
        assert_eq!(items, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_close_without_sink_is_drained() {
        let (channel, _transport, _peer) = string_channel();
        assert!(!channel.is_drained());

        channel.close();
        channel.drained().await;
        assert!(channel.is_drained());
    }

    #[tokio::test]
    async fn test_drained_waits_for_writer_stream() {
        let (channel, _transport, peer) = string_channel();

        channel.sink(stream::iter(vec!["a".to_string()])).unwrap();
        channel.close();
        let sources = peer.take();
        assert!(!channel.is_drained());

        drop(sources);
        channel.drained().await;
    }

    #[test]
    fn test_close_without_sink_never_registers() {
        let (channel, _transport, peer) = string_channel();

        channel.close();
        channel.close();

        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(peer.registrations(), 0);
        let err = channel.sink(stream::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_drain_peer_writes_sources_in_order() {
        let transport = Arc::new(LoopbackTransport::new());
        let peer = Arc::new(DrainPeer::current().unwrap());
        let channel = Channel::<String, String>::builder(transport.clone(), peer)
            .codec(StringCodec)
            .build()
            .unwrap();

        channel.sink(stream::iter(vec!["a".to_string(), "b".to_string()])).unwrap();
        channel.sink(stream::iter(vec!["c".to_string()])).unwrap();

        let writes = transport.wait_for_writes(3).await;
        let bytes: Vec<_> = writes.iter().map(|w| w.bytes.clone()).collect();
        assert_eq!(bytes, vec!["a", "b", "c"]);
        assert!(writes.iter().all(|w| !w.flush));
    }

    #[tokio::test]
    async fn test_decode_error_is_terminal() {
        let (channel, _transport, _peer) = string_channel();
        let mut inbound = channel.subscribe();

        assert_eq!(channel.receive(Bytes::from_static(b"fine")).as_deref(), Some("fine"));
        assert_eq!(channel.receive(Bytes::from_static(&[0xff, 0xfe])), None);
        assert_eq!(channel.receive(Bytes::from_static(b"late")).as_deref(), Some("late"));

        assert_eq!(inbound.recv().await.unwrap().unwrap(), "fine");
        assert_eq!(inbound.recv().await.unwrap().unwrap_err().kind(), ErrorKind::Decode);
        assert!(inbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_receive_without_codec_publishes_bytes() {
        let transport = Arc::new(LoopbackTransport::new());
        let channel = Channel::<Bytes, Bytes>::builder(transport, RecordingPeer::<Bytes>::new())
            .build()
            .unwrap();
        let mut inbound = channel.subscribe();

        channel.receive(Bytes::from_static(b"Hello World!"));

        assert_eq!(inbound.recv().await.unwrap().unwrap(), "Hello World!");
        assert!(channel.decoder().is_none());
        assert!(channel.encoder().is_none());
    }

    #[tokio::test]
    async fn test_receive_without_codec_needs_bytes() {
        let transport = Arc::new(LoopbackTransport::new());
        let channel = Channel::<String, String>::builder(transport, RecordingPeer::<String>::new())
            .build()
            .unwrap();
        let mut inbound = channel.subscribe();

        assert_eq!(channel.receive(Bytes::from_static(b"text")), None);
        assert_eq!(inbound.recv().await.unwrap().unwrap_err().kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_json_round_trip_over_loopback() {
        use serde_json::{Value, json};

        let transport = Arc::new(LoopbackTransport::new());
        let channel = Channel::<Value, Value>::builder(transport.clone(), RecordingPeer::<Value>::new())
            .codec(JsonCodec::new())
            .build()
            .unwrap();
        let mut inbound = channel.subscribe();

        channel.receive(Bytes::from_static(br#"{"name":"John Doe"}"#));
        let value = inbound.recv().await.unwrap().unwrap();
        assert_eq!(value["name"], "John Doe");

        channel.send(json!({"name": "Jane Doe"})).await.unwrap();
        assert_eq!(transport.writes()[0].bytes.len(), 19);
    }

    #[test]
    fn test_passthrough_buffer_is_written_verbatim() {
        let transport = Arc::new(LoopbackTransport::new());
        let channel = Channel::<Bytes, Bytes>::builder(transport.clone(), RecordingPeer::<Bytes>::new())
            .codec(PassThroughCodec)
            .config(ChannelConfig::new().with_prefetch(16))
            .build()
            .unwrap();

        channel.echo_buffer(Bytes::from_static(b"Hello World!")).wait().unwrap();

        assert_eq!(
            transport.writes()[0].bytes.as_ref(),
            &[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x20, 0x57, 0x6f, 0x72, 0x6c, 0x64, 0x21]
        );
        assert_eq!(channel.prefetch(), 16);
    }
}
