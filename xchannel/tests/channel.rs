//! End-to-end channel tests over the in-memory and duplex transports.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use xchannel::{
    Channel, ChannelConfig, DelimitedCodec, DrainPeer, ErrorKind, JsonCodec, LoopbackTransport,
    PassThroughCodec, Signal, StringCodec, net,
};

const HELLO: &[u8] = &[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x20, 0x57, 0x6f, 0x72, 0x6c, 0x64, 0x21];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    name: String,
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn loopback_channel<IN, OUT, C>(codec: C) -> (Channel<IN, OUT>, Arc<LoopbackTransport>)
where
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
    C: xchannel::Codec<IN, OUT> + 'static,
{
    let transport = Arc::new(LoopbackTransport::new());
    let peer = Arc::new(DrainPeer::current().unwrap());
    let channel = Channel::<IN, OUT>::builder(transport.clone(), peer)
        .codec(codec)
        .build()
        .unwrap();
    (channel, transport)
}

#[tokio::test]
async fn test_passthrough_echo_is_byte_exact() {
    init_logger();
    let (channel, transport) = loopback_channel::<Bytes, Bytes, _>(PassThroughCodec);
    let mut inbound = channel.subscribe();

    channel.receive(Bytes::from_static(b"Hello World!"));
    let received = inbound.recv().await.unwrap().unwrap();
    assert_eq!(received, "Hello World!");

    channel.echo_buffer(received).await.unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].bytes.as_ref(), HELLO);
    assert!(!writes[0].flush);
}

#[tokio::test]
async fn test_json_request_reply() {
    init_logger();
    let (channel, transport) = loopback_channel::<Person, Person, _>(JsonCodec::new());
    let mut inbound = channel.subscribe();

    channel.receive(Bytes::from_static(br#"{"name":"John Doe"}"#));
    let person = inbound.recv().await.unwrap().unwrap();
    assert_eq!(person.name, "John Doe");

    let reply = Person {
        name: "Jane Doe".to_string(),
    };
    channel.send(reply).await.unwrap();

    let writes = transport.writes();
    assert_eq!(writes[0].bytes, r#"{"name":"Jane Doe"}"#);
    assert_eq!(writes[0].bytes.len(), 19);
}

#[tokio::test]
async fn test_subscribers_see_the_same_values() {
    init_logger();
    let (channel, _transport) = loopback_channel::<String, String, _>(StringCodec);
    let mut first = channel.subscribe();
    let mut second = channel.subscribe();

    let (tx, rx) = std::sync::mpsc::channel();
    channel.consume(move |signal| {
        if let Signal::Next(value) = signal {
            let on_events = std::thread::current()
                .name()
                .is_some_and(|name| name.starts_with("xchannel-events"));
            let _ = tx.send((value, on_events));
        }
    });

    channel.receive(Bytes::from_static(b"one"));
    channel.receive(Bytes::from_static(b"two"));
    channel.notify_complete();

    for sub in [&mut first, &mut second] {
        assert_eq!(sub.recv().await.unwrap().unwrap(), "one");
        assert_eq!(sub.recv().await.unwrap().unwrap(), "two");
        assert!(sub.recv().await.is_none());
    }
    assert_eq!(rx.recv().unwrap(), ("one".to_string(), true));
    assert_eq!(rx.recv().unwrap(), ("two".to_string(), true));
}

#[tokio::test]
async fn test_sources_attached_later_follow_earlier_ones() {
    init_logger();
    let (channel, transport) = loopback_channel::<String, String, _>(DelimitedCodec::lines(StringCodec));

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let live = tokio_stream(rx);
    channel.sink(live).unwrap();
    channel.sink(stream::iter(vec!["after".to_string()])).unwrap();

    tx.send("first".to_string()).unwrap();
    tx.send("second".to_string()).unwrap();
    drop(tx);

    let writes = transport.wait_for_writes(3).await;
    let lines: Vec<_> = writes.iter().map(|w| w.bytes.clone()).collect();
    assert_eq!(lines, vec!["first\n", "second\n", "after\n"]);
}

fn tokio_stream(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<String>,
) -> impl futures::Stream<Item = String> + Send + 'static {
    futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
}

#[tokio::test]
async fn test_closed_channel_refuses_sources_but_still_sends() {
    init_logger();
    let (channel, transport) = loopback_channel::<String, String, _>(StringCodec);

    channel.close();
    let err = channel.sink(stream::iter(vec!["x".to_string()])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Closed);

    channel.send("direct".to_string()).await.unwrap();
    assert_eq!(transport.writes()[0].bytes, "direct");
}

#[tokio::test]
async fn test_lines_over_duplex() {
    init_logger();
    let (local, mut remote) = tokio::io::duplex(4096);
    let connection = net::connect::<_, _, String, String>(
        local,
        DelimitedCodec::lines(StringCodec),
        ChannelConfig::default().with_read_buffer_size(16),
    )
    .unwrap();
    let channel = connection.channel().clone();
    let mut inbound = channel.subscribe();

    remote.write_all(b"Hello World!\nsecond li").await.unwrap();
    remote.write_all(b"ne\n").await.unwrap();
    assert_eq!(inbound.recv().await.unwrap().unwrap(), "Hello World!");
    assert_eq!(inbound.recv().await.unwrap().unwrap(), "second line");

    channel
        .sink(stream::iter(vec!["a".to_string(), "b".to_string()]))
        .unwrap();
    let mut echoed = [0u8; 4];
    remote.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"a\nb\n");

    connection.close().await;
    drop(remote);
    assert!(inbound.recv().await.is_none());
    connection.finished().await;
}

#[tokio::test]
async fn test_passthrough_over_duplex_is_byte_exact() {
    init_logger();
    let (local, mut remote) = tokio::io::duplex(64);
    let connection =
        net::connect::<_, _, Bytes, Bytes>(local, PassThroughCodec, ChannelConfig::default()).unwrap();
    let channel = connection.channel().clone();
    let mut inbound = channel.subscribe();

    remote.write_all(b"Hello World!").await.unwrap();
    let received = inbound.recv().await.unwrap().unwrap();

    channel.echo_buffer(received).await.unwrap();
    let mut echoed = [0u8; 12];
    remote.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed[..], HELLO);
}
