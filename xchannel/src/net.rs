//! Channels over tokio byte streams.
//!
//! [`connect`] splits a stream into a read loop feeding
//! [`Channel::receive`] and a [`StreamTransport`] writing the outbound
//! side. Works for TCP, Unix sockets and in-memory duplex pipes alike.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::channel::Channel;
use crate::codec::Codec;
use crate::config::ChannelConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::peer::DrainPeer;
use crate::transport::StreamTransport;

/// A channel bound to one byte stream.
pub struct Connection<IN, OUT> {
    channel: Channel<IN, OUT>,
    transport: Arc<StreamTransport>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Wires `stream` to a new channel using `codec`.
///
/// Must be called from within a tokio runtime: the read loop, the writer
/// task and writer-stream drains are spawned on it.
pub fn connect<S, C, IN, OUT>(stream: S, codec: C, config: ChannelConfig) -> Result<Connection<IN, OUT>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    C: Codec<IN, OUT> + 'static,
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    let peer = DrainPeer::current()?;
    let (read_half, write_half) = tokio::io::split(stream);
    let (transport, writer) = StreamTransport::spawn(write_half);
    let transport = Arc::new(transport);

    let read_buffer_size = config.read_buffer_size;
    let channel = Channel::<IN, OUT>::builder(transport.clone(), Arc::new(peer))
        .config(config)
        .codec(codec)
        .build()?;

    let reader = tokio::spawn(read_loop(read_half, channel.clone(), read_buffer_size));

    Ok(Connection {
        channel,
        transport,
        reader,
        writer,
    })
}

async fn read_loop<R, IN, OUT>(reader: R, channel: Channel<IN, OUT>, capacity: usize)
where
    R: AsyncRead + Unpin,
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    let mut frames = FramedRead::with_capacity(reader, BytesCodec::new(), capacity);

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(bytes) => {
                log::trace!("[channel {}] read {} bytes", channel.id(), bytes.len());
                channel.receive(bytes.freeze());
            }
            Err(err) => {
                log::warn!("[channel {}] read failed: {}", channel.id(), err);
                channel.notify_error(Error::with_source(ErrorKind::Transport, err));
                return;
            }
        }
    }

    log::debug!("[channel {}] remote closed", channel.id());
    channel.notify_complete();
}

impl<IN, OUT> Connection<IN, OUT>
where
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    pub fn channel(&self) -> &Channel<IN, OUT> {
        &self.channel
    }

    pub fn transport(&self) -> &Arc<StreamTransport> {
        &self.transport
    }

    /// Closes the channel, waits until every queued outbound source is
    /// drained into the transport, then shuts the write half down. The
    /// read side keeps running until the remote hangs up.
    pub async fn close(&self) {
        self.channel.close();
        self.channel.drained().await;
        log::debug!("[channel {}] drained, shutting down write half", self.channel.id());
        self.transport.shutdown();
    }

    /// Waits for both the read loop and the writer task to finish.
    pub async fn finished(self) {
        if let Err(err) = self.reader.await {
            log::warn!("[channel {}] read loop ended abnormally: {}", self.channel.id(), err);
        }
        if let Err(err) = self.writer.await {
            log::warn!("[channel {}] writer ended abnormally: {}", self.channel.id(), err);
        }
    }
}
