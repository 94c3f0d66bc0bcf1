//! Writer-stream: outbound sources attached to a live channel.
//!
//! The first [`Channel::sink`](super::Channel::sink) call opens the
//! writer-stream and registers its receiving half, [`OutboundSources`],
//! with the peer. Later calls push more sources into it. The peer drains
//! them one after another in attach order.
//!
//! Once the writer-stream is dropped, drained or not, the channel is
//! marked drained behind every write it already scheduled.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};

use super::{Channel, WriteThrough};

/// One attached publisher of outbound values.
pub type OutboundSource<OUT> = BoxStream<'static, OUT>;

pub(crate) enum SinkState<OUT> {
    /// No source attached yet.
    Idle,
    /// Writer-stream open and registered with the peer.
    Draining(mpsc::UnboundedSender<OutboundSource<OUT>>),
    /// Channel closed; the writer-stream, if any, was completed.
    Closed,
}

/// The receiving half of a channel's writer-stream.
///
/// Yields each attached source in attach order and ends once the
/// channel is closed and every queued source has been handed out.
pub struct OutboundSources<OUT> {
    rx: mpsc::UnboundedReceiver<OutboundSource<OUT>>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl<OUT> OutboundSources<OUT>
where
    OUT: Send + 'static,
{
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<OutboundSource<OUT>>,
        writer: WriteThrough<OUT>,
        drained: Arc<watch::Sender<bool>>,
    ) -> Self {
        let on_drop = move || {
            writer.after_pending(move || {
                drained.send_replace(true);
            });
        };
        Self {
            rx,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Drains every source, in order, into `channel`.
    pub async fn drain_into<IN>(self, channel: Channel<IN, OUT>)
    where
        IN: Clone + Send + 'static,
    {
        let id = channel.id();
        let written = self.drain(channel.write_through()).await;
        log::debug!("[channel {}] outbound drain finished after {} items", id, written);
    }

    /// Concatenates the sources into `writer`, flushing after each batch
    /// of items that were ready together. Returns the number of items.
    pub async fn drain(self, writer: WriteThrough<OUT>) -> u64 {
        let mut items = self.flatten();
        let mut written = 0u64;

        while let Some(item) = items.next().await {
            writer.accept(item);
            written += 1;

            let mut ended = false;
            while let Some(next) = items.next().now_or_never() {
                match next {
                    Some(item) => {
                        writer.accept(item);
                        written += 1;
                    }
                    None => {
                        ended = true;
                        break;
                    }
                }
            }
            writer.flush();
            if ended {
                break;
            }
        }
        written
    }
}

impl<OUT> Drop for OutboundSources<OUT> {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

impl<OUT> Stream for OutboundSources<OUT> {
    type Item = OutboundSource<OUT>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
