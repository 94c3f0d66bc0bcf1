//! The owner of a connection.
//!
//! A channel hands its writer-stream to its [`Peer`] exactly once, the
//! first time an outbound source is attached. The peer decides where the
//! stream gets drained.

use tokio::runtime::Handle;

use crate::channel::{Channel, OutboundSources};
use crate::error::{Error, ErrorKind, Result};

pub trait Peer<IN, OUT>: Send + Sync {
    /// Takes ownership of `channel`'s writer-stream.
    ///
    /// Called with the channel's sink lock held; implementations should
    /// hand `sources` off (spawn, queue) and return.
    fn register_outbound_drain(&self, sources: OutboundSources<OUT>, channel: Channel<IN, OUT>);
}

/// Drains every writer-stream on a tokio runtime.
#[derive(Debug, Clone)]
pub struct DrainPeer {
    handle: Handle,
}

impl DrainPeer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::new(ErrorKind::Unsupported, format!("no tokio runtime: {e}")))
    }
}

impl<IN, OUT> Peer<IN, OUT> for DrainPeer
where
    IN: Clone + Send + 'static,
    OUT: Send + 'static,
{
    fn register_outbound_drain(&self, sources: OutboundSources<OUT>, channel: Channel<IN, OUT>) {
        log::debug!("[channel {}] outbound drain registered", channel.id());
        self.handle.spawn(sources.drain_into(channel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_requires_runtime() {
        let err = DrainPeer::current().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_current_inside_runtime() {
        assert!(DrainPeer::current().is_ok());
    }
}
