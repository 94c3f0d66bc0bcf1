//! Transport layer abstraction.
//!
//! This module provides the `Transport` trait the channel writes through.
//! The channel never touches a socket itself: every write is handed to a
//! transport together with the completion it must resolve.
//!
//! # Implementations
//!
//! - `LoopbackTransport`: records writes in memory (tests, demos)
//! - `StreamTransport`: tokio writer task over any `AsyncWrite`
//!
//! # Example
//!
//! ```rust,ignore
//! use xchannel::transport::{LoopbackTransport, Transport, WritePayload};
//!
//! let transport = LoopbackTransport::new();
//! transport.write(WritePayload::from_static(b"Hello"), None, true);
//! assert_eq!(transport.writes()[0].bytes, "Hello");
//! ```

mod loopback;
mod stream;

use std::any::Any;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, ErrorKind, Result};
use crate::promise::Completer;

pub use loopback::{LoopbackTransport, WriteRecord};
pub use stream::StreamTransport;

/// What the channel hands a transport for one write.
pub enum WritePayload {
    /// Encoded wire bytes.
    Bytes(Bytes),

    /// A value no encoder touched. Transports that can serialize it
    /// themselves downcast it; the rest call [`into_bytes`](Self::into_bytes).
    Object(Box<dyn Any + Send>),
}

impl WritePayload {
    pub fn from_static(bytes: &'static [u8]) -> Self {
        WritePayload::Bytes(Bytes::from_static(bytes))
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, WritePayload::Bytes(_))
    }

    /// Converts to wire bytes. Objects convert when they are `Bytes`,
    /// `BytesMut`, `Vec<u8>`, `String` or `&'static str`.
    pub fn into_bytes(self) -> Result<Bytes> {
        let object = match self {
            WritePayload::Bytes(bytes) => return Ok(bytes),
            WritePayload::Object(object) => object,
        };
        let object = match object.downcast::<Bytes>() {
            Ok(bytes) => return Ok(*bytes),
            Err(object) => object,
        };
        let object = match object.downcast::<BytesMut>() {
            Ok(bytes) => return Ok(bytes.freeze()),
            Err(object) => object,
        };
        let object = match object.downcast::<Vec<u8>>() {
            Ok(bytes) => return Ok(Bytes::from(*bytes)),
            Err(object) => object,
        };
        let object = match object.downcast::<String>() {
            Ok(text) => return Ok(Bytes::from(*text)),
            Err(object) => object,
        };
        match object.downcast::<&'static str>() {
            Ok(text) => {
                let text: &'static str = *text;
                Ok(Bytes::from_static(text.as_bytes()))
            }
            Err(_) => Err(Error::new(
                ErrorKind::Unsupported,
                "transport cannot serialize this object; configure a codec",
            )),
        }
    }
}

impl From<Bytes> for WritePayload {
    fn from(bytes: Bytes) -> Self {
        WritePayload::Bytes(bytes)
    }
}

impl core::fmt::Debug for WritePayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WritePayload::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            WritePayload::Object(_) => f.debug_tuple("Object").finish_non_exhaustive(),
        }
    }
}

/// Transport trait for writing to the wire.
///
/// Called only from the channel's I/O dispatcher. Implementations must
/// settle every completion they receive, success or failure, exactly once.
pub trait Transport: Send + Sync {
    /// Writes one payload, flushing afterwards when `flush` is set.
    fn write(&self, payload: WritePayload, completion: Option<Completer>, flush: bool);

    /// Flushes any buffered data.
    fn flush(&self);
}
