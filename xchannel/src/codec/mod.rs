//! Codec boundary between wire bytes and domain values.
//!
//! A [`Codec`] produces a decoder and an encoder as a pair. The decoder
//! closes over the inbound [`Broadcaster`] it is built for and pushes
//! every value it decodes into it; it also returns the last value so
//! codecs can be used standalone.
//!
//! # Implementations
//!
//! - [`PassThroughCodec`]: bytes in, bytes out
//! - [`StringCodec`]: UTF-8 text
//! - [`JsonCodec`]: serde JSON documents
//! - [`DelimitedCodec`]: frames any codec on a delimiter byte

mod delimited;
mod json;
mod passthrough;
mod string;

use std::sync::Arc;

use bytes::Bytes;

use crate::broadcast::Broadcaster;
use crate::error::Result;

pub use delimited::DelimitedCodec;
pub use json::JsonCodec;
pub use passthrough::PassThroughCodec;
pub use string::StringCodec;

/// Turns one inbound unit into zero or more values, publishing each.
pub type Decoder<IN> = Arc<dyn Fn(Bytes) -> Result<Option<IN>> + Send + Sync>;

/// Turns one outbound value into wire bytes. An empty result means
/// "nothing to write".
pub type Encoder<OUT> = Arc<dyn Fn(OUT) -> Result<Bytes> + Send + Sync>;

pub trait Codec<IN, OUT>: Send + Sync {
    /// Builds a decoder publishing into `target`, if given.
    fn decoder(&self, target: Option<Broadcaster<IN>>) -> Decoder<IN>;

    fn encoder(&self) -> Encoder<OUT>;
}

/// Pushes `value` into `target` and hands it back.
pub(crate) fn publish<IN>(target: Option<&Broadcaster<IN>>, value: IN) -> IN
where
    IN: Clone + Send + 'static,
{
    if let Some(target) = target {
        target.next(value.clone());
    }
    value
}
