use std::sync::Arc;

use bytes::Bytes;

use super::{publish, Codec, Decoder, Encoder};
use crate::broadcast::Broadcaster;
use crate::error::Result;

/// Hands bytes through untouched in both directions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughCodec;

impl Codec<Bytes, Bytes> for PassThroughCodec {
    fn decoder(&self, target: Option<Broadcaster<Bytes>>) -> Decoder<Bytes> {
        Arc::new(move |bytes: Bytes| -> Result<Option<Bytes>> {
            Ok(Some(publish(target.as_ref(), bytes)))
        })
    }

    fn encoder(&self) -> Encoder<Bytes> {
        Arc::new(|bytes: Bytes| -> Result<Bytes> { Ok(bytes) })
    }
}
