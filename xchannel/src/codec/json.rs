use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{publish, Codec, Decoder, Encoder};
use crate::broadcast::Broadcaster;
use crate::error::{Error, ErrorKind, Result};

/// One JSON document per inbound unit, one per outbound value.
///
/// Pair with [`DelimitedCodec`](super::DelimitedCodec) when the wire
/// carries a stream of documents.
pub struct JsonCodec<IN, OUT> {
    _types: PhantomData<fn(OUT) -> IN>,
}

impl<IN, OUT> JsonCodec<IN, OUT> {
    pub fn new() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<IN, OUT> Default for JsonCodec<IN, OUT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<IN, OUT> Clone for JsonCodec<IN, OUT> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<IN, OUT> Codec<IN, OUT> for JsonCodec<IN, OUT>
where
    IN: DeserializeOwned + Clone + Send + 'static,
    OUT: Serialize + 'static,
{
    fn decoder(&self, target: Option<Broadcaster<IN>>) -> Decoder<IN> {
        Arc::new(move |bytes: Bytes| -> Result<Option<IN>> {
            let value: IN = serde_json::from_slice(&bytes)
                .map_err(|e| Error::with_source(ErrorKind::Decode, e))?;
            Ok(Some(publish(target.as_ref(), value)))
        })
    }

    fn encoder(&self) -> Encoder<OUT> {
        Arc::new(|value: OUT| -> Result<Bytes> {
            let json = serde_json::to_vec(&value)
                .map_err(|e| Error::with_source(ErrorKind::Encode, e))?;
            Ok(Bytes::from(json))
        })
    }
}
