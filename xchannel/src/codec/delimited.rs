use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use super::{Codec, Decoder, Encoder};
use crate::broadcast::Broadcaster;
use crate::error::Result;

/// Frames an inner codec on a delimiter byte.
///
/// Inbound bytes are buffered until a delimiter arrives; each complete
/// frame, delimiter stripped, goes to the inner decoder. Empty frames are
/// skipped. Outbound values get the delimiter appended after encoding.
#[derive(Debug, Clone)]
pub struct DelimitedCodec<C> {
    inner: C,
    delimiter: u8,
}

impl<C> DelimitedCodec<C> {
    pub fn new(inner: C, delimiter: u8) -> Self {
        Self { inner, delimiter }
    }

    /// Newline-delimited framing.
    pub fn lines(inner: C) -> Self {
        Self::new(inner, b'\n')
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl<IN, OUT, C> Codec<IN, OUT> for DelimitedCodec<C>
where
    C: Codec<IN, OUT>,
    IN: 'static,
    OUT: 'static,
{
    fn decoder(&self, target: Option<Broadcaster<IN>>) -> Decoder<IN> {
        let inner = self.inner.decoder(target);
        let delimiter = self.delimiter;
        let pending = Mutex::new(BytesMut::new());

        Arc::new(move |bytes: Bytes| -> Result<Option<IN>> {
            let mut pending = pending.lock();
            pending.extend_from_slice(&bytes);

            let mut last = None;
            while let Some(pos) = pending.iter().position(|b| *b == delimiter) {
                let mut frame = pending.split_to(pos + 1);
                frame.truncate(pos);
                if frame.is_empty() {
                    continue;
                }
                if let Some(value) = inner(frame.freeze())? {
                    last = Some(value);
                }
            }
            Ok(last)
        })
    }

    fn encoder(&self) -> Encoder<OUT> {
        let inner = self.inner.encoder();
        let delimiter = self.delimiter;

        Arc::new(move |value: OUT| -> Result<Bytes> {
            let encoded = inner(value)?;
            let mut framed = BytesMut::with_capacity(encoded.len() + 1);
            framed.extend_from_slice(&encoded);
            framed.put_u8(delimiter);
            Ok(framed.freeze())
        })
    }
}
