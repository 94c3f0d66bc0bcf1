use std::sync::Arc;

use bytes::Bytes;

use super::{publish, Codec, Decoder, Encoder};
use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};

/// UTF-8 text. Invalid UTF-8 is a decode error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec<String, String> for StringCodec {
    fn decoder(&self, target: Option<Broadcaster<String>>) -> Decoder<String> {
        Arc::new(move |bytes: Bytes| -> Result<Option<String>> {
            let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                Error::decode(format!(
                    "invalid UTF-8 at byte {}",
                    e.utf8_error().valid_up_to()
                ))
            })?;
            Ok(Some(publish(target.as_ref(), text)))
        })
    }

    fn encoder(&self) -> Encoder<String> {
        Arc::new(|text: String| -> Result<Bytes> { Ok(Bytes::from(text)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_string_round_trip() {
        let codec = StringCodec;
        let bytes = codec.encoder()("héllo".to_string()).unwrap();
        assert_eq!(codec.decoder(None)(bytes).unwrap().unwrap(), "héllo");
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let err = StringCodec.decoder(None)(Bytes::from_static(&[0x61, 0xff])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.message().contains("byte 1"));
    }
}
