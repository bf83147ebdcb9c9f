//! Name-keyed entry point over a resolved [`Schema`]: decode bytes into frames
//! and start encoders, optionally drawing frames from a [`FramePool`].

use crate::assemble::FrameEncoder;
use crate::frame::Frame;
use crate::pool::{FramePool, PoolError};
use crate::schema::{FrameDescriptor, Schema};
use crate::verify::{decode_frame, decode_into, AcceptAll, CustomVerify, Rejection};

#[derive(Debug)]
pub struct Codec {
    schema: Schema,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown frame: {0}")]
    UnknownFrame(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("field `{field}`: {reason}")]
    ValueShape { field: String, reason: String },
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("Pool: {0}")]
    Pool(#[from] PoolError),
}

impl Codec {
    pub fn new(schema: Schema) -> Self {
        Codec { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn frame(&self, name: &str) -> Result<&FrameDescriptor, CodecError> {
        self.schema.get_frame(name).ok_or_else(|| CodecError::UnknownFrame(name.to_string()))
    }

    /// Declared byte length of a frame type.
    pub fn frame_length(&self, name: &str) -> Result<usize, CodecError> {
        Ok(self.frame(name)?.total_length())
    }

    /// Decode a frame; custom verifications pass.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Result<Frame, CodecError> {
        self.decode_with(name, bytes, &AcceptAll)
    }

    /// Decode a frame, delegating custom verifications to `hook`.
    pub fn decode_with(
        &self,
        name: &str,
        bytes: &[u8],
        hook: &dyn CustomVerify,
    ) -> Result<Frame, CodecError> {
        Ok(decode_frame(self.frame(name)?, bytes, hook)?)
    }

    /// Decode into a frame taken from `pool`. A rejected frame goes straight back.
    pub fn decode_pooled(
        &self,
        pool: &FramePool,
        name: &str,
        bytes: &[u8],
        hook: &dyn CustomVerify,
    ) -> Result<Frame, CodecError> {
        let desc = self.frame(name)?;
        let mut frame = pool.obtain();
        match decode_into(desc, bytes, hook, &mut frame) {
            Ok(()) => Ok(frame),
            Err(rejection) => {
                pool.recycle(frame)?;
                Err(rejection.into())
            }
        }
    }

    /// Encoder over `total_length` zero bytes.
    pub fn encoder(&self, name: &str) -> Result<FrameEncoder<'_>, CodecError> {
        Ok(FrameEncoder::new(self.frame(name)?))
    }

    /// Encoder seeded from a decoded frame's bytes.
    pub fn encoder_from(&self, frame: &Frame) -> Result<FrameEncoder<'_>, CodecError> {
        FrameEncoder::from_frame(self.frame(frame.name())?, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, ValueKind};
    use crate::value::Value;

    fn codec() -> Codec {
        let f = FrameDescriptor::builder("Ping", 2)
            .field(FieldDescriptor::scalar("seq", ValueKind::I16, 0, 2))
            .build()
            .unwrap();
        Codec::new(Schema::resolve(vec![f]).unwrap())
    }

    #[test]
    fn unknown_frame() {
        let c = codec();
        assert!(matches!(c.decode("Pong", &[0, 0]), Err(CodecError::UnknownFrame(_))));
        assert!(matches!(c.encoder("Pong"), Err(CodecError::UnknownFrame(_))));
        assert_eq!(c.frame_length("Ping").unwrap(), 2);
    }

    #[test]
    fn pooled_decode_returns_rejected_frames() {
        let c = codec();
        let pool = FramePool::new(4);
        let f = c.decode_pooled(&pool, "Ping", &[0, 7], &AcceptAll).unwrap();
        assert_eq!(f.get("seq"), Some(&Value::I16(7)));
        pool.recycle(f).unwrap();
        assert!(c.decode_pooled(&pool, "Ping", &[0], &AcceptAll).is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn re_encode_from_decoded_frame() {
        let c = codec();
        let f = c.decode("Ping", &[0x01, 0x02]).unwrap();
        let mut enc = c.encoder_from(&f).unwrap();
        enc.set("seq", 0x0103i16).unwrap();
        assert_eq!(enc.finish(), vec![0x01, 0x03]);
    }
}
