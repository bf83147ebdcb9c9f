//! Frame assembly: write field values into a fixed-length buffer.
//!
//! Checksums are written only when asked. The usual order is: set the body
//! fields, then call [`FrameEncoder::write_checksums`] so each checksum is
//! computed over the finished body.

use crate::codec::CodecError;
use crate::field::{encode_field, write_raw};
use crate::frame::Frame;
use crate::schema::{FieldDescriptor, FrameDescriptor, VerifyCheck};
use crate::value::Value;
use crate::verify::Rejection;

#[derive(Debug, Clone)]
pub struct FrameEncoder<'a> {
    desc: &'a FrameDescriptor,
    buf: Vec<u8>,
}

impl<'a> FrameEncoder<'a> {
    /// Start from `total_length` zero bytes.
    pub fn new(desc: &'a FrameDescriptor) -> Self {
        FrameEncoder { desc, buf: vec![0u8; desc.total_length()] }
    }

    /// Start from a copy of existing frame bytes, e.g. a template with defaults.
    pub fn from_bytes(desc: &'a FrameDescriptor, seed: &[u8]) -> Result<Self, CodecError> {
        if seed.len() != desc.total_length() {
            return Err(Rejection::LengthMismatch { expected: desc.total_length(), actual: seed.len() }
                .into());
        }
        Ok(FrameEncoder { desc, buf: seed.to_vec() })
    }

    /// Start from a previously decoded frame's source bytes.
    pub fn from_frame(desc: &'a FrameDescriptor, frame: &Frame) -> Result<Self, CodecError> {
        Self::from_bytes(desc, frame.src())
    }

    pub fn descriptor(&self) -> &FrameDescriptor {
        self.desc
    }

    /// Encode one field (or a checksum slot, treated as a plain integer field).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, CodecError> {
        let value = value.into();
        let desc = self.desc;
        match desc.field(name) {
            Some(f) => encode_field(&mut self.buf, f, &value)?,
            None => {
                let slot = self.checksum_slot(name)?;
                encode_field(&mut self.buf, &slot, &value)?;
            }
        }
        Ok(self)
    }

    /// Set several fields; order does not matter for disjoint bit windows.
    pub fn set_all<'v, I>(&mut self, values: I) -> Result<&mut Self, CodecError>
    where
        I: IntoIterator<Item = (&'v str, Value)>,
    {
        for (name, value) in values {
            self.set(name, value)?;
        }
        Ok(self)
    }

    /// Hand the raw byte slot of a field to `f` for direct editing.
    pub fn with_field_bytes<F>(&mut self, name: &str, f: F) -> Result<&mut Self, CodecError>
    where
        F: FnOnce(&mut [u8]),
    {
        let (start, end) = match self.desc.field(name) {
            Some(field) => (field.offset, field.end()),
            None => {
                let slot = self.checksum_slot(name)?;
                (slot.offset, slot.end())
            }
        };
        f(&mut self.buf[start..end]);
        Ok(self)
    }

    /// Compute one checksum over the current buffer and store it in its slot.
    pub fn write_checksum(&mut self, name: &str) -> Result<&mut Self, CodecError> {
        let desc = self.desc;
        let v = desc
            .verification(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))?;
        if let VerifyCheck::Checksum {
            algorithm,
            offset,
            length,
            verify_start,
            verify_length,
            endianness,
            ..
        } = &v.check
        {
            let sum = algorithm.widened(&self.buf[*verify_start..verify_start + verify_length]);
            write_raw(&mut self.buf[*offset..offset + length], sum, *endianness);
        }
        Ok(self)
    }

    /// Compute and store every built-in checksum, in declaration order.
    pub fn write_checksums(&mut self) -> &mut Self {
        let desc = self.desc;
        for v in desc.verifications().iter().filter(|v| !v.is_custom()) {
            // Names come from the descriptor itself, so lookup cannot fail.
            let _ = self.write_checksum(&v.name);
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn checksum_slot(&self, name: &str) -> Result<FieldDescriptor, CodecError> {
        self.desc
            .verification(name)
            .and_then(|v| v.slot_field())
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }
}
