//! Frame verification and decode.
//!
//! Decode is a short pipeline: the length gate, then every verification in
//! declaration order (first failure wins), then every field. A rejected frame
//! never yields field values.

use crate::field::{decode_field, narrow_int, read_element_raw};
use crate::frame::Frame;
use crate::schema::{FrameDescriptor, VerifyCheck, VerifyDescriptor};
use tracing::{debug, trace};

/// Why a frame was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("frame length {actual} does not match declared length {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("checksum `{field}` mismatch: stored {stored:#x}, computed {computed:#x}")]
    ChecksumMismatch { field: String, stored: u64, computed: u64 },
    #[error("custom verification `{field}` failed")]
    CustomVerifyFailed { field: String },
}

/// Caller-supplied check for verifications declared `custom`.
///
/// Receives the verification name and the partially decoded frame: its source
/// bytes and any checksum values verified before it, but no field values yet.
pub trait CustomVerify {
    fn verify(&self, check: &str, frame: &Frame) -> bool;
}

impl<F> CustomVerify for F
where
    F: Fn(&str, &Frame) -> bool,
{
    fn verify(&self, check: &str, frame: &Frame) -> bool {
        self(check, frame)
    }
}

/// Accepts every custom verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CustomVerify for AcceptAll {
    fn verify(&self, _check: &str, _frame: &Frame) -> bool {
        true
    }
}

/// Verify `bytes` against `desc` and decode every field.
pub fn decode_frame(
    desc: &FrameDescriptor,
    bytes: &[u8],
    hook: &dyn CustomVerify,
) -> Result<Frame, Rejection> {
    let mut frame = Frame::default();
    decode_into(desc, bytes, hook, &mut frame)?;
    Ok(frame)
}

/// Like [`decode_frame`], but fills an existing frame. On rejection the frame is left empty.
pub fn decode_into(
    desc: &FrameDescriptor,
    bytes: &[u8],
    hook: &dyn CustomVerify,
    frame: &mut Frame,
) -> Result<(), Rejection> {
    frame.reset(desc.name(), bytes);
    let result = verify_and_fill(desc, bytes, hook, frame);
    match &result {
        Ok(()) => trace!(frame = desc.name(), fields = frame.len(), "frame accepted"),
        Err(reason) => {
            frame.reset(desc.name(), &[]);
            debug!(frame = desc.name(), %reason, "frame rejected");
        }
    }
    result
}

fn verify_and_fill(
    desc: &FrameDescriptor,
    bytes: &[u8],
    hook: &dyn CustomVerify,
    frame: &mut Frame,
) -> Result<(), Rejection> {
    if bytes.len() != desc.total_length() {
        return Err(Rejection::LengthMismatch { expected: desc.total_length(), actual: bytes.len() });
    }
    for v in desc.verifications() {
        verify_one(v, bytes, hook, frame)?;
    }
    for f in desc.fields() {
        frame.push(&f.name, decode_field(bytes, f));
    }
    Ok(())
}

fn verify_one(
    v: &VerifyDescriptor,
    bytes: &[u8],
    hook: &dyn CustomVerify,
    frame: &mut Frame,
) -> Result<(), Rejection> {
    let (algorithm, verify_start, verify_length) = match &v.check {
        VerifyCheck::Custom => {
            return if hook.verify(&v.name, frame) {
                Ok(())
            } else {
                Err(Rejection::CustomVerifyFailed { field: v.name.clone() })
            };
        }
        VerifyCheck::Checksum { algorithm, verify_start, verify_length, .. } => {
            (*algorithm, *verify_start, *verify_length)
        }
    };
    let Some(slot) = v.slot_field() else {
        return Ok(());
    };
    let width = comparison_bits(&v.check);
    let stored = read_element_raw(bytes, &slot, 0) & low_bits(width);
    let computed =
        algorithm.widened(&bytes[verify_start..verify_start + verify_length]) & low_bits(width);
    if stored != computed {
        return Err(Rejection::ChecksumMismatch { field: v.name.clone(), stored, computed });
    }
    frame.push(&v.name, narrow_int(slot.kind, stored as i64));
    Ok(())
}

/// Stored and computed checksums compare at the narrower of slot width and target kind.
pub fn comparison_bits(check: &VerifyCheck) -> u32 {
    match check {
        VerifyCheck::Checksum { kind, length, .. } => {
            let slot_bits = (*length as u32) * 8;
            kind.integer_bits().map_or(slot_bits, |k| k.min(slot_bits))
        }
        VerifyCheck::Custom => 0,
    }
}

fn low_bits(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
