//! Field codec: move one field between a frame buffer and a [`Value`].
//!
//! Decode assembles the field's bytes into an unsigned 64-bit raw integer,
//! shifts, masks, scales and then narrows to the field's kind. Encode runs the
//! inverse. Masked fields are merged into whatever already occupies their
//! bytes so that several bit-packed fields can share one byte range.
//!
//! Descriptors are assumed validated (see [`crate::schema`]); buffers must
//! cover the field's extent or these functions panic on the slice.

use crate::codec::CodecError;
use crate::schema::{Endianness, FieldDescriptor, ValueKind};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// First byte most significant. Bytes beyond the eighth push the oldest out.
pub fn to_big_long(bytes: &[u8]) -> i64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64) as i64
}

/// First byte least significant.
pub fn to_little_long(bytes: &[u8]) -> i64 {
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64) as i64
}

pub fn read_raw(slot: &[u8], endianness: Endianness) -> u64 {
    match endianness {
        Endianness::Big => to_big_long(slot) as u64,
        Endianness::Little => to_little_long(slot) as u64,
    }
}

/// Write the low `slot.len()` bytes of `raw`; higher bytes are dropped.
pub fn write_raw(slot: &mut [u8], raw: u64, endianness: Endianness) {
    let n = slot.len();
    let raw = raw & low_bits(n as u32 * 8);
    match endianness {
        Endianness::Big => BigEndian::write_uint(slot, raw, n),
        Endianness::Little => LittleEndian::write_uint(slot, raw, n),
    }
}

/// Mask with the `bits` lowest bits set.
fn low_bits(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Replace the `mask` window at `shift_right` inside `current` with `value`,
/// leaving every bit outside the window unchanged. `mask` must be `2^n - 1`.
pub fn merge_bits(current: u64, value: u64, shift_right: u32, mask: u64) -> u64 {
    let width = mask.count_ones();
    let high = current.checked_shr(shift_right + width).unwrap_or(0);
    let low = current & low_bits(shift_right);
    let upper = high.checked_shl(width).unwrap_or(0) | (value & mask);
    upper.checked_shl(shift_right).unwrap_or(0) | low
}

/// Raw integer of element `index` after shift and mask, before scaling.
pub fn read_element_raw(buf: &[u8], desc: &FieldDescriptor, index: usize) -> u64 {
    let offset = desc.element_offset(index);
    let slot = &buf[offset..offset + desc.element_length()];
    let mut raw = read_raw(slot, desc.endianness);
    if desc.shift_right > 0 {
        raw >>= desc.shift_right;
    }
    if let Some(mask) = desc.mask {
        raw &= mask;
    }
    raw
}

/// Decode a field: a scalar, or an array of `element_count` scalars.
///
/// `desc` must come from a built [`FrameDescriptor`](crate::FrameDescriptor) whose
/// length `buf` matches; offsets are not checked again here.
pub fn decode_field(buf: &[u8], desc: &FieldDescriptor) -> Value {
    if desc.array {
        Value::Array((0..desc.element_count()).map(|i| decode_element(buf, desc, i)).collect())
    } else {
        decode_element(buf, desc, 0)
    }
}

fn decode_element(buf: &[u8], desc: &FieldDescriptor, index: usize) -> Value {
    let raw = read_element_raw(buf, desc, index) as i64;
    if desc.scale != 1.0 {
        narrow_float(desc.kind, raw as f64 * desc.scale)
    } else {
        narrow_int(desc.kind, raw)
    }
}

/// Truncate an integer to `kind`; bool is true only for exactly 1.
pub fn narrow_int(kind: ValueKind, raw: i64) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(raw == 1),
        ValueKind::I8 => Value::I8(raw as i8),
        ValueKind::I16 => Value::I16(raw as i16),
        ValueKind::I32 => Value::I32(raw as i32),
        ValueKind::I64 => Value::I64(raw),
        ValueKind::Char => {
            Value::Char(char::from_u32(raw as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        ValueKind::F32 => Value::F32(raw as f32),
        ValueKind::F64 => Value::F64(raw as f64),
    }
}

fn narrow_float(kind: ValueKind, x: f64) -> Value {
    match kind {
        ValueKind::F32 => Value::F32(x as f32),
        ValueKind::F64 => Value::F64(x),
        // Integer kinds truncate toward zero first.
        _ => narrow_int(kind, x as i64),
    }
}

/// Encode `value` into the field's bytes of `buf`.
pub fn encode_field(buf: &mut [u8], desc: &FieldDescriptor, value: &Value) -> Result<(), CodecError> {
    match (desc.array, value) {
        (true, Value::Array(items)) => {
            if items.len() != desc.element_count() {
                return Err(shape(
                    desc,
                    format!("expected {} elements, got {}", desc.element_count(), items.len()),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let raw = to_raw(desc, item)?;
                encode_element(buf, desc, i, raw);
            }
            Ok(())
        }
        (true, _) => Err(shape(desc, "array field needs an array value".to_string())),
        (false, Value::Array(_)) => Err(shape(desc, "scalar field given an array".to_string())),
        (false, v) => {
            let raw = to_raw(desc, v)?;
            encode_element(buf, desc, 0, raw);
            Ok(())
        }
    }
}

fn shape(desc: &FieldDescriptor, reason: String) -> CodecError {
    CodecError::ValueShape { field: desc.name.clone(), reason }
}

/// Raw integer for a scalar value, applying the inverse of decode scaling.
fn to_raw(desc: &FieldDescriptor, value: &Value) -> Result<u64, CodecError> {
    let raw = match value {
        Value::Bool(b) => *b as i64,
        Value::Char(c) => *c as i64,
        Value::F32(_) | Value::F64(_) => {
            let x = value.as_f64().unwrap_or_default();
            (x / desc.scale).round() as i64
        }
        Value::Array(_) => return Err(shape(desc, "nested arrays are not supported".to_string())),
        v => {
            let i = v.as_i64().unwrap_or_default();
            if desc.scale == 1.0 {
                i
            } else {
                (i as f64 / desc.scale).round() as i64
            }
        }
    };
    Ok(raw as u64)
}

fn encode_element(buf: &mut [u8], desc: &FieldDescriptor, index: usize, raw: u64) {
    let offset = desc.element_offset(index);
    let slot = &mut buf[offset..offset + desc.element_length()];
    match desc.mask {
        None => write_raw(slot, raw << desc.shift_right, desc.endianness),
        Some(mask) => {
            let current = read_raw(slot, desc.endianness);
            let merged = merge_bits(current, raw, desc.shift_right, mask);
            write_raw(slot, merged, desc.endianness);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_and_little_assembly() {
        assert_eq!(to_big_long(&[0x12, 0x34]), 0x1234);
        assert_eq!(to_little_long(&[0x12, 0x34]), 0x3412);
        assert_eq!(to_big_long(&[0xFF; 8]), -1);
        assert_eq!(to_big_long(&[]), 0);
    }

    #[test]
    fn bytes_are_unsigned_before_placement() {
        // No sign extension: 0xFF80 is 65408, the i16 narrowing makes it negative.
        let desc = FieldDescriptor::scalar("x", ValueKind::I32, 0, 2);
        assert_eq!(decode_field(&[0xFF, 0x80], &desc), Value::I32(0xFF80));
        let desc = FieldDescriptor::scalar("x", ValueKind::I16, 0, 2);
        assert_eq!(decode_field(&[0xFF, 0x80], &desc), Value::I16(-128));
    }

    #[test]
    fn shift_then_mask() {
        let desc = FieldDescriptor::scalar("mode", ValueKind::I8, 0, 1).shr(1).mask(0b111);
        assert_eq!(decode_field(&[0b1111_1010], &desc), Value::I8(0b101));
    }

    #[test]
    fn merge_preserves_neighbouring_bits() {
        let merged = merge_bits(0b1111_0000, 0b101, 1, 0b111);
        assert_eq!(merged, 0b1111_1010);
        // Value wider than the window is clipped to the window.
        assert_eq!(merge_bits(0, 0xFF, 2, 0b11), 0b1100);
        // Full-width mask replaces everything.
        assert_eq!(merge_bits(0xDEAD, 0xBEEF, 0, u64::MAX), 0xBEEF);
    }

    #[test]
    fn mask_encode_scenario() {
        let desc = FieldDescriptor::scalar("mode", ValueKind::I8, 0, 1).shr(1).mask(0b111);
        let mut buf = [0b1111_0000u8];
        encode_field(&mut buf, &desc, &Value::I8(0b101)).unwrap();
        assert_eq!(buf[0], 0b1111_1010);
    }

    #[test]
    fn bool_is_exactly_one() {
        let desc = FieldDescriptor::scalar("b", ValueKind::Bool, 0, 1);
        assert_eq!(decode_field(&[1], &desc), Value::Bool(true));
        assert_eq!(decode_field(&[2], &desc), Value::Bool(false));
    }

    #[test]
    fn scaled_decode_and_encode() {
        let desc = FieldDescriptor::scalar("t", ValueKind::F32, 0, 2).scale(0.1);
        let mut buf = [0u8; 2];
        encode_field(&mut buf, &desc, &Value::F32(21.5)).unwrap();
        assert_eq!(buf, [0x00, 0xD7]);
        assert_eq!(decode_field(&buf, &desc), Value::F32(21.5));
        // Integer kinds truncate the scaled value.
        let desc = FieldDescriptor::scalar("t", ValueKind::I16, 0, 2).scale(0.1);
        assert_eq!(decode_field(&buf, &desc), Value::I16(21));
    }

    #[test]
    fn little_endian_array() {
        let desc = FieldDescriptor::array("a", ValueKind::I16, 1, 4, 2).little();
        let buf = [0xAA, 0x01, 0x00, 0x02, 0x01];
        assert_eq!(
            decode_field(&buf, &desc),
            Value::Array(vec![Value::I16(1), Value::I16(0x0102)])
        );
        let mut out = [0xAAu8, 0, 0, 0, 0];
        encode_field(&mut out, &desc, &decode_field(&buf, &desc)).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn array_shape_checked() {
        let desc = FieldDescriptor::array("a", ValueKind::I8, 0, 2, 1);
        let mut buf = [0u8; 2];
        assert!(encode_field(&mut buf, &desc, &Value::I8(1)).is_err());
        assert!(encode_field(&mut buf, &desc, &vec![1i8].into()).is_err());
        let scalar = FieldDescriptor::scalar("s", ValueKind::I8, 0, 1);
        assert!(encode_field(&mut buf, &scalar, &vec![1i8].into()).is_err());
    }

    #[test]
    fn narrowing_wraps() {
        let desc = FieldDescriptor::scalar("x", ValueKind::I8, 0, 2);
        let mut buf = [0u8; 2];
        encode_field(&mut buf, &desc, &Value::I16(0x1234)).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
        assert_eq!(decode_field(&buf, &desc), Value::I8(0x34));
    }

    #[test]
    fn char_field() {
        let desc = FieldDescriptor::scalar("c", ValueKind::Char, 0, 1);
        let mut buf = [0u8];
        encode_field(&mut buf, &desc, &Value::Char('Z')).unwrap();
        assert_eq!(buf, [b'Z']);
        assert_eq!(decode_field(&buf, &desc), Value::Char('Z'));
    }

    #[test]
    fn big_equals_little_of_reversed() {
        let bytes = [0x01, 0x80, 0xFE, 0x7F, 0x00, 0x33];
        let mut reversed = bytes;
        reversed.reverse();
        assert_eq!(to_big_long(&bytes), to_little_long(&reversed));
    }

    #[test]
    fn encode_touches_only_its_window() {
        let desc = FieldDescriptor::scalar("w", ValueKind::I16, 1, 2).shr(3).mask(0x3F);
        let mut buf = [0xFFu8; 4];
        encode_field(&mut buf, &desc, &Value::I16(0)).unwrap();
        // Bits 3 through 8 of the big-endian slot cleared, everything else intact.
        assert_eq!(buf, [0xFF, 0b1111_1110, 0b0000_0111, 0xFF]);
        let unmasked = FieldDescriptor::scalar("u", ValueKind::I8, 2, 1);
        let mut buf = [0xAAu8; 4];
        encode_field(&mut buf, &unmasked, &Value::I8(0)).unwrap();
        assert_eq!(buf, [0xAA, 0xAA, 0x00, 0xAA]);
    }

    #[test]
    fn i16_round_trip_both_orders() {
        for endianness in [Endianness::Big, Endianness::Little] {
            let desc = FieldDescriptor::scalar("x", ValueKind::I16, 0, 2).endian(endianness);
            let mut buf = [0u8; 2];
            for v in (i16::MIN..=i16::MAX).step_by(97) {
                encode_field(&mut buf, &desc, &Value::I16(v)).unwrap();
                assert_eq!(decode_field(&buf, &desc), Value::I16(v));
            }
        }
    }

    #[test]
    fn unmasked_shift_round_trips() {
        let desc = FieldDescriptor::scalar("x", ValueKind::I16, 0, 2).shr(4);
        let mut buf = [0u8; 2];
        encode_field(&mut buf, &desc, &Value::I16(0x0ABC)).unwrap();
        assert_eq!(buf, [0xAB, 0xC0]);
        assert_eq!(decode_field(&buf, &desc), Value::I16(0x0ABC));
    }
}
