//! Frame schema: field, checksum and frame descriptors, plus the validation that
//! turns a description into something the codec can run on.
//!
//! Descriptors are immutable once built. Every check that can fail lives here,
//! so decode and encode never have to re-validate offsets, masks or kinds.

use crate::checksum::Algorithm;
use std::collections::HashMap;
use std::fmt;

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Target scalar representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Char,
    F32,
    F64,
}

impl ValueKind {
    pub const ALL: [ValueKind; 8] = [
        ValueKind::Bool,
        ValueKind::I8,
        ValueKind::I16,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::Char,
        ValueKind::F32,
        ValueKind::F64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::Char => "char",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ValueKind::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Integer kinds are the only valid checksum targets.
    pub fn is_integer(self) -> bool {
        matches!(self, ValueKind::I8 | ValueKind::I16 | ValueKind::I32 | ValueKind::I64)
    }

    /// Bit width of an integer kind.
    pub fn integer_bits(self) -> Option<u32> {
        match self {
            ValueKind::I8 => Some(8),
            ValueKind::I16 => Some(16),
            ValueKind::I32 => Some(32),
            ValueKind::I64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scalar or array field within a frame.
///
/// For arrays, `length` is the total byte span and `step` the stride of one
/// element; the element count is `length / step`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: ValueKind,
    pub offset: usize,
    pub length: usize,
    pub array: bool,
    pub step: usize,
    pub endianness: Endianness,
    pub scale: f64,
    pub shift_right: u32,
    pub mask: Option<u64>,
}

impl FieldDescriptor {
    pub fn scalar(name: impl Into<String>, kind: ValueKind, offset: usize, length: usize) -> Self {
        FieldDescriptor {
            name: name.into(),
            kind,
            offset,
            length,
            array: false,
            step: 0,
            endianness: Endianness::Big,
            scale: 1.0,
            shift_right: 0,
            mask: None,
        }
    }

    pub fn array(
        name: impl Into<String>,
        kind: ValueKind,
        offset: usize,
        length: usize,
        step: usize,
    ) -> Self {
        FieldDescriptor {
            array: true,
            step,
            ..FieldDescriptor::scalar(name, kind, offset, length)
        }
    }

    pub fn endian(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn little(self) -> Self {
        self.endian(Endianness::Little)
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn shr(mut self, bits: u32) -> Self {
        self.shift_right = bits;
        self
    }

    pub fn mask(mut self, mask: u64) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn element_count(&self) -> usize {
        if !self.array {
            return 1;
        }
        if self.step == 0 {
            0
        } else {
            self.length / self.step
        }
    }

    /// Byte length of one element (the whole field for scalars).
    pub fn element_length(&self) -> usize {
        if self.array {
            self.step
        } else {
            self.length
        }
    }

    /// Byte offset of element `i`.
    pub fn element_offset(&self, i: usize) -> usize {
        self.offset + i * self.element_length()
    }

    /// One past the last byte this field touches.
    pub fn end(&self) -> usize {
        if self.array {
            self.offset + self.step * self.element_count()
        } else {
            self.offset + self.length
        }
    }

    /// Number of bits selected by `mask`, when the mask is a contiguous low run of ones.
    pub fn mask_width(&self) -> Option<u32> {
        self.mask.and_then(contiguous_width)
    }

    fn validate(&self, total_length: usize) -> Result<(), FieldFault> {
        if self.length == 0 {
            return Err(FieldFault::ZeroLength);
        }
        if self.array {
            if self.step == 0 {
                return Err(FieldFault::ZeroStep);
            }
            if self.step > 8 {
                return Err(FieldFault::TooWide { bytes: self.step });
            }
            if self.element_count() == 0 {
                return Err(FieldFault::EmptyArray { length: self.length, step: self.step });
            }
        } else if self.length > 8 {
            return Err(FieldFault::TooWide { bytes: self.length });
        }
        let extent = self.element_length() * self.element_count();
        check_bounds(self.offset, extent, total_length)?;
        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(FieldFault::BadScale(self.scale));
        }
        if self.scale != 1.0 && matches!(self.kind, ValueKind::Bool | ValueKind::Char) {
            return Err(FieldFault::ScaleOnNonNumeric(self.kind));
        }
        let bits = (self.element_length() * 8) as u32;
        if self.shift_right >= bits {
            return Err(FieldFault::ShiftOverflow { shift: self.shift_right, bits });
        }
        if let Some(mask) = self.mask {
            let width = contiguous_width(mask).ok_or(FieldFault::BadMask(mask))?;
            if self.shift_right + width > bits {
                return Err(FieldFault::WindowOverflow { shift: self.shift_right, width, bits });
            }
        }
        Ok(())
    }
}

/// `start..start+length` must lie inside the frame. Overflow counts as out of bounds.
fn check_bounds(start: usize, length: usize, total: usize) -> Result<(), FieldFault> {
    match start.checked_add(length) {
        Some(end) if end <= total => Ok(()),
        end => Err(FieldFault::OutOfBounds { end: end.unwrap_or(usize::MAX), total }),
    }
}

/// `Some(n)` when `mask == 2^n - 1` with `n >= 1`.
fn contiguous_width(mask: u64) -> Option<u32> {
    if mask != 0 && mask & mask.wrapping_add(1) == 0 {
        Some(mask.count_ones())
    } else {
        None
    }
}

/// How a verification is carried out.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyCheck {
    /// Stored checksum at `offset..offset+length`, recomputed over
    /// `verify_start..verify_start+verify_length`.
    Checksum {
        algorithm: Algorithm,
        kind: ValueKind,
        offset: usize,
        length: usize,
        verify_start: usize,
        verify_length: usize,
        endianness: Endianness,
    },
    /// Delegated to a caller-supplied hook.
    Custom,
}

/// One integrity check applied at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyDescriptor {
    pub name: String,
    pub check: VerifyCheck,
}

impl VerifyDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn checksum(
        name: impl Into<String>,
        kind: ValueKind,
        algorithm: Algorithm,
        offset: usize,
        length: usize,
        verify_start: usize,
        verify_length: usize,
        endianness: Endianness,
    ) -> Self {
        VerifyDescriptor {
            name: name.into(),
            check: VerifyCheck::Checksum {
                algorithm,
                kind,
                offset,
                length,
                verify_start,
                verify_length,
                endianness,
            },
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        VerifyDescriptor { name: name.into(), check: VerifyCheck::Custom }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.check, VerifyCheck::Custom)
    }

    /// The stored checksum slot seen as an ordinary scalar field.
    pub fn slot_field(&self) -> Option<FieldDescriptor> {
        match &self.check {
            VerifyCheck::Checksum { kind, offset, length, endianness, .. } => Some(
                FieldDescriptor::scalar(self.name.clone(), *kind, *offset, *length).endian(*endianness),
            ),
            VerifyCheck::Custom => None,
        }
    }

    fn validate(&self, total_length: usize) -> Result<(), FieldFault> {
        let VerifyCheck::Checksum { kind, offset, length, verify_start, verify_length, .. } = &self.check
        else {
            return Ok(());
        };
        if !kind.is_integer() {
            return Err(FieldFault::ChecksumKind(*kind));
        }
        if *length == 0 {
            return Err(FieldFault::ZeroLength);
        }
        if *length > 8 {
            return Err(FieldFault::TooWide { bytes: *length });
        }
        check_bounds(*offset, *length, total_length)?;
        check_bounds(*verify_start, *verify_length, total_length)
    }
}

/// One protocol frame type: a fixed length, ordered fields and verifications.
///
/// Only [`FrameBuilder::build`] produces one, so every descriptor reachable from
/// a `FrameDescriptor` has passed validation and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    name: String,
    total_length: usize,
    fields: Vec<FieldDescriptor>,
    verifications: Vec<VerifyDescriptor>,
}

impl FrameDescriptor {
    pub fn builder(name: impl Into<String>, total_length: usize) -> FrameBuilder {
        FrameBuilder {
            frame: FrameDescriptor {
                name: name.into(),
                total_length,
                fields: Vec::new(),
                verifications: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn verifications(&self) -> &[VerifyDescriptor] {
        &self.verifications
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn verification(&self, name: &str) -> Option<&VerifyDescriptor> {
        self.verifications.iter().find(|v| v.name == name)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.total_length == 0 {
            return Err(SchemaError::ZeroFrameLength(self.name.clone()));
        }
        let mut seen = HashMap::new();
        let names = self
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.verifications.iter().map(|v| v.name.as_str()));
        for name in names {
            if seen.insert(name, ()).is_some() {
                return Err(SchemaError::DuplicateField {
                    frame: self.name.clone(),
                    field: name.to_string(),
                });
            }
        }
        for f in &self.fields {
            f.validate(self.total_length).map_err(|fault| self.fault(&f.name, fault))?;
        }
        for v in &self.verifications {
            v.validate(self.total_length).map_err(|fault| self.fault(&v.name, fault))?;
        }
        Ok(())
    }

    fn fault(&self, field: &str, fault: FieldFault) -> SchemaError {
        SchemaError::Field { frame: self.name.clone(), field: field.to_string(), fault }
    }
}

/// Collects fields and verifications, then validates them all at once.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    frame: FrameDescriptor,
}

impl FrameBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.frame.fields.push(field);
        self
    }

    pub fn verify(mut self, verify: VerifyDescriptor) -> Self {
        self.frame.verifications.push(verify);
        self
    }

    pub fn build(self) -> Result<FrameDescriptor, SchemaError> {
        self.frame.validate()?;
        Ok(self.frame)
    }
}

/// A set of validated frames, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    frames: Vec<FrameDescriptor>,
    frames_by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn resolve(frames: Vec<FrameDescriptor>) -> Result<Self, SchemaError> {
        let mut frames_by_name = HashMap::new();
        for (i, f) in frames.iter().enumerate() {
            f.validate()?;
            if frames_by_name.insert(f.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateFrame(f.name.clone()));
            }
        }
        Ok(Schema { frames, frames_by_name })
    }

    pub fn get_frame(&self, name: &str) -> Option<&FrameDescriptor> {
        self.frames_by_name.get(name).map(|&i| &self.frames[i])
    }

    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }
}

/// Schema-definition failure. A schema that produces one of these never yields a codec.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Parse: {0}")]
    Parse(String),
    #[error("frame `{0}`: total length must be positive")]
    ZeroFrameLength(String),
    #[error("duplicate frame name: {0}")]
    DuplicateFrame(String),
    #[error("frame `{frame}`: duplicate field name `{field}`")]
    DuplicateField { frame: String, field: String },
    #[error("frame `{frame}`, field `{field}`: unsupported value kind `{kind}`")]
    UnsupportedKind { frame: String, field: String, kind: String },
    #[error("frame `{frame}`, field `{field}`: unknown checksum algorithm `{algorithm}`")]
    UnknownAlgorithm { frame: String, field: String, algorithm: String },
    #[error("frame `{frame}`, field `{field}`: {fault}")]
    Field { frame: String, field: String, fault: FieldFault },
}

/// What is wrong with a single field or checksum slot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldFault {
    #[error("length must be positive")]
    ZeroLength,
    #[error("array field needs a non-zero step")]
    ZeroStep,
    #[error("array length {length} holds no element of step {step}")]
    EmptyArray { length: usize, step: usize },
    #[error("{bytes} bytes exceed the 8-byte raw integer")]
    TooWide { bytes: usize },
    #[error("ends at byte {end}, beyond frame length {total}")]
    OutOfBounds { end: usize, total: usize },
    #[error("scale {0} must be finite and non-zero")]
    BadScale(f64),
    #[error("shift {shift} leaves nothing of a {bits}-bit field")]
    ShiftOverflow { shift: u32, bits: u32 },
    #[error("{0} fields cannot be scaled")]
    ScaleOnNonNumeric(ValueKind),
    #[error("mask {0:#x} is not of the form 2^n - 1")]
    BadMask(u64),
    #[error("shift {shift} plus mask width {width} exceeds {bits} bits")]
    WindowOverflow { shift: u32, width: u32, bits: u32 },
    #[error("checksum target must be an integer kind, found {0}")]
    ChecksumKind(ValueKind),
    #[error("checksum target cannot be an array")]
    ChecksumArray,
}
