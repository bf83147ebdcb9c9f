//! # frameproto — Declarative Fixed-Length Frame Codec
//!
//! Describe a binary frame once (field offsets, lengths, byte order, bit windows,
//! scale factors and checksums) and get both directions from it: bytes to a
//! verified [`Frame`] of typed [`Value`]s, and typed values back to bytes.
//!
//! ## Schema text
//!
//! ```text
//! frame Sensor(12) {
//! 	head: i16 at 0 len 2;
//! 	enabled: bool at 2 len 1 mask 0x1;
//! 	mode: i8 at 2 len 1 shr 1 mask 0x7;
//! 	temps: [f32] at 3 len 6 step 2 little scale 0.1;
//! 	crc: i16 at 10 len 2 verify crc16_modbus over 0 len 10 little;
//! 	extra: verify custom;
//! }
//! ```
//!
//! - Kinds: `bool`, `i8`, `i16`, `i32`, `i64`, `char`, `f32`, `f64`; `[kind]` for arrays
//! - Attributes: `step N`, `big` / `little`, `scale F`, `shr N`, `mask N`,
//!   `verify ALGORITHM over START len N`
//! - Checksums: CRC-8/16/32 variants, SUM8, SUM16, LRC, BCC (see [`Algorithm`])
//!
//! Descriptors can also be built directly with [`FrameDescriptor::builder`].
//!
//! ## Decode and encode
//!
//! A frame is accepted only if its length matches and every verification passes;
//! then every field is decoded. Encoding writes fields in any order and computes
//! checksums last with [`FrameEncoder::write_checksums`].
//!
//! ```
//! use frameproto::{parse, Codec, Value};
//!
//! let schema = parse("frame Ping(3) { seq: i16 at 0 len 2; sum: i8 at 2 len 1 verify sum8 over 0 len 2; }")?;
//! let codec = Codec::new(schema);
//! let mut enc = codec.encoder("Ping")?;
//! enc.set("seq", 0x0102i16)?.write_checksums();
//! let bytes = enc.finish();
//! assert_eq!(bytes, [0x01, 0x02, 0x03]);
//! let frame = codec.decode("Ping", &bytes)?;
//! assert_eq!(frame.get("seq"), Some(&Value::I16(0x0102)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod checksum;
pub mod codec;
pub mod field;
pub mod frame;
pub mod lint;
pub mod parser;
pub mod pool;
pub mod schema;
pub mod value;
pub mod verify;

pub use assemble::FrameEncoder;
pub use checksum::Algorithm;
pub use codec::{Codec, CodecError};
pub use frame::Frame;
pub use parser::parse;
pub use pool::{FramePool, PoolError, DEFAULT_POOL_CAPACITY};
pub use schema::{
    Endianness, FieldDescriptor, FrameDescriptor, Schema, SchemaError, ValueKind,
    VerifyDescriptor,
};
pub use value::Value;
pub use verify::{decode_frame, AcceptAll, CustomVerify, Rejection};
