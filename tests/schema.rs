//! Schema tests: text format, validation errors, and loading from files.

use frameproto::schema::FieldFault;
use frameproto::{parse, Codec, Endianness, SchemaError, ValueKind};
use std::io::Write;

fn fault(source: &str) -> FieldFault {
    match parse(source) {
        Err(SchemaError::Field { fault, .. }) => fault,
        other => panic!("expected field fault, got {:?}", other),
    }
}

#[test]
fn test_attribute_order_is_free() {
    let a = parse("frame F(2) { x: i16 at 0 len 2 little shr 2 mask 0xFF scale 0.5; }").unwrap();
    let b = parse("frame F(2) { x: i16 at 0 len 2 scale 0.5 mask 0xFF shr 2 little; }").unwrap();
    assert_eq!(a.get_frame("F"), b.get_frame("F"));
    let x = a.get_frame("F").unwrap().field("x").unwrap();
    assert_eq!(x.kind, ValueKind::I16);
    assert_eq!(x.endianness, Endianness::Little);
    assert_eq!(x.scale, 0.5);
}

#[test]
fn test_algorithm_names_case_insensitive() {
    for name in ["crc16_modbus", "CRC16_MODBUS", "Crc16_Modbus", "bcc", "XOR"] {
        let src = format!("frame F(3) {{ c: i8 at 2 len 1 verify {} over 0 len 2; }}", name);
        assert!(parse(&src).is_ok(), "{}", name);
    }
}

#[test]
fn test_validation_faults() {
    assert_eq!(fault("frame F(2) { x: i8 at 0 len 0; }"), FieldFault::ZeroLength);
    assert_eq!(fault("frame F(9) { x: i64 at 0 len 9; }"), FieldFault::TooWide { bytes: 9 });
    assert_eq!(
        fault("frame F(2) { x: [i8] at 0 len 2 step 0; }"),
        FieldFault::ZeroStep
    );
    assert_eq!(
        fault("frame F(2) { x: i8 at 0 len 1 mask 0x6; }"),
        FieldFault::BadMask(0x6)
    );
    assert_eq!(
        fault("frame F(2) { x: i8 at 0 len 1 shr 8; }"),
        FieldFault::ShiftOverflow { shift: 8, bits: 8 }
    );
    assert_eq!(
        fault("frame F(2) { c: i8 at 1 len 1 verify sum8 over 0 len 3; }"),
        FieldFault::OutOfBounds { end: 3, total: 2 }
    );
    assert_eq!(
        fault("frame F(2) { x: f32 at 0 len 2 scale 0; }"),
        FieldFault::BadScale(0.0)
    );
    assert_eq!(
        fault("frame F(2) { on: bool at 0 len 1 scale 2.0; }"),
        FieldFault::ScaleOnNonNumeric(ValueKind::Bool)
    );
}

#[test]
fn test_frame_level_errors() {
    assert_eq!(
        parse("frame F(0) { }").unwrap_err(),
        SchemaError::ZeroFrameLength("F".into())
    );
    assert_eq!(
        parse("frame F(1) { }\nframe F(2) { }").unwrap_err(),
        SchemaError::DuplicateFrame("F".into())
    );
    assert_eq!(
        parse("frame F(2) { a: i8 at 0 len 1; a: verify custom; }").unwrap_err(),
        SchemaError::DuplicateField { frame: "F".into(), field: "a".into() }
    );
}

#[test]
fn test_error_names_frame_and_field() {
    let err = parse("frame Gauge(2) { level: i16 at 1 len 2; }").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Gauge") && text.contains("level"), "{}", text);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "// status frame").unwrap();
    writeln!(file, "frame Status(2) {{").unwrap();
    writeln!(file, "\tcode: i8 at 0 len 1;").unwrap();
    writeln!(file, "\tsum: i8 at 1 len 1 verify sum8 over 0 len 1;").unwrap();
    writeln!(file, "}}").unwrap();
    file.flush().unwrap();

    let source = std::fs::read_to_string(file.path()).unwrap();
    let codec = Codec::new(parse(&source).unwrap());
    let frame = codec.decode("Status", &[0x2A, 0x2A]).unwrap();
    assert_eq!(frame.get("code").and_then(|v| v.as_i64()), Some(42));
    assert!(codec.decode("Status", &[0x2A, 0x2B]).is_err());
}

#[test]
fn test_builder_matches_text() {
    use frameproto::{FieldDescriptor, FrameDescriptor, Schema};
    let built = FrameDescriptor::builder("F", 2)
        .field(FieldDescriptor::array("a", ValueKind::I8, 0, 2, 1).scale(2.0))
        .build()
        .unwrap();
    let parsed = parse("frame F(2) { a: [i8] at 0 len 2 step 1 scale 2.0; }").unwrap();
    assert_eq!(parsed.get_frame("F"), Some(&built));
    assert!(Schema::resolve(vec![built]).is_ok());
}

#[test]
fn test_built_frame_is_read_only() {
    use frameproto::{FieldDescriptor, FrameDescriptor};
    let built = FrameDescriptor::builder("Pair", 2)
        .field(FieldDescriptor::scalar("a", ValueKind::I8, 0, 1))
        .field(FieldDescriptor::scalar("b", ValueKind::I8, 1, 1))
        .build()
        .unwrap();
    assert_eq!(built.name(), "Pair");
    assert_eq!(built.total_length(), 2);
    assert_eq!(built.fields().len(), 2);
    assert!(built.verifications().is_empty());

    // Edits to a copied field never reach the frame that decodes.
    let mut copy = built.fields()[0].clone();
    copy.offset = 5;
    let codec = Codec::new(frameproto::Schema::resolve(vec![built]).unwrap());
    let frame = codec.decode("Pair", &[7, 9]).unwrap();
    assert_eq!(frame.get("a").and_then(|v| v.as_i64()), Some(7));
    assert_eq!(codec.frame("Pair").unwrap().field("a").unwrap().offset, 0);
}
