//! Parse schema text into a validated [`Schema`] using PEST.

use crate::checksum::Algorithm;
use crate::schema::{
    Endianness, FieldDescriptor, FieldFault, FrameDescriptor, Schema, SchemaError, ValueKind,
    VerifyDescriptor,
};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse schema source and resolve it. Every frame is validated before return.
pub fn parse(source: &str) -> Result<Schema, SchemaError> {
    Schema::resolve(parse_frames(source)?)
}

/// Parse schema source into validated frame descriptors, in source order.
pub fn parse_frames(source: &str) -> Result<Vec<FrameDescriptor>, SchemaError> {
    let pairs = SchemaParser::parse(Rule::schema, source)
        .map_err(|e| SchemaError::Parse(format!("Parse error: {}", e)))?;
    let pair = pairs.into_iter().next().ok_or_else(|| parse_error("empty parse"))?;
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::frame_def)
        .map(build_frame)
        .collect()
}

enum Declaration {
    Field(FieldDescriptor),
    Verify(VerifyDescriptor),
}

#[derive(Default)]
struct Attributes {
    step: Option<usize>,
    endianness: Endianness,
    scale: Option<f64>,
    shift_right: Option<u32>,
    mask: Option<u64>,
    verify: Option<(String, usize, usize)>,
}

fn build_frame(pair: Pair<Rule>) -> Result<FrameDescriptor, SchemaError> {
    let mut it = pair.into_inner();
    let name = next(&mut it, "frame name")?.as_str().to_string();
    let total_length = parse_usize(next(&mut it, "frame length")?)?;
    let mut builder = FrameDescriptor::builder(name.clone(), total_length);
    for field in it.filter(|p| p.as_rule() == Rule::field_def) {
        builder = match build_field(&name, field)? {
            Declaration::Field(f) => builder.field(f),
            Declaration::Verify(v) => builder.verify(v),
        };
    }
    builder.build()
}

fn build_field(frame: &str, pair: Pair<Rule>) -> Result<Declaration, SchemaError> {
    let mut it = pair.into_inner();
    let name = next(&mut it, "field name")?.as_str().to_string();
    let body = next(&mut it, "field body")?;
    if body.as_rule() == Rule::custom_verify {
        return Ok(Declaration::Verify(VerifyDescriptor::custom(name)));
    }

    let mut it = body.into_inner();
    let (array, kind_name) = build_type_spec(next(&mut it, "field type")?)?;
    let kind = ValueKind::from_name(kind_name).ok_or_else(|| SchemaError::UnsupportedKind {
        frame: frame.to_string(),
        field: name.clone(),
        kind: kind_name.to_string(),
    })?;
    let offset = parse_usize(next(&mut it, "field offset")?)?;
    let length = parse_usize(next(&mut it, "field length")?)?;
    let attrs = build_attributes(it)?;

    if let Some((algorithm, verify_start, verify_length)) = &attrs.verify {
        if array {
            return Err(SchemaError::Field {
                frame: frame.to_string(),
                field: name,
                fault: FieldFault::ChecksumArray,
            });
        }
        if attrs.step.is_some()
            || attrs.scale.is_some()
            || attrs.shift_right.is_some()
            || attrs.mask.is_some()
        {
            return Err(parse_error(&format!(
                "frame `{}`, field `{}`: a checksum slot takes only an endianness",
                frame, name
            )));
        }
        let algorithm: Algorithm =
            algorithm.parse().map_err(|_| SchemaError::UnknownAlgorithm {
                frame: frame.to_string(),
                field: name.clone(),
                algorithm: algorithm.clone(),
            })?;
        return Ok(Declaration::Verify(VerifyDescriptor::checksum(
            name,
            kind,
            algorithm,
            offset,
            length,
            *verify_start,
            *verify_length,
            attrs.endianness,
        )));
    }

    let mut field = if array {
        FieldDescriptor::array(name, kind, offset, length, attrs.step.unwrap_or(0))
    } else if attrs.step.is_some() {
        return Err(parse_error(&format!(
            "frame `{}`, field `{}`: step applies only to array fields",
            frame, name
        )));
    } else {
        FieldDescriptor::scalar(name, kind, offset, length)
    };
    field = field.endian(attrs.endianness);
    if let Some(scale) = attrs.scale {
        field = field.scale(scale);
    }
    if let Some(bits) = attrs.shift_right {
        field = field.shr(bits);
    }
    if let Some(mask) = attrs.mask {
        field = field.mask(mask);
    }
    Ok(Declaration::Field(field))
}

/// `(is_array, kind name)`.
fn build_type_spec(pair: Pair<'_, Rule>) -> Result<(bool, &str), SchemaError> {
    let inner = pair.into_inner().next().ok_or_else(|| parse_error("type: missing kind"))?;
    match inner.as_rule() {
        Rule::array_type => {
            let kind = inner.into_inner().next().ok_or_else(|| parse_error("array: missing kind"))?;
            Ok((true, kind.as_str()))
        }
        _ => Ok((false, inner.as_str())),
    }
}

fn build_attributes(pairs: Pairs<Rule>) -> Result<Attributes, SchemaError> {
    let mut attrs = Attributes::default();
    for attr in pairs {
        match attr.as_rule() {
            Rule::step_attr => attrs.step = Some(parse_usize(only_child(attr)?)?),
            Rule::endian_attr => {
                attrs.endianness = match attr.as_str() {
                    "little" => Endianness::Little,
                    _ => Endianness::Big,
                }
            }
            Rule::scale_attr => {
                let text = only_child(attr)?.as_str();
                let scale = text
                    .parse::<f64>()
                    .map_err(|_| parse_error(&format!("bad scale: {}", text)))?;
                attrs.scale = Some(scale);
            }
            Rule::shr_attr => {
                let bits = parse_int(only_child(attr)?)?;
                let bits = u32::try_from(bits)
                    .map_err(|_| parse_error(&format!("shift too large: {}", bits)))?;
                attrs.shift_right = Some(bits);
            }
            Rule::mask_attr => attrs.mask = Some(parse_int(only_child(attr)?)?),
            Rule::verify_attr => {
                let mut it = attr.into_inner();
                let algorithm = next(&mut it, "verify algorithm")?.as_str().to_string();
                let start = parse_usize(next(&mut it, "verify start")?)?;
                let length = parse_usize(next(&mut it, "verify length")?)?;
                attrs.verify = Some((algorithm, start, length));
            }
            _ => {}
        }
    }
    Ok(attrs)
}

fn next<'i>(it: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, SchemaError> {
    it.next().ok_or_else(|| parse_error(&format!("missing {}", what)))
}

fn only_child(pair: Pair<Rule>) -> Result<Pair<Rule>, SchemaError> {
    let what = format!("{:?} value", pair.as_rule());
    pair.into_inner().next().ok_or_else(|| parse_error(&what))
}

fn parse_usize(pair: Pair<Rule>) -> Result<usize, SchemaError> {
    let n = parse_int(pair)?;
    usize::try_from(n).map_err(|_| parse_error(&format!("value too large: {}", n)))
}

/// Decimal, `0x` hex or `0b` binary; `_` separators allowed in the latter two.
fn parse_int(pair: Pair<Rule>) -> Result<u64, SchemaError> {
    let s = pair.as_str();
    let digits = s.replace('_', "");
    let parsed = if let Some(hex) = digits.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        digits.parse::<u64>()
    };
    parsed.map_err(|_| parse_error(&format!("bad integer: {}", s)))
}

fn parse_error(msg: &str) -> SchemaError {
    SchemaError::Parse(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VerifyCheck;

    const SENSOR: &str = r#"
        // Sensor report
        frame Sensor(12) {
            head: i16 at 0 len 2;
            enabled: bool at 2 len 1 mask 0x1;
            mode: i8 at 2 len 1 shr 1 mask 0b111;
            temps: [f32] at 3 len 6 step 2 little scale 0.1;
            crc: i16 at 10 len 2 verify CRC16_MODBUS over 0 len 10 little;
            extra: verify custom; /* caller decides */
        }
    "#;

    #[test]
    fn parses_every_declaration_form() {
        let schema = parse(SENSOR).unwrap();
        let f = schema.get_frame("Sensor").unwrap();
        assert_eq!(f.total_length(), 12);
        assert_eq!(f.fields().len(), 4);
        assert_eq!(f.verifications().len(), 2);

        let mode = f.field("mode").unwrap();
        assert_eq!((mode.shift_right, mode.mask), (1, Some(0b111)));

        let temps = f.field("temps").unwrap();
        assert!(temps.array);
        assert_eq!(temps.step, 2);
        assert_eq!(temps.endianness, Endianness::Little);
        assert_eq!(temps.scale, 0.1);

        match &f.verification("crc").unwrap().check {
            VerifyCheck::Checksum { algorithm, verify_length, endianness, .. } => {
                assert_eq!(*algorithm, Algorithm::Crc16Modbus);
                assert_eq!(*verify_length, 10);
                assert_eq!(*endianness, Endianness::Little);
            }
            other => panic!("unexpected check {:?}", other),
        }
        assert!(f.verification("extra").unwrap().is_custom());
    }

    #[test]
    fn unknown_kind_and_algorithm() {
        let err = parse("frame F(2) { x: u16 at 0 len 2; }").unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedKind { ref kind, .. } if kind == "u16"));
        let err = parse("frame F(3) { c: i8 at 2 len 1 verify crc99 over 0 len 2; }").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAlgorithm { ref algorithm, .. } if algorithm == "crc99"));
    }

    #[test]
    fn checksum_slot_shape() {
        let err = parse("frame F(3) { c: [i8] at 2 len 1 step 1 verify sum8 over 0 len 2; }")
            .unwrap_err();
        assert!(matches!(err, SchemaError::Field { fault: FieldFault::ChecksumArray, .. }));
        let err = parse("frame F(3) { c: f32 at 2 len 1 verify sum8 over 0 len 2; }").unwrap_err();
        assert!(matches!(err, SchemaError::Field { fault: FieldFault::ChecksumKind(_), .. }));
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(parse("frame F(2) { x: i8 at 0; }"), Err(SchemaError::Parse(_))));
        assert!(matches!(parse("frame F { }"), Err(SchemaError::Parse(_))));
        assert!(matches!(parse("frame F(1) { x: i8 at 0 len 1 step 1; }"), Err(SchemaError::Parse(_))));
    }

    #[test]
    fn empty_source_is_empty_schema() {
        assert!(parse("").unwrap().frames().is_empty());
        assert!(parse("// nothing\n").unwrap().frames().is_empty());
    }

    #[test]
    fn integer_forms() {
        let s = parse("frame F(0x10) { a: i16 at 0b10 len 2 mask 0xFF_FF; }").unwrap();
        let f = s.get_frame("F").unwrap();
        assert_eq!(f.total_length(), 16);
        assert_eq!(f.field("a").unwrap().offset, 2);
        assert_eq!(f.field("a").unwrap().mask, Some(0xFFFF));
    }
}
