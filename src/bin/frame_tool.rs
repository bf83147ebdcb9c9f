//! Decode, encode and checksum hex frames against a schema file.
//!
//! Usage:
//!   frame_tool decode   <schema> <frame> <hex>
//!   frame_tool encode   <schema> <frame> name=value ...
//!   frame_tool checksum <algorithm> <hex>
//!
//! Array values are comma separated: `temps=21.5,22,0.3`. Encode computes every
//! checksum after the named fields are written. Set RUST_LOG=debug to see why a
//! frame was rejected.

use anyhow::Context;
use frameproto::{parse, Algorithm, Codec, CodecError, FieldDescriptor, Value};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("decode") if args.len() == 4 => decode(&args[1], &args[2], &args[3]),
        Some("encode") if args.len() >= 3 => encode(&args[1], &args[2], &args[3..]),
        Some("checksum") if args.len() == 3 => checksum(&args[1], &args[2]),
        _ => {
            eprintln!("Usage:");
            eprintln!("  frame_tool decode   <schema> <frame> <hex>");
            eprintln!("  frame_tool encode   <schema> <frame> name=value ...");
            eprintln!("  frame_tool checksum <algorithm> <hex>");
            std::process::exit(2);
        }
    }
}

fn load(path: &str) -> anyhow::Result<Codec> {
    let path = Path::new(path);
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    let schema = parse(&source).with_context(|| format!("loading schema {}", path.display()))?;
    Ok(Codec::new(schema))
}

fn decode_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    let compact = compact.trim_start_matches("0x");
    hex::decode(compact).with_context(|| format!("invalid hex: {}", text))
}

fn decode(schema: &str, frame: &str, payload: &str) -> anyhow::Result<()> {
    let codec = load(schema)?;
    let bytes = decode_hex(payload)?;
    let desc = codec.frame(frame)?;
    match codec.decode(frame, &bytes) {
        Ok(decoded) => {
            let names = desc
                .fields()
                .iter()
                .map(|f| f.name.as_str())
                .chain(desc.verifications().iter().map(|v| v.name.as_str()));
            for name in names {
                if let Some(value) = decoded.get(name) {
                    println!("{} = {}", name, value);
                }
            }
            Ok(())
        }
        Err(CodecError::Rejected(reason)) => {
            eprintln!("{}: rejected: {}", frame, reason);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn encode(schema: &str, frame: &str, assignments: &[String]) -> anyhow::Result<()> {
    let codec = load(schema)?;
    let desc = codec.frame(frame)?;
    let mut encoder = codec.encoder(frame)?;
    for assignment in assignments {
        let (name, text) = assignment
            .split_once('=')
            .with_context(|| format!("expected name=value, got `{}`", assignment))?;
        let field = desc
            .field(name)
            .cloned()
            .or_else(|| desc.verification(name).and_then(|v| v.slot_field()))
            .with_context(|| format!("frame `{}` has no field `{}`", frame, name))?;
        encoder.set(name, parse_value(&field, text)?)?;
    }
    encoder.write_checksums();
    println!("{}", hex::encode(encoder.as_bytes()));
    Ok(())
}

fn parse_value(field: &FieldDescriptor, text: &str) -> anyhow::Result<Value> {
    let one = |t: &str| {
        Value::parse_as(field.kind, t)
            .with_context(|| format!("`{}` is not a valid {} for `{}`", t, field.kind, field.name))
    };
    if field.array {
        let items = text.split(',').map(one).collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Value::Array(items))
    } else {
        one(text)
    }
}

fn checksum(algorithm: &str, payload: &str) -> anyhow::Result<()> {
    let algorithm: Algorithm = algorithm.parse()?;
    let bytes = decode_hex(payload)?;
    let width = (algorithm.width() / 4) as usize;
    let value = algorithm.compute(&bytes);
    println!("{} = 0x{:0width$X}", algorithm, value, width = width);
    Ok(())
}
