//! Schema fuzz target: feed arbitrary text to the schema parser, and arbitrary
//! frame bytes to a fixed codec. Neither may panic.
//! Build with: cargo fuzz run schema_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SENSOR: &str = "frame Sensor(12) {
	head: i16 at 0 len 2;
	mode: i8 at 2 len 1 shr 1 mask 0x7;
	temps: [f32] at 3 len 6 step 2 little scale 0.1;
	crc: i16 at 10 len 2 verify crc16_modbus over 0 len 10 little;
}";

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if let Ok(schema) = frameproto::parse(SENSOR) {
        let _ = frameproto::Codec::new(schema).decode("Sensor", data);
    }
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(schema) = frameproto::parse(text) {
            let codec = frameproto::Codec::new(schema);
            for frame in codec.schema().frames() {
                let _ = codec.decode(frame.name(), &vec![0u8; frame.total_length().min(4096)]);
            }
        }
        let _ = frameproto::lint::lint(text);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run schema_fuzz");
}
