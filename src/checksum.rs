//! Checksum catalog: sums, CRC-8/16/32 variants, LRC and BCC.
//!
//! Every function is pure over its input slice. CRCs share two bit loops: a
//! reflected one (shift right, test the low bit) and a normal one (byte placed
//! in the top of the register, shift left, test the high bit).

use std::fmt;
use std::str::FromStr;

/// The built-in checksum algorithms. `Bcc` and `Xor` name the same running XOR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sum8,
    Sum16,
    Crc8,
    Crc8Itu,
    Crc8Rohc,
    Crc8Maxim,
    Crc16Ibm,
    Crc16Modbus,
    Crc16Usb,
    Crc16Ccitt,
    Crc16CcittFalse,
    Crc16Maxim,
    Crc16X25,
    Crc16Xmodem,
    Crc16Dnp,
    Crc32,
    Crc32Mpeg2,
    Lrc,
    Bcc,
    Xor,
}

impl Algorithm {
    pub const ALL: [Algorithm; 20] = [
        Algorithm::Sum8,
        Algorithm::Sum16,
        Algorithm::Crc8,
        Algorithm::Crc8Itu,
        Algorithm::Crc8Rohc,
        Algorithm::Crc8Maxim,
        Algorithm::Crc16Ibm,
        Algorithm::Crc16Modbus,
        Algorithm::Crc16Usb,
        Algorithm::Crc16Ccitt,
        Algorithm::Crc16CcittFalse,
        Algorithm::Crc16Maxim,
        Algorithm::Crc16X25,
        Algorithm::Crc16Xmodem,
        Algorithm::Crc16Dnp,
        Algorithm::Crc32,
        Algorithm::Crc32Mpeg2,
        Algorithm::Lrc,
        Algorithm::Bcc,
        Algorithm::Xor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sum8 => "SUM8",
            Algorithm::Sum16 => "SUM16",
            Algorithm::Crc8 => "CRC8",
            Algorithm::Crc8Itu => "CRC8_ITU",
            Algorithm::Crc8Rohc => "CRC8_ROHC",
            Algorithm::Crc8Maxim => "CRC8_MAXIM",
            Algorithm::Crc16Ibm => "CRC16_IBM",
            Algorithm::Crc16Modbus => "CRC16_MODBUS",
            Algorithm::Crc16Usb => "CRC16_USB",
            Algorithm::Crc16Ccitt => "CRC16_CCITT",
            Algorithm::Crc16CcittFalse => "CRC16_CCITT_FALSE",
            Algorithm::Crc16Maxim => "CRC16_MAXIM",
            Algorithm::Crc16X25 => "CRC16_X25",
            Algorithm::Crc16Xmodem => "CRC16_XMODEM",
            Algorithm::Crc16Dnp => "CRC16_DNP",
            Algorithm::Crc32 => "CRC32",
            Algorithm::Crc32Mpeg2 => "CRC32_MPEG2",
            Algorithm::Lrc => "LRC",
            Algorithm::Bcc => "BCC",
            Algorithm::Xor => "XOR",
        }
    }

    /// Natural output width in bits.
    pub fn width(self) -> u32 {
        match self {
            Algorithm::Sum8
            | Algorithm::Crc8
            | Algorithm::Crc8Itu
            | Algorithm::Crc8Rohc
            | Algorithm::Crc8Maxim
            | Algorithm::Lrc
            | Algorithm::Bcc
            | Algorithm::Xor => 8,
            Algorithm::Crc32 | Algorithm::Crc32Mpeg2 => 32,
            _ => 16,
        }
    }

    pub fn compute(self, bytes: &[u8]) -> u64 {
        match self {
            Algorithm::Sum8 => sum8(bytes) as u64,
            Algorithm::Sum16 => sum16(bytes) as u64,
            Algorithm::Crc8 => crc8(bytes) as u64,
            Algorithm::Crc8Itu => crc8_itu(bytes) as u64,
            Algorithm::Crc8Rohc => crc8_rohc(bytes) as u64,
            Algorithm::Crc8Maxim => crc8_maxim(bytes) as u64,
            Algorithm::Crc16Ibm => crc16_ibm(bytes) as u64,
            Algorithm::Crc16Modbus => crc16_modbus(bytes) as u64,
            Algorithm::Crc16Usb => crc16_usb(bytes) as u64,
            Algorithm::Crc16Ccitt => crc16_ccitt(bytes) as u64,
            Algorithm::Crc16CcittFalse => crc16_ccitt_false(bytes) as u64,
            Algorithm::Crc16Maxim => crc16_maxim(bytes) as u64,
            Algorithm::Crc16X25 => crc16_x25(bytes) as u64,
            Algorithm::Crc16Xmodem => crc16_xmodem(bytes) as u64,
            Algorithm::Crc16Dnp => crc16_dnp(bytes) as u64,
            Algorithm::Crc32 => crc32(bytes) as u64,
            Algorithm::Crc32Mpeg2 => crc32_mpeg2(bytes) as u64,
            Algorithm::Lrc => lrc(bytes) as u64,
            Algorithm::Bcc | Algorithm::Xor => bcc(bytes) as u64,
        }
    }

    /// The checksum as it lands in a slot wider than its natural width.
    ///
    /// Sums and XOR accumulate bytes as signed, and 8-bit CRCs and LRC widen
    /// as signed bytes, so the upper bits of a wide slot follow the sign. Wider
    /// CRCs are never negative. Callers truncate to the slot width.
    pub fn widened(self, bytes: &[u8]) -> u64 {
        let signed = match self {
            Algorithm::Sum8 | Algorithm::Sum16 => {
                bytes.iter().fold(0i64, |acc, &b| acc.wrapping_add(b as i8 as i64))
            }
            Algorithm::Bcc | Algorithm::Xor => bytes.iter().fold(0i64, |acc, &b| acc ^ (b as i8 as i64)),
            Algorithm::Crc8
            | Algorithm::Crc8Itu
            | Algorithm::Crc8Rohc
            | Algorithm::Crc8Maxim
            | Algorithm::Lrc => self.compute(bytes) as u8 as i8 as i64,
            _ => self.compute(bytes) as i64,
        };
        signed as u64
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown checksum algorithm `{0}`")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    /// Case-insensitive catalog name, e.g. `crc16_modbus`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// Reflected CRC register update: XOR the byte into the low end, shift right.
fn reflected(bytes: &[u8], init: u32, poly: u32) -> u32 {
    bytes.iter().fold(init, |mut crc, &b| {
        crc ^= b as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
        }
        crc
    })
}

/// Normal CRC register update for a `width`-bit register: XOR the byte into
/// the top, shift left.
fn normal(bytes: &[u8], init: u32, poly: u32, width: u32) -> u32 {
    let top = 1u32 << (width - 1);
    let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
    bytes.iter().fold(init, |mut crc, &b| {
        crc ^= (b as u32) << (width - 8);
        for _ in 0..8 {
            crc = if crc & top != 0 { (crc << 1) ^ poly } else { crc << 1 };
            crc &= mask;
        }
        crc
    })
}

pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Bytes add as signed values, so `0xFF` contributes `0xFFFF`.
pub fn sum16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as i8 as u16))
}

pub fn crc8(bytes: &[u8]) -> u8 {
    normal(bytes, 0x00, 0x07, 8) as u8
}

pub fn crc8_itu(bytes: &[u8]) -> u8 {
    crc8(bytes) ^ 0x55
}

pub fn crc8_rohc(bytes: &[u8]) -> u8 {
    reflected(bytes, 0xFF, 0xE0) as u8
}

pub fn crc8_maxim(bytes: &[u8]) -> u8 {
    reflected(bytes, 0x00, 0x8C) as u8
}

pub fn crc16_ibm(bytes: &[u8]) -> u16 {
    reflected(bytes, 0x0000, 0xA001) as u16
}

pub fn crc16_modbus(bytes: &[u8]) -> u16 {
    reflected(bytes, 0xFFFF, 0xA001) as u16
}

pub fn crc16_usb(bytes: &[u8]) -> u16 {
    crc16_modbus(bytes) ^ 0xFFFF
}

pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    reflected(bytes, 0x0000, 0x8408) as u16
}

pub fn crc16_ccitt_false(bytes: &[u8]) -> u16 {
    normal(bytes, 0xFFFF, 0x1021, 16) as u16
}

pub fn crc16_maxim(bytes: &[u8]) -> u16 {
    crc16_ibm(bytes) ^ 0xFFFF
}

pub fn crc16_x25(bytes: &[u8]) -> u16 {
    reflected(bytes, 0xFFFF, 0x8408) as u16 ^ 0xFFFF
}

pub fn crc16_xmodem(bytes: &[u8]) -> u16 {
    normal(bytes, 0x0000, 0x1021, 16) as u16
}

pub fn crc16_dnp(bytes: &[u8]) -> u16 {
    reflected(bytes, 0x0000, 0xA6BC) as u16 ^ 0xFFFF
}

/// IEEE 802.3 CRC-32.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

pub fn crc32_mpeg2(bytes: &[u8]) -> u32 {
    normal(bytes, 0xFFFF_FFFF, 0x04C1_1DB7, 32)
}

/// Two's complement of the byte sum: `(256 - sum) mod 256`.
pub fn lrc(bytes: &[u8]) -> u8 {
    0u8.wrapping_sub(sum8(bytes))
}

/// Running XOR of all bytes.
pub fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}
