//! Raw TAR header parsing: numeric field decoding and checksum
//! validation (spec §4.6.1).
//!
//! Grounded directly on `original_source/src/tar/archive.cc`'s `as_num`
//! and `checksums` functions.

pub(crate) const RECORD_SIZE: u64 = 512;

/// Parse a numeric TAR header field: either base-256 (GNU extension) or
/// whitespace-trimmed octal ASCII. Returns `None` for an empty/blank
/// field.
pub(crate) fn as_num(field: &[u8]) -> Option<i64> {
    if field.is_empty() {
        return None;
    }
    match field[0] {
        0o200 => {
            // Non-negative base-256: remaining bytes are a big-endian
            // unsigned magnitude.
            let mut value: i64 = 0;
            for &b in &field[1..] {
                value = (value << 8) | b as i64;
            }
            Some(value)
        }
        0o377 => {
            // Negative base-256: whole field is a two's-complement
            // big-endian integer.
            let mut inverted: Vec<u8> = field.iter().map(|b| !b).collect();
            add_one_be(&mut inverted);
            let mut magnitude: i64 = 0;
            for &b in &inverted {
                magnitude = (magnitude << 8) | b as i64;
            }
            Some(-magnitude)
        }
        _ => parse_octal(field),
    }
}

fn add_one_be(bytes: &mut [u8]) {
    for b in bytes.iter_mut().rev() {
        let (sum, carry) = b.overflowing_add(1);
        *b = sum;
        if !carry {
            return;
        }
    }
}

fn parse_octal(field: &[u8]) -> Option<i64> {
    let text = field
        .iter()
        .take_while(|&&b| b != 0)
        .copied()
        .collect::<Vec<u8>>();
    let trimmed = std::str::from_utf8(&text).ok()?.trim();
    if trimmed.is_empty() {
        return None;
    }
    i64::from_str_radix(trimmed, 8).ok()
}

/// Compute both the unsigned and signed checksum of a 512-byte header
/// record, treating the checksum field itself as if it were filled with
/// spaces. A header is accepted if the recorded checksum matches either
/// sum.
pub(crate) fn checksums(record: &[u8; 512]) -> (i64, i64) {
    let mut unsigned: i64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in record.iter().enumerate() {
        let byte = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += byte as i64;
        signed += (byte as i8) as i64;
    }
    (unsigned, signed)
}

pub(crate) fn trim_nul(bytes: &[u8]) -> Vec<u8> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].to_vec()
}

pub(crate) fn round_up_to_record(size: u64) -> u64 {
    (size + RECORD_SIZE - 1) / RECORD_SIZE * RECORD_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_roundtrip() {
        let field = b"0000644\0";
        assert_eq!(as_num(field), Some(0o644));
    }

    #[test]
    fn base256_nonnegative() {
        let mut field = [0u8; 12];
        field[0] = 0o200;
        field[11] = 5;
        assert_eq!(as_num(&field), Some(5));
    }

    #[test]
    fn base256_negative() {
        let mut field = [0xffu8; 12];
        // -1 in two's complement is all 0xff.
        assert_eq!(as_num(&field), Some(-1));
    }

    #[test]
    fn blank_field_is_none() {
        assert_eq!(as_num(&[0u8; 8]), None);
    }
}
