//! RLE-v2: run-length encoding extended with a leading repeating-pattern
//! prefix, used for the per-line template-id stream.
//!
//! Wire shape: if the first byte is `0xFF`, a pattern block follows —
//! `pattern_len` (varint, 2..=19), `pattern_len` varint values, a
//! `repeat_count` (varint) — followed by a plain-RLE tail of
//! `(value, run_length)` varint pairs. Otherwise the whole stream is a
//! plain-RLE sequence.

use super::varint;
use crate::error::CodecError;

const MIN_PATTERN_LEN: usize = 2;
const MAX_PATTERN_LEN: usize = 19;
const MIN_REPEATS: u64 = 3;
const PATTERN_PREFIX: u8 = 0xFF;

/// Encodes a non-empty sequence of values.
pub fn encode(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    if values.is_empty() {
        return out;
    }

    match find_leading_pattern(values) {
        Some((pattern_len, repeat_count)) => {
            out.push(PATTERN_PREFIX);
            varint::encode(pattern_len as u64, &mut out);
            for &v in &values[..pattern_len] {
                varint::encode(v, &mut out);
            }
            varint::encode(repeat_count, &mut out);
            let covered = pattern_len * repeat_count as usize;
            encode_plain(&values[covered..], &mut out);
        }
        None => encode_plain(values, &mut out),
    }
    out
}

fn encode_plain(values: &[u64], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        let mut run = 1u64;
        while i + (run as usize) < values.len() && values[i + run as usize] == value {
            run += 1;
        }
        varint::encode(value, out);
        varint::encode(run, out);
        i += run as usize;
    }
}

/// Finds the leading repeating pattern (length 2..=19, repeating >=3 times)
/// that covers the most elements from the start of `values`.
fn find_leading_pattern(values: &[u64]) -> Option<(usize, u64)> {
    let max_len = MAX_PATTERN_LEN.min(values.len() / MIN_REPEATS as usize);
    let mut best: Option<(usize, u64)> = None;
    for pattern_len in MIN_PATTERN_LEN..=max_len {
        let pattern = &values[..pattern_len];
        let mut repeat_count = 0u64;
        while {
            let start = pattern_len * repeat_count as usize;
            let end = start + pattern_len;
            end <= values.len() && &values[start..end] == pattern
        } {
            repeat_count += 1;
        }
        if repeat_count >= MIN_REPEATS {
            let covered = pattern_len * repeat_count as usize;
            if best.map(|(l, r)| l * r as usize).unwrap_or(0) < covered {
                best = Some((pattern_len, repeat_count));
            }
        }
    }
    best
}

/// Decodes exactly `expected_count` values.
pub fn decode(bytes: &[u8], expected_count: usize) -> Result<Vec<u64>, CodecError> {
    let mut out = Vec::with_capacity(expected_count);
    if expected_count == 0 {
        return Ok(out);
    }

    let mut cursor = (bytes, 0usize);
    if bytes.first() == Some(&PATTERN_PREFIX) {
        cursor.1 = 1;
        let pattern_len = varint::decode(&mut cursor)? as usize;
        if !(MIN_PATTERN_LEN..=MAX_PATTERN_LEN).contains(&pattern_len) {
            return Err(CodecError::InvalidPatternLength(pattern_len));
        }
        let mut pattern = Vec::with_capacity(pattern_len);
        for _ in 0..pattern_len {
            pattern.push(varint::decode(&mut cursor)?);
        }
        let repeat_count = varint::decode(&mut cursor)?;
        for _ in 0..repeat_count {
            out.extend_from_slice(&pattern);
        }
    }

    while out.len() < expected_count {
        let value = varint::decode(&mut cursor)?;
        let run_len = varint::decode(&mut cursor)? as usize;
        for _ in 0..run_len {
            out.push(value);
            if out.len() > expected_count {
                return Err(CodecError::RleOverrun { expected: expected_count, got: out.len() });
            }
        }
    }

    if out.len() != expected_count {
        return Err(CodecError::TruncatedRle { expected: expected_count, got: out.len() });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_plain_run() {
        let values = vec![5, 5, 5, 7, 7, 9];
        let bytes = encode(&values);
        assert_eq!(decode(&bytes, values.len()).unwrap(), values);
    }

    #[test]
    fn round_trip_with_leading_repeating_pattern() {
        let mut values = vec![1u64, 2, 3];
        for _ in 0..6 {
            values.extend_from_slice(&[1, 2, 3]);
        }
        values.extend_from_slice(&[9, 9, 4]);
        let bytes = encode(&values);
        assert_eq!(bytes[0], PATTERN_PREFIX);
        assert_eq!(decode(&bytes, values.len()).unwrap(), values);
    }

    #[test]
    fn empty_input_round_trips() {
        let values: Vec<u64> = vec![];
        assert_eq!(encode(&values), Vec::<u8>::new());
        assert_eq!(decode(&[], 0).unwrap(), values);
    }

    #[test]
    fn single_value_never_qualifies_as_a_pattern() {
        let values = vec![42u64];
        let bytes = encode(&values);
        assert_ne!(bytes[0], PATTERN_PREFIX);
        assert_eq!(decode(&bytes, 1).unwrap(), values);
    }
}
