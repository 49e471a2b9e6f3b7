//! Columnar storage: the token pool, per-category dictionary columns, and
//! the timestamp column. Each grows monotonically during encoding and is
//! frozen into a plain list before serialization.

use crate::codec::{varint, zigzag};
use crate::error::CodecError;
use indexmap::IndexMap;

/// A global, deduplicated pool of template pattern tokens. Templates
/// reference entries by index rather than embedding their pattern inline,
/// so identical literal/placeholder tokens across templates are stored once.
#[derive(Debug, Clone, Default)]
pub struct TokenPool {
    index: IndexMap<String, u32>,
}

impl TokenPool {
    pub fn intern(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.index.get(token) {
            return id;
        }
        let id = self.index.len() as u32;
        self.index.insert(token.to_string(), id);
        id
    }

    pub fn encode_refs(ids: &[u32]) -> Vec<u8> {
        varint::encode_all(&ids.iter().map(|&id| id as u64).collect::<Vec<_>>())
    }

    pub fn decode_refs(bytes: &[u8], count: usize) -> Result<Vec<u32>, CodecError> {
        Ok(varint::decode_n(bytes, count)?.into_iter().map(|v| v as u32).collect())
    }

    /// Freezes the pool into a list addressable by the ids handed out by
    /// [`Self::intern`].
    pub fn into_list(self) -> Vec<String> {
        let mut out: Vec<(u32, String)> = self.index.into_iter().map(|(k, v)| (v, k)).collect();
        out.sort_by_key(|(id, _)| *id);
        out.into_iter().map(|(_, k)| k).collect()
    }
}

/// An insertion-ordered `value -> small integer id` dictionary, used for
/// the severity, IP, and message columns. Values are stored as raw bytes
/// so the same column type serves dotted-string IPs and 4-byte binary IPs.
#[derive(Debug, Clone, Default)]
pub struct CategoricalColumn {
    index: IndexMap<Vec<u8>, u32>,
    ids: Vec<u32>,
}

impl CategoricalColumn {
    pub fn push(&mut self, value: Vec<u8>) -> u32 {
        let id = if let Some(&id) = self.index.get(&value) {
            id
        } else {
            let id = self.index.len() as u32;
            self.index.insert(value, id);
            id
        };
        self.ids.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn lookup(&self, value: &[u8]) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Consumes the column, returning its varint-encoded id stream and its
    /// frozen value list (index order == id order).
    pub fn finalize(self) -> (Vec<u8>, Vec<Vec<u8>>) {
        let ids_u64: Vec<u64> = self.ids.iter().map(|&id| id as u64).collect();
        let encoded = varint::encode_all(&ids_u64);
        let mut values: Vec<(u32, Vec<u8>)> = self.index.into_iter().map(|(v, id)| (id, v)).collect();
        values.sort_by_key(|(id, _)| *id);
        (encoded, values.into_iter().map(|(_, v)| v).collect())
    }
}

/// Decodes a categorical column's id stream back into per-line ids.
pub fn decode_categorical_ids(bytes: &[u8], count: usize) -> Result<Vec<u32>, CodecError> {
    Ok(varint::decode_n(bytes, count)?.into_iter().map(|v| v as u32).collect())
}

/// Epoch-millisecond timestamp column: first value stored whole, every
/// following value stored as a zigzagged delta from its predecessor.
#[derive(Debug, Clone, Default)]
pub struct TimestampColumn {
    base: Option<i64>,
    previous: i64,
    deltas: Vec<i64>,
    count: usize,
}

impl TimestampColumn {
    pub fn push(&mut self, epoch_ms: i64) {
        match self.base {
            None => {
                self.base = Some(epoch_ms);
                self.previous = epoch_ms;
            }
            Some(_) => {
                self.deltas.push(epoch_ms - self.previous);
                self.previous = epoch_ms;
            }
        }
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `(base, count, varint-encoded zigzag delta stream)`.
    pub fn finalize(self) -> (i64, usize, Vec<u8>) {
        let zigzagged: Vec<u64> = self.deltas.iter().map(|&d| zigzag::encode(d)).collect();
        (self.base.unwrap_or(0), self.count, varint::encode_all(&zigzagged))
    }
}

/// Reconstructs the full sequence of absolute epoch-millisecond timestamps
/// from a finalized column's pieces.
pub fn decode_timestamps(base: i64, count: usize, bytes: &[u8]) -> Result<Vec<i64>, CodecError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let deltas = varint::decode_n(bytes, count - 1)?;
    let mut out = Vec::with_capacity(count);
    out.push(base);
    let mut current = base;
    for d in deltas {
        current += zigzag::decode(d);
        out.push(current);
    }
    Ok(out)
}

/// Parses a free-form timestamp string into epoch milliseconds. Supports
/// ISO 8601 (with or without fractional seconds/offset), the Apache
/// ctime-style format, and bare epoch seconds/milliseconds. Unparseable
/// input yields `None`; callers substitute `0` rather than fail the line.
pub fn parse_timestamp_ms(value: &str) -> Option<i64> {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    // Apache/syslog ctime style: "Thu Jun 09 06:07:04 2005".
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%a %b %d %H:%M:%S %Y") {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(epoch) = value.parse::<i64>() {
        return Some(match value.len() {
            13 => epoch,
            10 => epoch * 1000,
            _ => epoch,
        });
    }
    None
}

/// Encodes an IP field value for storage in [`CategoricalColumn`]. When
/// `binary` is set, a well-formed dotted IPv4 address is packed into 4
/// raw bytes; anything else (including `binary == false`) falls back to
/// its UTF-8 byte representation.
pub fn encode_ip(value: &str, binary: bool) -> Vec<u8> {
    if !binary {
        return value.as_bytes().to_vec();
    }
    let octets: Option<Vec<u8>> = value.split('.').map(|part| part.parse::<u8>().ok()).collect();
    match octets {
        Some(bytes) if bytes.len() == 4 => bytes,
        _ => value.as_bytes().to_vec(),
    }
}

/// Renders a stored IP value back to a display string: dotted-quad for a
/// 4-byte binary entry, UTF-8 (lossy) otherwise.
pub fn format_ip(bytes: &[u8]) -> String {
    match bytes {
        [a, b, c, d] => format!("{a}.{b}.{c}.{d}"),
        other => String::from_utf8_lossy(other).into_owned(),
    }
}

const METRIC_TAG_INTEGER: u8 = 1;
const METRIC_TAG_RAW: u8 = 0;

/// Encodes a `MetricValue` field for storage in the message column. A value
/// that parses as an integer is stored zigzag+varint encoded (reusing the
/// timestamp column's codec rather than adding a new one); anything else
/// falls back to its raw UTF-8 bytes. A one-byte tag distinguishes the two
/// on decode.
pub fn encode_metric_value(value: &str) -> Vec<u8> {
    match value.parse::<i64>() {
        Ok(n) => {
            let mut out = vec![METRIC_TAG_INTEGER];
            varint::encode(zigzag::encode(n), &mut out);
            out
        }
        Err(_) => {
            let mut out = Vec::with_capacity(value.len() + 1);
            out.push(METRIC_TAG_RAW);
            out.extend_from_slice(value.as_bytes());
            out
        }
    }
}

/// Reverses [`encode_metric_value`].
pub fn decode_metric_value(bytes: &[u8]) -> Option<String> {
    let (&tag, rest) = bytes.split_first()?;
    match tag {
        METRIC_TAG_INTEGER => {
            let mut cursor = (rest, 0usize);
            let v = varint::decode(&mut cursor).ok()?;
            Some(zigzag::decode(v).to_string())
        }
        METRIC_TAG_RAW => Some(String::from_utf8_lossy(rest).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pool_deduplicates_and_preserves_ids() {
        let mut pool = TokenPool::default();
        let a = pool.intern("L:LDAP:");
        let b = pool.intern("P:TIMESTAMP");
        let a2 = pool.intern("L:LDAP:");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        let list = pool.into_list();
        assert_eq!(list[a as usize], "L:LDAP:");
        assert_eq!(list[b as usize], "P:TIMESTAMP");
    }

    #[test]
    fn categorical_column_round_trips_ids() {
        let mut col = CategoricalColumn::default();
        col.push(b"ERROR".to_vec());
        col.push(b"INFO".to_vec());
        col.push(b"ERROR".to_vec());
        let (encoded, values) = col.finalize();
        let ids = decode_categorical_ids(&encoded, 3).unwrap();
        assert_eq!(ids, vec![0, 1, 0]);
        assert_eq!(values, vec![b"ERROR".to_vec(), b"INFO".to_vec()]);
    }

    #[test]
    fn timestamp_column_round_trips_via_delta_zigzag_varint() {
        let mut col = TimestampColumn::default();
        let base = 1_717_891_200_000i64;
        for i in 0..10 {
            col.push(base + i * 1000);
        }
        let (b, count, bytes) = col.finalize();
        let restored = decode_timestamps(b, count, &bytes).unwrap();
        let expected: Vec<i64> = (0..10).map(|i| base + i * 1000).collect();
        assert_eq!(restored, expected);
    }

    #[test]
    fn epoch_seconds_and_millis_both_parse() {
        assert_eq!(parse_timestamp_ms("1717891200"), Some(1_717_891_200_000));
        assert_eq!(parse_timestamp_ms("1717891200000"), Some(1_717_891_200_000));
    }

    #[test]
    fn apache_ctime_timestamp_parses() {
        assert!(parse_timestamp_ms("Thu Jun 09 06:07:04 2005").is_some());
    }

    #[test]
    fn unparseable_timestamp_yields_none() {
        assert_eq!(parse_timestamp_ms("not a timestamp"), None);
    }

    #[test]
    fn binary_ip_round_trips_through_format_ip() {
        let bytes = encode_ip("192.168.1.1", true);
        assert_eq!(bytes, vec![192, 168, 1, 1]);
        assert_eq!(format_ip(&bytes), "192.168.1.1");
    }

    #[test]
    fn non_ipv4_value_falls_back_to_utf8_bytes() {
        let bytes = encode_ip("not-an-ip", true);
        assert_eq!(bytes, b"not-an-ip".to_vec());
    }

    #[test]
    fn integer_metric_value_round_trips_through_zigzag_varint() {
        let encoded = encode_metric_value("-42");
        assert_eq!(encoded[0], METRIC_TAG_INTEGER);
        assert_eq!(decode_metric_value(&encoded), Some("-42".to_string()));
    }

    #[test]
    fn non_integer_metric_value_falls_back_to_raw_bytes() {
        let encoded = encode_metric_value("3.5ms");
        assert_eq!(encoded[0], METRIC_TAG_RAW);
        assert_eq!(decode_metric_value(&encoded), Some("3.5ms".to_string()));
    }
}
