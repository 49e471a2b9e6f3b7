//! Per-template word-substitution dictionary.
//!
//! Replaces high-value words in a template's message text with single-byte
//! codes drawn from the unused control/extended byte range. Decoding scans
//! the byte stream exactly once and looks up each candidate code byte in
//! the dictionary — never by iterated string replacement, which would be
//! order-sensitive if a replacement happened to contain another code byte.

use indexmap::IndexMap;

use crate::error::CodecError;

const RESERVED: [u8; 3] = [0x0A, 0x0D, 0x09];
const MIN_WORD_LEN: usize = 2;
const DEFAULT_FREQUENCY_FLOOR: u32 = 2;

/// The full set of byte codes eligible for substitution: control bytes
/// `0x01..=0x1F` and extended bytes `0x80..=0xFF`, excluding `\n`, `\r`,
/// and `\t` (≈160 codes).
fn available_codes() -> Vec<u8> {
    (0x01u8..=0x1F)
        .chain(0x80u8..=0xFF)
        .filter(|b| !RESERVED.contains(b))
        .collect()
}

/// True for any byte `encode` could have emitted as a substitution code
/// (as opposed to a literal message byte passed through unchanged).
fn is_code_range(b: u8) -> bool {
    ((0x01..=0x1F).contains(&b) || (0x80..=0xFF).contains(&b)) && !RESERVED.contains(&b)
}

#[derive(Debug, Clone, Default)]
pub struct WordDictionary {
    /// `(word, code)` pairs sorted by word length descending, so encoding
    /// tries the longest candidate first and never splits a shorter word
    /// out of a longer one.
    by_length_desc: Vec<(String, u8)>,
    code_to_word: IndexMap<u8, String>,
}

impl WordDictionary {
    pub fn is_empty(&self) -> bool {
        self.code_to_word.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&u8, &String)> {
        self.code_to_word.iter()
    }

    pub fn from_entries(entries: Vec<(u8, String)>) -> Self {
        let mut by_length_desc: Vec<(String, u8)> =
            entries.iter().map(|(code, word)| (word.clone(), *code)).collect();
        by_length_desc.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let code_to_word = entries.into_iter().collect();
        Self { by_length_desc, code_to_word }
    }
}

/// Builds a dictionary from a template's message-column values. Words are
/// alphanumeric runs of length >= 2; words occurring fewer than
/// `frequency_floor` times are dropped. Surviving words are scored as
/// `frequency * (length - 1)` and assigned codes highest-score first, which
/// makes the assignment deterministic for a given input order.
pub fn build(messages: &[&str], frequency_floor: Option<u32>) -> WordDictionary {
    let floor = frequency_floor.unwrap_or(DEFAULT_FREQUENCY_FLOOR);
    let mut counts: IndexMap<String, u32> = IndexMap::new();
    for message in messages {
        for word in extract_words(message) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut scored: Vec<(String, u32, usize)> = counts
        .into_iter()
        .filter(|(_, freq)| *freq >= floor)
        .map(|(word, freq)| {
            let score = freq as usize * (word.len() - 1);
            (word, freq, score)
        })
        .collect();
    scored.sort_by(|a, b| b.2.cmp(&a.2));

    let codes = available_codes();
    let entries: Vec<(u8, String)> = scored
        .into_iter()
        .zip(codes)
        .map(|((word, _freq, _score), code)| (code, word))
        .collect();

    WordDictionary::from_entries(entries)
}

fn extract_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            current.push(c);
        } else if !current.is_empty() {
            if current.len() >= MIN_WORD_LEN {
                words.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= MIN_WORD_LEN {
        words.push(current);
    }
    words
}

/// Substitutes dictionary words in `message`, longest-word-first, honoring
/// word boundaries so a shorter dictionary word never matches inside a
/// longer non-dictionary word.
pub fn encode(message: &str, dict: &WordDictionary) -> Vec<u8> {
    if dict.is_empty() {
        return message.as_bytes().to_vec();
    }
    let bytes = message.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    'outer: while i < bytes.len() {
        if bytes[i].is_ascii_alphanumeric() {
            for (word, code) in &dict.by_length_desc {
                let wlen = word.len();
                if i + wlen <= bytes.len() && &bytes[i..i + wlen] == word.as_bytes() {
                    let prev_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
                    let next_ok = i + wlen == bytes.len() || !bytes[i + wlen].is_ascii_alphanumeric();
                    if prev_ok && next_ok {
                        out.push(*code);
                        i += wlen;
                        continue 'outer;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Reverses [`encode`] in a single left-to-right pass. A byte that falls in
/// the substitution code range but has no entry in `dict` means the
/// container was built with a different dictionary than the one supplied
/// here, or is corrupt.
pub fn decode(bytes: &[u8], dict: &WordDictionary) -> Result<Vec<u8>, CodecError> {
    if dict.is_empty() {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        match dict.code_to_word.get(&b) {
            Some(word) => out.extend_from_slice(word.as_bytes()),
            None if is_code_range(b) => return Err(CodecError::UnknownWordCode(b)),
            None => out.push(b),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_substitutes_frequent_words() {
        let messages = [
            "connection refused by upstream",
            "connection refused by downstream",
            "connection reset by peer",
        ];
        let dict = build(&messages, None);
        assert!(!dict.is_empty());
        for m in messages {
            let encoded = encode(m, &dict);
            let decoded = decode(&encoded, &dict).unwrap();
            assert_eq!(String::from_utf8(decoded).unwrap(), m);
        }
    }

    #[test]
    fn empty_dictionary_is_a_no_op() {
        let dict = WordDictionary::default();
        let encoded = encode("hello world", &dict);
        assert_eq!(encoded, b"hello world");
    }

    #[test]
    fn code_range_byte_missing_from_dictionary_is_an_error() {
        let dict = WordDictionary::from_entries(vec![(0x01u8, "connection".to_string())]);
        let err = decode(&[0x02u8], &dict).unwrap_err();
        assert_eq!(err, CodecError::UnknownWordCode(0x02));
    }

    #[test]
    fn short_words_below_floor_are_not_substituted() {
        let messages = ["a single unique sentence here"];
        let dict = build(&messages, Some(2));
        assert!(dict.is_empty());
    }

    #[test]
    fn longest_match_wins_over_shorter_overlapping_word() {
        let entries = vec![(0x01u8, "cat".to_string()), (0x02u8, "category".to_string())];
        let dict = WordDictionary::from_entries(entries);
        let encoded = encode("category", &dict);
        assert_eq!(encoded, vec![0x02u8]);
    }
}
