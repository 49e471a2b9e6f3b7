//! Compression encoder.
//!
//! Drives the pipeline in one direction only: `Idle -> TemplatesExtracted ->
//! LinesEncoded -> ColumnsFinalized -> Serialized`. There is no way back to
//! an earlier state; start a new [`Encoder`] to encode a second corpus.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::codec::worddict::{self, WordDictionary};
use crate::columns::{self, CategoricalColumn, TimestampColumn, TokenPool};
use crate::config::CompressionConfig;
use crate::container::CompressedLog;
use crate::semantic::{ColumnCategory, SemanticType};
use crate::template::{self, LogTemplate};
use crate::token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    TemplatesExtracted,
    LinesEncoded,
    ColumnsFinalized,
    Serialized,
}

struct PendingMessageSlot {
    line_idx: usize,
    slot_idx: usize,
    template_idx: usize,
    raw_value: String,
}

/// Builds a [`CompressedLog`] from a corpus of raw lines, one state
/// transition at a time.
pub struct Encoder {
    config: CompressionConfig,
    state: EncoderState,
    templates: Vec<LogTemplate>,
    token_pool: TokenPool,
    template_token_refs: Vec<Vec<u32>>,
    timestamp_col: TimestampColumn,
    severity_col: CategoricalColumn,
    ip_col: CategoricalColumn,
    message_col: CategoricalColumn,
    log_index_ids: Vec<i64>,
    log_index_offsets: Vec<Vec<u32>>,
    pending_messages: Vec<PendingMessageSlot>,
    word_dicts: HashMap<usize, WordDictionary>,
    original_count: usize,
}

impl Encoder {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            state: EncoderState::Idle,
            templates: Vec::new(),
            token_pool: TokenPool::default(),
            template_token_refs: Vec::new(),
            timestamp_col: TimestampColumn::default(),
            severity_col: CategoricalColumn::default(),
            ip_col: CategoricalColumn::default(),
            message_col: CategoricalColumn::default(),
            log_index_ids: Vec::new(),
            log_index_offsets: Vec::new(),
            pending_messages: Vec::new(),
            word_dicts: HashMap::new(),
            original_count: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Extracts templates from the whole corpus and freezes the token pool
    /// that addresses their patterns. `Idle -> TemplatesExtracted`.
    pub fn extract_templates(&mut self, lines: &[&str]) {
        assert_eq!(
            self.state,
            EncoderState::Idle,
            "extract_templates called outside the Idle state"
        );
        debug!("extract_templates: scanning {} lines (min_support {})", lines.len(), self.config.min_support);
        let templates = template::extract_templates(lines, self.config.min_support);
        debug!("extract_templates: found {} templates", templates.len());

        let mut token_pool = TokenPool::default();
        let mut template_token_refs = Vec::with_capacity(templates.len());
        for t in &templates {
            let refs = t
                .pattern
                .iter()
                .map(|element| token_pool.intern(&template::pattern_element_key(element)))
                .collect();
            template_token_refs.push(refs);
        }

        self.templates = templates;
        self.token_pool = token_pool;
        self.template_token_refs = template_token_refs;
        self.state = EncoderState::TemplatesExtracted;
    }

    /// Encodes one line against the extracted template set, routing its
    /// placeholder values into the relevant columns. Message-category
    /// values are buffered until [`Self::finalize_columns`] because their
    /// final encoding depends on the per-template word dictionary, which
    /// can only be built once every matching line has been seen.
    pub fn encode_line(&mut self, raw: &str) {
        assert!(
            matches!(self.state, EncoderState::TemplatesExtracted | EncoderState::LinesEncoded),
            "encode_line called before extract_templates"
        );
        self.state = EncoderState::LinesEncoded;
        self.original_count += 1;
        let line_idx = self.log_index_ids.len();

        trace!("encode_line: tokenizing line {line_idx}");
        let tokens = token::tokenize(token::normalize_line(raw));
        let fields = token::get_fields(&tokens);

        match template::match_line(&self.templates, &fields) {
            Some((template_idx, values)) => {
                let positions: Vec<usize> = self.templates[template_idx].placeholder_positions().collect();
                let mut offsets = Vec::with_capacity(values.len());
                for (pos, value) in positions.iter().zip(values.iter()) {
                    let semantic_type = self.templates[template_idx].field_types[pos];
                    match semantic_type.category() {
                        ColumnCategory::Timestamp => {
                            let epoch_ms = columns::parse_timestamp_ms(value).unwrap_or_else(|| {
                                warn!("line {line_idx}: unparseable timestamp {value:?}, falling back to epoch 0");
                                0
                            });
                            self.timestamp_col.push(epoch_ms);
                            offsets.push((self.timestamp_col.len() - 1) as u32);
                        }
                        ColumnCategory::Severity => {
                            offsets.push(self.severity_col.push(value.as_bytes().to_vec()));
                        }
                        ColumnCategory::Ip => {
                            let encoded = columns::encode_ip(value, self.config.binary_ip);
                            offsets.push(self.ip_col.push(encoded));
                        }
                        ColumnCategory::Message if semantic_type == SemanticType::MetricValue => {
                            let encoded = columns::encode_metric_value(value);
                            offsets.push(self.message_col.push(encoded));
                        }
                        ColumnCategory::Message => {
                            let slot_idx = offsets.len();
                            offsets.push(u32::MAX);
                            self.pending_messages.push(PendingMessageSlot {
                                line_idx,
                                slot_idx,
                                template_idx,
                                raw_value: value.clone(),
                            });
                        }
                    }
                }
                self.log_index_ids.push(template_idx as i64);
                self.log_index_offsets.push(offsets);
            }
            None => {
                warn!("line {line_idx}: no template matched, storing verbatim as unmatched");
                let offset = self.message_col.push(raw.as_bytes().to_vec());
                self.log_index_ids.push(-1);
                self.log_index_offsets.push(vec![offset]);
            }
        }
    }

    /// Builds per-template word dictionaries (if enabled), applies them,
    /// and freezes every column. `LinesEncoded -> ColumnsFinalized`.
    pub fn finalize_columns(&mut self) {
        assert_eq!(
            self.state,
            EncoderState::LinesEncoded,
            "finalize_columns called before any line was encoded"
        );

        let mut by_template: HashMap<usize, Vec<usize>> = HashMap::new();
        for (slot_pos, slot) in self.pending_messages.iter().enumerate() {
            by_template.entry(slot.template_idx).or_default().push(slot_pos);
        }

        let mut word_dicts: HashMap<usize, WordDictionary> = HashMap::new();
        if self.config.word_dictionaries {
            for (&template_idx, slot_positions) in &by_template {
                if self.templates[template_idx].match_count < 2 {
                    continue;
                }
                let values: Vec<&str> =
                    slot_positions.iter().map(|&i| self.pending_messages[i].raw_value.as_str()).collect();
                let dict = worddict::build(&values, None);
                if !dict.is_empty() {
                    word_dicts.insert(template_idx, dict);
                }
            }
        }

        for slot in &self.pending_messages {
            let encoded = match word_dicts.get(&slot.template_idx) {
                Some(dict) => worddict::encode(&slot.raw_value, dict),
                None => slot.raw_value.as_bytes().to_vec(),
            };
            let id = self.message_col.push(encoded);
            self.log_index_offsets[slot.line_idx][slot.slot_idx] = id;
        }

        debug!("finalize_columns: built {} word dictionaries for {} pending message slots", word_dicts.len(), self.pending_messages.len());
        self.word_dicts = word_dicts;
        self.state = EncoderState::ColumnsFinalized;
    }

    /// Assembles the finalized columns into the container's logical model.
    /// `ColumnsFinalized -> Serialized`.
    pub fn into_compressed_log(mut self) -> CompressedLog {
        assert_eq!(
            self.state,
            EncoderState::ColumnsFinalized,
            "into_compressed_log called before finalize_columns"
        );
        self.state = EncoderState::Serialized;
        debug!("into_compressed_log: serializing {} lines across {} templates", self.original_count, self.templates.len());

        let (timestamps_varint, timestamp_count, timestamp_base) = {
            let (base, count, bytes) = self.timestamp_col.finalize();
            (bytes, count, base)
        };
        let severity_count = self.severity_col.len();
        let ip_count = self.ip_col.len();
        let message_count = self.message_col.len();
        let (severities_varint, severity_list) = self.severity_col.finalize();
        let (ip_addresses_varint, ip_list) = self.ip_col.finalize();
        let (messages_varint, message_list) = self.message_col.finalize();

        let log_index_field_counts: Vec<u32> = self.log_index_offsets.iter().map(|o| o.len() as u32).collect();
        let log_index_fields_varint = {
            let flat: Vec<u64> = self.log_index_offsets.iter().flatten().map(|&o| o as u64).collect();
            crate::codec::varint::encode_all(&flat)
        };
        let log_index_templates_rle = {
            let zigzagged: Vec<u64> = self.log_index_ids.iter().map(|&id| crate::codec::zigzag::encode(id)).collect();
            crate::codec::rle::encode(&zigzagged)
        };

        let template_dicts_serialized = self
            .word_dicts
            .into_iter()
            .map(|(template_idx, dict)| {
                let entries: Vec<(u8, String)> = dict.entries().map(|(&code, word)| (code, word.clone())).collect();
                (self.templates[template_idx].template_id.clone(), entries)
            })
            .collect();

        CompressedLog {
            version: crate::container::CONTAINER_VERSION.to_string(),
            templates: self.templates,
            token_pool: self.token_pool.into_list(),
            template_token_refs: self.template_token_refs,
            timestamps_varint,
            timestamp_base,
            timestamp_count,
            severities_varint,
            severity_count,
            severity_list,
            ip_addresses_varint,
            ip_count,
            ip_list,
            messages_varint,
            message_count,
            message_list,
            log_index_templates_rle,
            log_index_fields_varint,
            log_index_field_counts,
            original_count: self.original_count,
            template_dicts_serialized,
            entropy_dict_present: self.config.entropy_dict.is_some(),
            binary_ip: self.config.binary_ip,
            bwt: self.config.bwt,
            compressed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_rejects_out_of_order_calls() {
        let encoder = Encoder::new(CompressionConfig::default());
        assert_eq!(encoder.state(), EncoderState::Idle);
    }

    #[test]
    #[should_panic(expected = "before extract_templates")]
    fn encode_line_before_extract_templates_panics() {
        let mut encoder = Encoder::new(CompressionConfig::default());
        encoder.encode_line("hello");
    }

    #[test]
    fn unmatched_line_routes_to_messages_with_template_id_negative_one() {
        let mut encoder = Encoder::new(CompressionConfig::default().with_min_support(3));
        encoder.extract_templates(&["a totally unique line with no friends"]);
        encoder.encode_line("a totally unique line with no friends");
        encoder.finalize_columns();
        let log = encoder.into_compressed_log();
        assert_eq!(log.original_count, 1);
        assert_eq!(log.message_list, vec![b"a totally unique line with no friends".to_vec()]);
    }

    #[test]
    fn matched_timestamp_lines_populate_timestamp_column() {
        let lines = [
            "2024-01-01T00:00:00 INFO started",
            "2024-01-01T00:00:01 INFO started",
            "2024-01-01T00:00:02 INFO started",
        ];
        let mut encoder = Encoder::new(CompressionConfig::default().with_min_support(2));
        encoder.extract_templates(&lines);
        for line in lines {
            encoder.encode_line(line);
        }
        encoder.finalize_columns();
        let log = encoder.into_compressed_log();
        assert_eq!(log.timestamp_count, 3);
        assert_eq!(log.original_count, 3);
    }
}
