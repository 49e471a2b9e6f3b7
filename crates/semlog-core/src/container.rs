//! The container's logical model plus its binary writer/reader.
//!
//! On-disk layout, outer to inner:
//!
//! ```text
//! magic: b"SLG1"
//! bwt_flag: u8
//! entropy_dict_flag: u8
//! zstd-compressed payload (optionally using a caller-supplied shared
//!   dictionary)
//!   └── [if bwt_flag] block-wise BWT stream (see codec::bwt)
//!       └── structured record (see crate::record)
//! ```
//!
//! The magic and two flag bytes sit outside the entropy-coded payload
//! because the reader needs them to pick a decompression/BWT strategy
//! before anything else can be parsed.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::codec::{rle, varint, zigzag};
use crate::error::ContainerError;
use crate::record::{RecordReader, RecordWriter};
use crate::semantic::ColumnCategory;
use crate::template::{self, LogTemplate};

pub const CONTAINER_VERSION: &str = "semlog-v1";
const MAGIC: &[u8; 4] = b"SLG1";
const ZSTD_LEVEL: i32 = 19;

/// The container's logical model: every column, dictionary, and index the
/// query engine needs, plus enough template metadata to reconstruct lines.
#[derive(Debug, Clone)]
pub struct CompressedLog {
    pub version: String,
    pub templates: Vec<LogTemplate>,
    pub token_pool: Vec<String>,
    pub template_token_refs: Vec<Vec<u32>>,
    pub timestamps_varint: Vec<u8>,
    pub timestamp_base: i64,
    pub timestamp_count: usize,
    pub severities_varint: Vec<u8>,
    pub severity_count: usize,
    pub severity_list: Vec<Vec<u8>>,
    pub ip_addresses_varint: Vec<u8>,
    pub ip_count: usize,
    pub ip_list: Vec<Vec<u8>>,
    pub messages_varint: Vec<u8>,
    pub message_count: usize,
    pub message_list: Vec<Vec<u8>>,
    pub log_index_templates_rle: Vec<u8>,
    pub log_index_fields_varint: Vec<u8>,
    pub log_index_field_counts: Vec<u32>,
    pub original_count: usize,
    pub template_dicts_serialized: HashMap<String, Vec<(u8, String)>>,
    pub entropy_dict_present: bool,
    pub binary_ip: bool,
    pub bwt: bool,
    pub compressed_at: String,
}

impl CompressedLog {
    /// Serializes every field into the structured-record wire format.
    /// `field_types` is deliberately not written: it is always derivable
    /// from `(token_pool, template_token_refs[i])`, and the container
    /// dedups everything else derivable that way (the token pool exists
    /// for exactly this reason), so storing it twice would contradict
    /// that policy.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.write_str(&self.version);
        w.write_u64(self.templates.len() as u64);
        for t in &self.templates {
            w.write_str(&t.template_id);
            w.write_u64(t.match_count as u64);
            w.write_u8(t.separator as u8);
        }
        w.write_str_list(&self.token_pool);
        w.write_u64(self.template_token_refs.len() as u64);
        for refs in &self.template_token_refs {
            w.write_u32_list(refs);
        }

        let mut dict_entries: Vec<(&String, &Vec<(u8, String)>)> = self.template_dicts_serialized.iter().collect();
        dict_entries.sort_by(|a, b| a.0.cmp(b.0));
        w.write_u64(dict_entries.len() as u64);
        for (template_id, entries) in dict_entries {
            w.write_str(template_id);
            w.write_u64(entries.len() as u64);
            for (code, word) in entries {
                w.write_u8(*code);
                w.write_str(word);
            }
        }

        w.write_bytes(&self.timestamps_varint);
        w.write_i64(self.timestamp_base);
        w.write_u64(self.timestamp_count as u64);
        w.write_bytes(&self.severities_varint);
        w.write_u64(self.severity_count as u64);
        w.write_bytes_list(&self.severity_list);
        w.write_bytes(&self.ip_addresses_varint);
        w.write_u64(self.ip_count as u64);
        w.write_bytes_list(&self.ip_list);
        w.write_bytes(&self.messages_varint);
        w.write_u64(self.message_count as u64);
        w.write_bytes_list(&self.message_list);
        w.write_bytes(&self.log_index_templates_rle);
        w.write_bytes(&self.log_index_fields_varint);
        w.write_u32_list(&self.log_index_field_counts);
        w.write_u64(self.original_count as u64);
        w.write_str(&self.compressed_at);
        w.write_u8(self.binary_ip as u8);
        w.write_u8(self.bwt as u8);
        w.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<CompressedLog, ContainerError> {
        struct TemplateMeta {
            template_id: String,
            match_count: usize,
            separator: char,
        }

        let mut r = RecordReader::new(bytes);
        let version = r.read_str("version")?;
        let template_count = r.read_u64("template_count")? as usize;
        let mut metas = Vec::with_capacity(template_count);
        for _ in 0..template_count {
            let template_id = r.read_str("template_id")?;
            let match_count = r.read_u64("match_count")? as usize;
            let separator = r.read_u8("separator")? as char;
            metas.push(TemplateMeta { template_id, match_count, separator });
        }

        let token_pool = r.read_str_list("token_pool")?;
        let refs_count = r.read_u64("template_token_refs_count")? as usize;
        if refs_count != metas.len() {
            return Err(ContainerError::CorruptContainer(
                "template_token_refs count does not match templates count".into(),
            ));
        }
        let mut templates = Vec::with_capacity(metas.len());
        let mut template_token_refs = Vec::with_capacity(metas.len());
        for meta in metas {
            let refs = r.read_u32_list("template_token_refs")?;
            let (pattern, field_types) = template::reconstruct_pattern(&token_pool, &refs).ok_or_else(|| {
                ContainerError::CorruptContainer("template pattern references an unknown token pool entry".into())
            })?;
            let confidence = meta.match_count as f64 / (meta.match_count as f64 + 10.0);
            templates.push(LogTemplate {
                template_id: meta.template_id,
                pattern,
                field_types,
                match_count: meta.match_count,
                confidence,
                examples: Vec::new(),
                separator: meta.separator,
            });
            template_token_refs.push(refs);
        }

        let dict_count = r.read_u64("template_dicts_count")? as usize;
        let mut template_dicts_serialized = HashMap::with_capacity(dict_count);
        for _ in 0..dict_count {
            let template_id = r.read_str("template_dict_id")?;
            let entry_count = r.read_u64("template_dict_entries")? as usize;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                let code = r.read_u8("word_code")?;
                let word = r.read_str("word")?;
                entries.push((code, word));
            }
            template_dicts_serialized.insert(template_id, entries);
        }

        let timestamps_varint = r.read_bytes("timestamps_varint")?;
        let timestamp_base = r.read_i64("timestamp_base")?;
        let timestamp_count = r.read_u64("timestamp_count")? as usize;
        let severities_varint = r.read_bytes("severities_varint")?;
        let severity_count = r.read_u64("severity_count")? as usize;
        let severity_list = r.read_bytes_list("severity_list")?;
        let ip_addresses_varint = r.read_bytes("ip_addresses_varint")?;
        let ip_count = r.read_u64("ip_count")? as usize;
        let ip_list = r.read_bytes_list("ip_list")?;
        let messages_varint = r.read_bytes("messages_varint")?;
        let message_count = r.read_u64("message_count")? as usize;
        let message_list = r.read_bytes_list("message_list")?;
        let log_index_templates_rle = r.read_bytes("log_index_templates_rle")?;
        let log_index_fields_varint = r.read_bytes("log_index_fields_varint")?;
        let log_index_field_counts = r.read_u32_list("log_index_field_counts")?;
        let original_count = r.read_u64("original_count")? as usize;
        let compressed_at = r.read_str("compressed_at")?;
        let binary_ip = r.read_u8("binary_ip")? != 0;
        let bwt = r.read_u8("bwt")? != 0;

        Ok(CompressedLog {
            version,
            templates,
            token_pool,
            template_token_refs,
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
            original_count,
            template_dicts_serialized,
            entropy_dict_present: false,
            binary_ip,
            bwt,
            compressed_at,
        })
    }

    /// Checks every invariant from the data model: the log index expands to
    /// exactly `original_count` entries, field-count bookkeeping is
    /// internally consistent, and no offset into a category column falls
    /// outside that column's bounds.
    pub fn validate(&self) -> Result<(), ContainerError> {
        let zigzagged_ids = rle::decode(&self.log_index_templates_rle, self.original_count)?;
        if zigzagged_ids.len() != self.original_count {
            return Err(ContainerError::CorruptContainer(format!(
                "log index expands to {} entries, expected {}",
                zigzagged_ids.len(),
                self.original_count
            )));
        }
        if self.log_index_field_counts.len() != self.original_count {
            return Err(ContainerError::CorruptContainer(
                "log_index_field_counts length does not match original_count".into(),
            ));
        }

        let total_field_count: usize = self.log_index_field_counts.iter().map(|&c| c as usize).sum();
        let decoded_offsets = varint::decode_n(&self.log_index_fields_varint, total_field_count)?;
        if decoded_offsets.len() != total_field_count {
            return Err(ContainerError::CorruptContainer(
                "log_index_field_counts does not match the field offset stream length".into(),
            ));
        }

        let mut cursor = 0usize;
        for (line_idx, &zz) in zigzagged_ids.iter().enumerate() {
            let template_id = zigzag::decode(zz);
            let count = self.log_index_field_counts[line_idx] as usize;
            let offsets = &decoded_offsets[cursor..cursor + count];
            cursor += count;

            if template_id == -1 {
                if let Some(&offset) = offsets.first() {
                    if offset as usize >= self.message_list.len() {
                        return Err(ContainerError::CorruptContainer(format!(
                            "line {line_idx} messages offset {offset} is out of range"
                        )));
                    }
                }
                continue;
            }

            let template = self.templates.get(template_id as usize).ok_or_else(|| {
                ContainerError::CorruptContainer(format!("line {line_idx} references unknown template {template_id}"))
            })?;
            if template.num_placeholders() != count {
                return Err(ContainerError::CorruptContainer(format!(
                    "line {line_idx} has {count} field offsets, template {template_id} expects {}",
                    template.num_placeholders()
                )));
            }

            for (pos, &offset) in template.placeholder_positions().zip(offsets.iter()) {
                let category = template.field_types[&pos].category();
                let limit = match category {
                    ColumnCategory::Timestamp => self.timestamp_count,
                    ColumnCategory::Severity => self.severity_list.len(),
                    ColumnCategory::Ip => self.ip_list.len(),
                    ColumnCategory::Message => self.message_list.len(),
                };
                if offset as usize >= limit {
                    return Err(ContainerError::CorruptContainer(format!(
                        "line {line_idx} offset {offset} exceeds column length {limit}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn zstd_compress(data: &[u8], dict: Option<&[u8]>, level: i32) -> Result<Vec<u8>, ContainerError> {
    let mut out = Vec::new();
    match dict {
        Some(d) => {
            let mut encoder = zstd::Encoder::with_dictionary(&mut out, level, d)?;
            encoder.write_all(data)?;
            encoder.finish()?;
        }
        None => {
            let mut encoder = zstd::Encoder::new(&mut out, level)?;
            encoder.write_all(data)?;
            encoder.finish()?;
        }
    }
    Ok(out)
}

fn zstd_decompress(data: &[u8], dict: Option<&[u8]>) -> Result<Vec<u8>, ContainerError> {
    let mut out = Vec::new();
    match dict {
        Some(d) => {
            let mut decoder = zstd::Decoder::with_dictionary(data, d)?;
            decoder.read_to_end(&mut out)?;
        }
        None => {
            let mut decoder = zstd::Decoder::new(data)?;
            decoder.read_to_end(&mut out)?;
        }
    }
    Ok(out)
}

/// Writes `log` to its on-disk byte representation. `entropy_dict` must be
/// the exact same bytes supplied to [`read`] for this container later.
pub fn write(log: &CompressedLog, entropy_dict: Option<&[u8]>) -> Result<Vec<u8>, ContainerError> {
    debug!("container::write: {} lines, bwt={}, entropy_dict={}", log.original_count, log.bwt, entropy_dict.is_some());
    let record_bytes = log.serialize();
    let payload = if log.bwt {
        crate::codec::bwt::transform_stream(&record_bytes, crate::codec::bwt::DEFAULT_BLOCK_SIZE)
    } else {
        record_bytes
    };
    let compressed = zstd_compress(&payload, entropy_dict, ZSTD_LEVEL)?;

    let mut out = Vec::with_capacity(compressed.len() + 6);
    out.extend_from_slice(MAGIC);
    out.push(log.bwt as u8);
    out.push(entropy_dict.is_some() as u8);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Reads and fully validates a container previously produced by [`write`].
pub fn read(bytes: &[u8], entropy_dict: Option<&[u8]>) -> Result<CompressedLog, ContainerError> {
    if bytes.len() < 6 || &bytes[0..4] != MAGIC {
        return Err(ContainerError::CorruptContainer("missing or invalid magic header".into()));
    }
    let bwt_applied = bytes[4] != 0;
    let dict_expected = bytes[5] != 0;
    if dict_expected != entropy_dict.is_some() {
        return Err(ContainerError::CorruptContainer(
            "entropy dictionary presence does not match how the container was written".into(),
        ));
    }

    let payload = zstd_decompress(&bytes[6..], entropy_dict)?;
    let record_bytes = if bwt_applied { crate::codec::bwt::inverse_stream(&payload)? } else { payload };

    let mut log = CompressedLog::deserialize(&record_bytes)?;
    if log.version != CONTAINER_VERSION {
        return Err(ContainerError::UnsupportedVersion {
            found: log.version.clone(),
            expected: CONTAINER_VERSION.to_string(),
        });
    }
    log.entropy_dict_present = entropy_dict.is_some();
    log.validate()?;
    debug!("container::read: loaded {} lines across {} templates", log.original_count, log.templates.len());
    Ok(log)
}

/// Writes a container to a file path. The only disk I/O the core performs.
pub fn write_to_file(path: impl AsRef<Path>, log: &CompressedLog, entropy_dict: Option<&[u8]>) -> Result<(), ContainerError> {
    let bytes = write(log, entropy_dict)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn read_from_file(path: impl AsRef<Path>, entropy_dict: Option<&[u8]>) -> Result<CompressedLog, ContainerError> {
    let bytes = std::fs::read(path)?;
    read(&bytes, entropy_dict)
}
