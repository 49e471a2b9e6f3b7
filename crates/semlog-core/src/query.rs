//! Selective query engine.
//!
//! Touches only the columns a query needs: counting reads the header,
//! severity/IP/time-range queries decode one column and scan it once,
//! and only [`QueryHandle::materialize`] walks template patterns to fully
//! reconstruct lines.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::codec::worddict::{self, WordDictionary};
use crate::codec::{rle, varint, zigzag};
use crate::columns;
use crate::container::{self, CompressedLog};
use crate::error::{ContainerError, QueryError};
use crate::semantic::{ColumnCategory, SemanticType};
use crate::template::{LogTemplate, PatternElement};

/// Outcome shape shared by every filter query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub matched_count: usize,
    pub matched_line_indices: Vec<usize>,
    pub scan_count: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Stats {
    pub total_logs: usize,
    pub templates: usize,
    pub unique_severities: usize,
    pub unique_ips: usize,
    pub unique_messages: usize,
    pub top_severities: Vec<(String, usize)>,
    pub top_templates: Vec<(String, usize)>,
}

/// A single predicate in a [`QueryHandle::query_compound`] call.
pub enum Predicate<'a> {
    Severity(Vec<&'a str>),
    Ip(&'a str),
    TimeRange(i64, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// An opened, decoded container ready to answer queries.
pub struct QueryHandle {
    log: CompressedLog,
    template_ids: Vec<i64>,
    field_offsets: Vec<Vec<u32>>,
    timestamps: Vec<i64>,
    word_dicts: HashMap<String, WordDictionary>,
}

impl QueryHandle {
    pub fn from_bytes(bytes: &[u8], entropy_dict: Option<&[u8]>) -> Result<QueryHandle, ContainerError> {
        let log = container::read(bytes, entropy_dict)?;
        Self::from_log(log)
    }

    pub fn open_file(path: impl AsRef<std::path::Path>, entropy_dict: Option<&[u8]>) -> Result<QueryHandle, ContainerError> {
        let log = container::read_from_file(path, entropy_dict)?;
        Self::from_log(log)
    }

    fn from_log(log: CompressedLog) -> Result<QueryHandle, ContainerError> {
        let zigzagged_ids = rle::decode(&log.log_index_templates_rle, log.original_count)?;
        let template_ids: Vec<i64> = zigzagged_ids.into_iter().map(zigzag::decode).collect();

        let total_fields: usize = log.log_index_field_counts.iter().map(|&c| c as usize).sum();
        let flat_offsets = varint::decode_n(&log.log_index_fields_varint, total_fields)?;
        let mut field_offsets = Vec::with_capacity(log.original_count);
        let mut cursor = 0usize;
        for &count in &log.log_index_field_counts {
            let count = count as usize;
            field_offsets.push(flat_offsets[cursor..cursor + count].iter().map(|&v| v as u32).collect());
            cursor += count;
        }

        let timestamps = columns::decode_timestamps(log.timestamp_base, log.timestamp_count, &log.timestamps_varint)?;

        let word_dicts = log
            .template_dicts_serialized
            .iter()
            .map(|(id, entries)| (id.clone(), WordDictionary::from_entries(entries.clone())))
            .collect();

        Ok(QueryHandle { log, template_ids, field_offsets, timestamps, word_dicts })
    }

    /// O(1): reads `original_count` from the already-decoded header.
    pub fn count(&self) -> usize {
        self.log.original_count
    }

    pub fn query_by_severity(&self, values: &[&str]) -> QueryResult {
        let start = Instant::now();
        let wanted: HashSet<String> = values.iter().map(|v| v.to_ascii_lowercase()).collect();
        let mut matched = Vec::new();
        let mut scan_count = 0usize;
        if !wanted.is_empty() {
            for (line_idx, &template_id) in self.template_ids.iter().enumerate() {
                if template_id < 0 {
                    continue;
                }
                let template = &self.log.templates[template_id as usize];
                if let Some(offset) = self.first_offset_for(template, line_idx, ColumnCategory::Severity) {
                    scan_count += 1;
                    if let Ok(s) = std::str::from_utf8(&self.log.severity_list[offset as usize]) {
                        if wanted.contains(&s.to_ascii_lowercase()) {
                            matched.push(line_idx);
                        }
                    }
                }
            }
        }
        QueryResult { matched_count: matched.len(), matched_line_indices: matched, scan_count, elapsed: start.elapsed() }
    }

    pub fn query_by_ip(&self, value: &str) -> QueryResult {
        let start = Instant::now();
        let needle = columns::encode_ip(value, self.log.binary_ip);
        let mut matched = Vec::new();
        let mut scan_count = 0usize;
        for (line_idx, &template_id) in self.template_ids.iter().enumerate() {
            if template_id < 0 {
                continue;
            }
            let template = &self.log.templates[template_id as usize];
            if let Some(offset) = self.first_offset_for(template, line_idx, ColumnCategory::Ip) {
                scan_count += 1;
                if self.log.ip_list[offset as usize] == needle {
                    matched.push(line_idx);
                }
            }
        }
        QueryResult { matched_count: matched.len(), matched_line_indices: matched, scan_count, elapsed: start.elapsed() }
    }

    pub fn query_time_range(&self, start_ms: i64, end_ms: i64) -> QueryResult {
        let start = Instant::now();
        let mut matched = Vec::new();
        let mut scan_count = 0usize;
        for (line_idx, &template_id) in self.template_ids.iter().enumerate() {
            if template_id < 0 {
                continue;
            }
            let template = &self.log.templates[template_id as usize];
            if let Some(offset) = self.first_offset_for(template, line_idx, ColumnCategory::Timestamp) {
                scan_count += 1;
                if let Some(&ts) = self.timestamps.get(offset as usize) {
                    if ts >= start_ms && ts <= end_ms {
                        matched.push(line_idx);
                    }
                }
            }
        }
        QueryResult { matched_count: matched.len(), matched_line_indices: matched, scan_count, elapsed: start.elapsed() }
    }

    /// Genuine bitmap intersection/union across predicates. The source this
    /// system is modeled on short-circuits on the first predicate instead
    /// of intersecting every one; this always combines all of them.
    pub fn query_compound(&self, predicates: &[Predicate<'_>], combinator: Combinator) -> QueryResult {
        let start = Instant::now();
        if predicates.is_empty() {
            return QueryResult { matched_count: 0, matched_line_indices: Vec::new(), scan_count: 0, elapsed: start.elapsed() };
        }

        let mut scan_count = 0usize;
        let mut sets: Vec<HashSet<usize>> = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let r = match predicate {
                Predicate::Severity(values) => self.query_by_severity(values),
                Predicate::Ip(value) => self.query_by_ip(value),
                Predicate::TimeRange(s, e) => self.query_time_range(*s, *e),
            };
            scan_count += r.scan_count;
            sets.push(r.matched_line_indices.into_iter().collect());
        }

        let mut combined: Vec<usize> = match combinator {
            Combinator::And => {
                let mut iter = sets.into_iter();
                let mut acc = iter.next().unwrap_or_default();
                for s in iter {
                    acc.retain(|idx| s.contains(idx));
                }
                acc.into_iter().collect()
            }
            Combinator::Or => {
                let mut acc: HashSet<usize> = HashSet::new();
                for s in sets {
                    acc.extend(s);
                }
                acc.into_iter().collect()
            }
        };
        combined.sort_unstable();

        QueryResult { matched_count: combined.len(), matched_line_indices: combined, scan_count, elapsed: start.elapsed() }
    }

    pub fn stats(&self) -> Stats {
        let mut severity_counts: HashMap<&[u8], usize> = HashMap::new();
        for (line_idx, &template_id) in self.template_ids.iter().enumerate() {
            if template_id < 0 {
                continue;
            }
            let template = &self.log.templates[template_id as usize];
            if let Some(offset) = self.first_offset_for(template, line_idx, ColumnCategory::Severity) {
                *severity_counts.entry(self.log.severity_list[offset as usize].as_slice()).or_insert(0) += 1;
            }
        }
        let mut top_severities: Vec<(String, usize)> = severity_counts
            .into_iter()
            .map(|(bytes, count)| (String::from_utf8_lossy(bytes).into_owned(), count))
            .collect();
        top_severities.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_severities.truncate(10);

        let mut top_templates: Vec<(String, usize)> =
            self.log.templates.iter().map(|t| (t.template_id.clone(), t.match_count)).collect();
        top_templates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_templates.truncate(10);

        Stats {
            total_logs: self.log.original_count,
            templates: self.log.templates.len(),
            unique_severities: self.log.severity_list.len(),
            unique_ips: self.log.ip_list.len(),
            unique_messages: self.log.message_list.len(),
            top_severities,
            top_templates,
        }
    }

    pub fn materialize(&self, indices: &[usize]) -> Result<Vec<String>, QueryError> {
        indices.iter().map(|&idx| self.reconstruct_line(idx)).collect()
    }

    fn reconstruct_line(&self, line_idx: usize) -> Result<String, QueryError> {
        if line_idx >= self.log.original_count {
            return Err(QueryError::OutOfRange { index: line_idx, original_count: self.log.original_count });
        }
        let template_id = self.template_ids[line_idx];
        let offsets = &self.field_offsets[line_idx];

        if template_id < 0 {
            let offset = offsets.first().copied().unwrap_or(0);
            let bytes = self.log.message_list.get(offset as usize).cloned().unwrap_or_default();
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        let template = &self.log.templates[template_id as usize];
        let mut ph_idx = 0usize;
        let mut parts = Vec::with_capacity(template.pattern.len());
        for element in &template.pattern {
            match element {
                PatternElement::Literal(text) => parts.push(text.clone()),
                PatternElement::Placeholder(sem) => {
                    let offset = offsets.get(ph_idx).copied().unwrap_or(0);
                    parts.push(self.resolve_placeholder(*sem, offset, &template.template_id)?);
                    ph_idx += 1;
                }
            }
        }
        Ok(parts.join(&template.separator.to_string()))
    }

    fn resolve_placeholder(&self, sem: SemanticType, offset: u32, template_id: &str) -> Result<String, QueryError> {
        Ok(match sem.category() {
            ColumnCategory::Timestamp => self.timestamps.get(offset as usize).map(|t| t.to_string()).unwrap_or_default(),
            ColumnCategory::Severity => self
                .log
                .severity_list
                .get(offset as usize)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default(),
            ColumnCategory::Ip => self.log.ip_list.get(offset as usize).map(|b| columns::format_ip(b)).unwrap_or_default(),
            ColumnCategory::Message if sem == SemanticType::MetricValue => {
                let bytes = self.log.message_list.get(offset as usize).cloned().unwrap_or_default();
                columns::decode_metric_value(&bytes).unwrap_or_default()
            }
            ColumnCategory::Message => {
                let bytes = self.log.message_list.get(offset as usize).cloned().unwrap_or_default();
                match self.word_dicts.get(template_id) {
                    Some(dict) => String::from_utf8_lossy(&worddict::decode(&bytes, dict)?).into_owned(),
                    None => String::from_utf8_lossy(&bytes).into_owned(),
                }
            }
        })
    }

    fn first_offset_for(&self, template: &LogTemplate, line_idx: usize, category: ColumnCategory) -> Option<u32> {
        let offsets = &self.field_offsets[line_idx];
        for (k, pos) in template.placeholder_positions().enumerate() {
            if template.field_types[&pos].category() == category {
                return offsets.get(k).copied();
            }
        }
        None
    }
}

/// Thin open/close session wrapper matching the external `open(path) ->
/// handle ... close(handle)` contract. Calling a query method before
/// [`Session::open`] (or after [`Session::close`]) is [`QueryError::NotLoaded`].
#[derive(Default)]
pub struct Session {
    handle: Option<QueryHandle>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, bytes: &[u8], entropy_dict: Option<&[u8]>) -> Result<(), ContainerError> {
        self.handle = Some(QueryHandle::from_bytes(bytes, entropy_dict)?);
        Ok(())
    }

    pub fn open_file(&mut self, path: impl AsRef<std::path::Path>, entropy_dict: Option<&[u8]>) -> Result<(), ContainerError> {
        self.handle = Some(QueryHandle::open_file(path, entropy_dict)?);
        Ok(())
    }

    pub fn close(&mut self) {
        self.handle = None;
    }

    fn handle(&self) -> Result<&QueryHandle, QueryError> {
        self.handle.as_ref().ok_or(QueryError::NotLoaded)
    }

    pub fn count(&self) -> Result<usize, QueryError> {
        Ok(self.handle()?.count())
    }

    pub fn query_by_severity(&self, values: &[&str]) -> Result<QueryResult, QueryError> {
        Ok(self.handle()?.query_by_severity(values))
    }

    pub fn query_by_ip(&self, value: &str) -> Result<QueryResult, QueryError> {
        Ok(self.handle()?.query_by_ip(value))
    }

    pub fn query_time_range(&self, start_ms: i64, end_ms: i64) -> Result<QueryResult, QueryError> {
        Ok(self.handle()?.query_time_range(start_ms, end_ms))
    }

    pub fn query_compound(&self, predicates: &[Predicate<'_>], combinator: Combinator) -> Result<QueryResult, QueryError> {
        Ok(self.handle()?.query_compound(predicates, combinator))
    }

    pub fn stats(&self) -> Result<Stats, QueryError> {
        Ok(self.handle()?.stats())
    }

    pub fn materialize(&self, indices: &[usize]) -> Result<Vec<String>, QueryError> {
        self.handle()?.materialize(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionConfig;
    use crate::encoder::Encoder;

    fn build(lines: &[&str], config: CompressionConfig) -> QueryHandle {
        let mut encoder = Encoder::new(config);
        encoder.extract_templates(lines);
        for &line in lines {
            encoder.encode_line(line);
        }
        encoder.finalize_columns();
        let log = encoder.into_compressed_log();
        let bytes = container::write(&log, None).unwrap();
        QueryHandle::from_bytes(&bytes, None).unwrap()
    }

    fn alternating_severity_lines(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let sev = if i % 2 == 0 { "ERROR" } else { "INFO" };
                format!("2024-01-01T00:00:{i:02} {sev} something happened here today")
            })
            .collect()
    }

    #[test]
    fn severity_query_is_case_insensitive() {
        let owned = alternating_severity_lines(50);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let handle = build(&lines, CompressionConfig::default().with_min_support(2));
        let hits = handle.query_by_severity(&["error"]);
        assert_eq!(hits.matched_count, 25);
        let none = handle.query_by_severity(&["fatal"]);
        assert_eq!(none.matched_count, 0);
    }

    #[test]
    fn time_range_query_matches_contiguous_indices() {
        let base = 1_717_891_200_000i64;
        let owned: Vec<String> = (0..10)
            .map(|i| format!("{} INFO heartbeat", base / 1000 + i))
            .collect();
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let handle = build(&lines, CompressionConfig::default().with_min_support(2));
        let result = handle.query_time_range(base + 3000, base + 6000);
        assert_eq!(result.matched_line_indices, vec![3, 4, 5, 6]);
    }

    #[test]
    fn materialize_unmatched_line_is_verbatim() {
        let lines = ["a totally unique line with no friends"];
        let handle = build(&lines, CompressionConfig::default().with_min_support(3));
        let out = handle.materialize(&[0]).unwrap();
        assert_eq!(out, vec!["a totally unique line with no friends".to_string()]);
    }

    #[test]
    fn materialize_out_of_range_is_an_error() {
        let lines = ["only one line here"];
        let handle = build(&lines, CompressionConfig::default().with_min_support(3));
        let err = handle.materialize(&[5]).unwrap_err();
        assert_eq!(err, QueryError::OutOfRange { index: 5, original_count: 1 });
    }

    #[test]
    fn integer_metric_fields_materialize_through_zigzag_varint() {
        // The template's sole placeholder is voted MetricValue because the
        // first-seen value ("42ms") matches the unit-suffixed metric
        // pattern; bare-integer occurrences at the same position ("17")
        // still carry that field type and so round-trip through the
        // zigzag+varint integer path rather than raw text.
        let owned: Vec<String> = (0..10)
            .map(|i| if i % 2 == 0 { "request took 42ms to finish".to_string() } else { "request took 17 to finish".to_string() })
            .collect();
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let handle = build(&lines, CompressionConfig::default().with_min_support(2));
        let indices: Vec<usize> = (0..10).collect();
        let out = handle.materialize(&indices).unwrap();
        assert_eq!(out, owned);
    }

    #[test]
    fn session_reports_not_loaded_before_open() {
        let session = Session::new();
        assert_eq!(session.count(), Err(QueryError::NotLoaded));
    }

    #[test]
    fn compound_and_intersects_predicates() {
        let owned = alternating_severity_lines(20);
        let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
        let handle = build(&lines, CompressionConfig::default().with_min_support(2));
        let by_severity = handle.query_by_severity(&["error"]).matched_line_indices;
        let result = handle.query_compound(
            &[Predicate::Severity(vec!["error"]), Predicate::TimeRange(0, i64::MAX)],
            Combinator::And,
        );
        assert_eq!(result.matched_line_indices, by_severity);
    }
}
