//! Template extraction.
//!
//! Groups structurally similar log lines, aligns them field-by-field, and
//! emits a [`LogTemplate`] per group distinguishing constant positions from
//! typed placeholder positions.

use crate::semantic::{self, SemanticType};
use crate::token::{self, Token};
use ahash::AHashMap;
use itertools::Itertools;
use std::collections::HashMap;

/// One slot in a template's pattern: either fixed text or a typed variable.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    Literal(String),
    Placeholder(SemanticType),
}

/// A structural family of log lines, discovered by [`extract_templates`].
#[derive(Debug, Clone)]
pub struct LogTemplate {
    pub template_id: String,
    pub pattern: Vec<PatternElement>,
    /// Positions in `pattern` (by index) that are placeholders, with their type.
    pub field_types: HashMap<usize, SemanticType>,
    pub match_count: usize,
    pub confidence: f64,
    pub examples: Vec<String>,
    /// Character used to rejoin pattern elements on reconstruction.
    pub separator: char,
}

impl LogTemplate {
    pub fn placeholder_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.pattern.iter().enumerate().filter_map(|(i, e)| match e {
            PatternElement::Placeholder(_) => Some(i),
            PatternElement::Literal(_) => None,
        })
    }

    pub fn num_placeholders(&self) -> usize {
        self.field_types.len()
    }
}

const GROUP_KIND_PREFIX: usize = 10;
const ALIGN_SAMPLE_SIZE: usize = 10;
const SMALL_DISTINCT_THRESHOLD: usize = 3;
const MIN_N_FOR_SMALL_DISTINCT: usize = 10;

struct Line<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    fields: Vec<String>,
}

/// Extracts templates from a corpus of raw lines. Lines whose structural
/// group has fewer than `min_support` members are left out of the returned
/// template set entirely (the caller encodes them as unmatched).
pub fn extract_templates(lines: &[&str], min_support: usize) -> Vec<LogTemplate> {
    if lines.is_empty() {
        return Vec::new();
    }

    let prepared: Vec<Line> = lines
        .iter()
        .map(|&raw| {
            let tokens = token::tokenize(token::normalize_line(raw));
            let fields = token::get_fields(&tokens);
            Line { raw, tokens, fields }
        })
        .collect();

    // Group by (field count, first-K non-whitespace token kinds), preserving
    // first-seen discovery order.
    type GroupKey = (usize, Vec<token::TokenKind>);
    let mut groups: AHashMap<GroupKey, Vec<usize>> = AHashMap::new();
    let mut order: Vec<GroupKey> = Vec::new();

    for (idx, line) in prepared.iter().enumerate() {
        let key_kinds: Vec<token::TokenKind> = line
            .tokens
            .iter()
            .filter(|t| t.kind != token::TokenKind::Whitespace)
            .take(GROUP_KIND_PREFIX)
            .map(|t| t.kind)
            .collect();
        let key = (line.fields.len(), key_kinds);
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Vec::new()
        });
        entry.push(idx);
    }

    let mut templates = Vec::new();
    for key in &order {
        let members = &groups[key];
        if members.len() < min_support {
            continue;
        }
        let template_id = format!("{:04}", templates.len());
        let template = build_template(&template_id, members, &prepared);
        templates.push(template);
    }

    templates
}

fn build_template(template_id: &str, members: &[usize], prepared: &[Line]) -> LogTemplate {
    let n = members.len();
    let max_fields = members.iter().map(|&i| prepared[i].fields.len()).max().unwrap_or(0);

    let mut pattern = Vec::with_capacity(max_fields);
    let mut field_types = HashMap::new();

    for p in 0..max_fields {
        let values: Vec<&str> = members
            .iter()
            .filter_map(|&i| prepared[i].fields.get(p).map(|s| s.as_str()))
            .collect();
        let distinct: Vec<&str> = values.iter().copied().unique().collect();

        let element = if distinct.len() == 1 {
            let value = distinct[0];
            let matches = semantic::recognize(value, None);
            if matches[0].confidence >= 0.80 {
                field_types.insert(p, matches[0].semantic_type);
                PatternElement::Placeholder(matches[0].semantic_type)
            } else {
                PatternElement::Literal(value.to_string())
            }
        } else if distinct.len() <= SMALL_DISTINCT_THRESHOLD && n >= MIN_N_FOR_SMALL_DISTINCT {
            let sample = distinct[0];
            let matches = semantic::recognize(sample, None);
            if matches[0].confidence >= 0.75 {
                field_types.insert(p, matches[0].semantic_type);
                PatternElement::Placeholder(matches[0].semantic_type)
            } else {
                field_types.insert(p, SemanticType::Unknown);
                PatternElement::Placeholder(SemanticType::Unknown)
            }
        } else {
            let mut weights: rustc_hash::FxHashMap<SemanticType, f64> = rustc_hash::FxHashMap::default();
            for &v in values.iter().take(ALIGN_SAMPLE_SIZE) {
                let m = &semantic::recognize(v, None)[0];
                *weights.entry(m.semantic_type).or_insert(0.0) += m.confidence;
            }
            let top = weights
                .into_iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .map(|(t, _)| t)
                .unwrap_or(SemanticType::Unknown);
            field_types.insert(p, top);
            PatternElement::Placeholder(top)
        };
        pattern.push(element);
    }

    let examples = members.iter().take(5).map(|&i| prepared[i].raw.to_string()).collect();
    let separator = token::join_separator(&prepared[members[0]].tokens);

    LogTemplate {
        template_id: template_id.to_string(),
        pattern,
        field_types,
        match_count: n,
        confidence: n as f64 / (n as f64 + 10.0),
        examples,
        separator,
    }
}

/// Finds the template (if any) whose field count is within 2 of `fields`,
/// and returns its index alongside the ordered list of values at its
/// placeholder positions. Ties broken by lower template index.
pub fn match_line(templates: &[LogTemplate], fields: &[String]) -> Option<(usize, Vec<String>)> {
    for (idx, template) in templates.iter().enumerate() {
        let diff = (template.pattern.len() as i64 - fields.len() as i64).abs();
        if diff <= 2 {
            let values = template
                .placeholder_positions()
                .map(|p| fields.get(p).cloned().unwrap_or_default())
                .collect();
            return Some((idx, values));
        }
    }
    None
}

/// Convenience wrapper tokenizing+matching a raw line in one call.
pub fn match_raw_line(templates: &[LogTemplate], raw: &str) -> Option<(usize, Vec<String>)> {
    let tokens = token::tokenize(token::normalize_line(raw));
    let fields = token::get_fields(&tokens);
    match_line(templates, &fields)
}

/// Encodes a single pattern element as the string key stored in the global
/// token pool: `L:` prefixes a literal, `P:` prefixes a placeholder's
/// [`SemanticType`] tag.
pub fn pattern_element_key(element: &PatternElement) -> String {
    match element {
        PatternElement::Literal(text) => format!("L:{text}"),
        PatternElement::Placeholder(sem) => format!("P:{}", sem.tag()),
    }
}

/// Reverses [`pattern_element_key`]. Returns `None` for a key in neither
/// form, or a `P:` key whose tag is not a known semantic type.
pub fn decode_pattern_element(key: &str) -> Option<PatternElement> {
    if let Some(text) = key.strip_prefix("L:") {
        Some(PatternElement::Literal(text.to_string()))
    } else if let Some(tag) = key.strip_prefix("P:") {
        SemanticType::from_tag(tag).map(PatternElement::Placeholder)
    } else {
        None
    }
}

/// Rebuilds a template's `pattern` and `field_types` from the token pool and
/// its list of pool indices, as stored in a container's
/// `template_token_refs`.
pub fn reconstruct_pattern(
    pool: &[String],
    refs: &[u32],
) -> Option<(Vec<PatternElement>, HashMap<usize, SemanticType>)> {
    let mut pattern = Vec::with_capacity(refs.len());
    let mut field_types = HashMap::new();
    for (pos, &r) in refs.iter().enumerate() {
        let key = pool.get(r as usize)?;
        let element = decode_pattern_element(key)?;
        if let PatternElement::Placeholder(sem) = element {
            field_types.insert(pos, sem);
        }
        pattern.push(element);
    }
    Some((pattern, field_types))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_templates() {
        assert!(extract_templates(&[], 3).is_empty());
    }

    #[test]
    fn apache_syslog_groups_the_two_notice_lines() {
        let lines = [
            "[Thu Jun 09 06:07:04 2005] [notice] LDAP: Built with OpenLDAP",
            "[Thu Jun 09 06:07:05 2005] [notice] LDAP: SSL support unavailable",
            "[Thu Jun 09 06:07:06 2005] [notice] LDAP: another line here",
        ];
        let templates = extract_templates(&lines, 2);
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        assert_eq!(t.pattern[0], PatternElement::Placeholder(SemanticType::Timestamp));
        assert_eq!(t.pattern[1], PatternElement::Placeholder(SemanticType::Severity));
        assert_eq!(t.match_count, 3);
    }

    #[test]
    fn group_below_min_support_is_dropped() {
        let lines = ["a totally unique line with no friends"];
        let templates = extract_templates(&lines, 3);
        assert!(templates.is_empty());
    }

    #[test]
    fn pattern_element_key_round_trips() {
        let lit = PatternElement::Literal("LDAP:".to_string());
        let ph = PatternElement::Placeholder(SemanticType::Timestamp);
        assert_eq!(decode_pattern_element(&pattern_element_key(&lit)), Some(lit));
        assert_eq!(decode_pattern_element(&pattern_element_key(&ph)), Some(ph));
    }

    #[test]
    fn pipe_delimited_lines_form_one_four_field_template() {
        let lines = [
            "2024-01-01T00:00:00|componentA|1111|started processing",
            "2024-01-01T00:00:01|componentB|2222|finished processing",
            "2024-01-01T00:00:02|componentA|3333|retrying",
        ];
        let templates = extract_templates(&lines, 2);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].pattern.len(), 4);
        assert_eq!(templates[0].separator, '|');
    }
}
