//! End-to-end scenarios exercising the full encode -> container -> query
//! pipeline together, one test per named scenario plus the cross-cutting
//! quantified invariants.

use pretty_assertions::assert_eq;

use semlog_core::{container, CompressionConfig, Encoder, QueryHandle};

fn compress(lines: &[&str], config: CompressionConfig) -> Vec<u8> {
    let mut encoder = Encoder::new(config);
    encoder.extract_templates(lines);
    for &line in lines {
        encoder.encode_line(line);
    }
    encoder.finalize_columns();
    let log = encoder.into_compressed_log();
    container::write(&log, None).unwrap()
}

#[test]
fn scenario_apache_style_syslog() {
    let lines = [
        "[Thu Jun 09 06:07:04 2005] [notice] LDAP: Built with OpenLDAP",
        "[Thu Jun 09 06:07:05 2005] [notice] LDAP: SSL support unavailable",
        "[Thu Jun 09 06:07:05 2005] [error] env.createBean2(): Factory error",
    ];
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();
    let stats = handle.stats();

    assert!(stats.templates >= 2);
    assert_eq!(stats.unique_severities, 2);
    let severity_names: Vec<String> = stats.top_severities.iter().map(|(s, _)| s.to_lowercase()).collect();
    assert!(severity_names.contains(&"notice".to_string()));
}

#[test]
fn scenario_pipe_delimited_round_trip_without_word_dictionaries() {
    let lines = [
        "2024-01-01T00:00:00|componentA|1111|started processing",
        "2024-01-01T00:00:01|componentB|2222|finished processing",
        "2024-01-01T00:00:02|componentA|3333|retrying",
    ];
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();

    let stats = handle.stats();
    assert_eq!(stats.templates, 1);

    let materialized = handle.materialize(&[0, 1, 2]).unwrap();
    assert_eq!(materialized, lines.iter().map(|s| s.to_string()).collect::<Vec<_>>());
}

#[test]
fn scenario_time_range_query_ten_lines_one_second_apart() {
    let base = 1_717_891_200_000i64;
    let owned: Vec<String> = (0..10).map(|i| format!("{} INFO heartbeat from node", base / 1000 + i)).collect();
    let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();

    let result = handle.query_time_range(base + 3000, base + 6000);
    assert_eq!(result.matched_count, 4);
    assert_eq!(result.matched_line_indices, vec![3, 4, 5, 6]);
}

#[test]
fn scenario_severity_query_fifty_alternating_lines() {
    let owned: Vec<String> = (0..50)
        .map(|i| {
            let sev = if i % 2 == 0 { "ERROR" } else { "INFO" };
            format!("2024-01-01T00:00:{i:02} {sev} worker loop iteration")
        })
        .collect();
    let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();

    assert_eq!(handle.query_by_severity(&["error"]).matched_count, 25);
    assert_eq!(handle.query_by_severity(&["fatal"]).matched_count, 0);
}

#[test]
fn scenario_unmatched_line_is_stored_verbatim_with_template_id_negative_one() {
    // Installs the logger so the encoder's warn!() on unmatched lines and
    // unparseable timestamps is visible under `cargo test -- --nocapture`,
    // the same way sqruff's own integration tests opt in to log output.
    let _ = env_logger::try_init();
    let lines = ["a totally unique line structure seen only once"];
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(3));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();

    assert_eq!(handle.count(), 1);
    let materialized = handle.materialize(&[0]).unwrap();
    assert_eq!(materialized[0], lines[0]);
}

#[test]
fn scenario_bwt_round_trip_with_uneven_blocks() {
    use semlog_core::codec::bwt::{inverse_stream, transform_stream};
    let data = "banana".repeat(43); // 258 bytes
    let encoded = transform_stream(data.as_bytes(), 256);
    let decoded = inverse_stream(&encoded).unwrap();
    assert_eq!(decoded, data.as_bytes());
}

#[test]
fn invariant_decode_then_reencode_yields_identical_bytes_modulo_compressed_at() {
    let lines = [
        "[Thu Jun 09 06:07:04 2005] [notice] LDAP: Built with OpenLDAP",
        "[Thu Jun 09 06:07:05 2005] [notice] LDAP: SSL support unavailable",
        "[Thu Jun 09 06:07:06 2005] [notice] LDAP: a third line here",
    ];
    let config = CompressionConfig::default().with_min_support(2);

    let encode_once = |config: CompressionConfig| {
        let mut encoder = Encoder::new(config);
        encoder.extract_templates(&lines);
        for &line in &lines {
            encoder.encode_line(line);
        }
        encoder.finalize_columns();
        let mut log = encoder.into_compressed_log();
        log.compressed_at = "fixed".to_string();
        log.serialize()
    };

    let first = encode_once(config.clone());
    let second = encode_once(config);
    assert_eq!(first, second);
}

#[test]
fn invariant_field_count_sum_matches_offset_stream_length() {
    let lines = [
        "2024-01-01T00:00:00 ERROR connection refused by 10.0.0.1",
        "2024-01-01T00:00:01 ERROR connection refused by 10.0.0.2",
        "2024-01-01T00:00:02 INFO connection accepted from 10.0.0.3",
    ];
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let log = container::read(&bytes, None).unwrap();

    let total_declared: usize = log.log_index_field_counts.iter().map(|&c| c as usize).sum();
    let decoded = semlog_core::codec::varint::decode_n(&log.log_index_fields_varint, total_declared).unwrap();
    assert_eq!(decoded.len(), total_declared);
}

#[test]
fn invariant_matched_line_fields_round_trip_losslessly() {
    let lines = [
        "2024-01-01T00:00:00 ERROR connection refused by 10.0.0.1",
        "2024-01-01T00:00:01 ERROR connection refused by 10.0.0.2",
        "2024-01-01T00:00:02 INFO connection accepted from 10.0.0.3",
    ];
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();
    let materialized = handle.materialize(&[0, 1, 2]).unwrap();
    assert_eq!(materialized, lines.iter().map(|s| s.to_string()).collect::<Vec<_>>());
}

#[test]
fn invariant_time_range_fully_containing_source_matches_every_timestamped_line() {
    let base = 1_717_891_200_000i64;
    let owned: Vec<String> = (0..10).map(|i| format!("{} INFO heartbeat from node", base / 1000 + i)).collect();
    let lines: Vec<&str> = owned.iter().map(String::as_str).collect();
    let bytes = compress(&lines, CompressionConfig::default().with_min_support(2));
    let handle = QueryHandle::from_bytes(&bytes, None).unwrap();

    let result = handle.query_time_range(i64::MIN, i64::MAX);
    assert_eq!(result.matched_count, 10);
}
