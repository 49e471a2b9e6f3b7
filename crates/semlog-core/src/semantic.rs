//! Semantic type recognition.
//!
//! Maps a single extracted field value to a ranked list of candidate
//! [`SemanticType`]s. Recognition never fails outright: an unrecognized
//! value still yields a single low-confidence [`SemanticType::Message`]
//! match, so callers never have to special-case "nothing matched".

use lazy_regex::regex_is_match;

/// The closed set of semantic categories a field value can be labeled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Timestamp,
    IpAddress,
    Port,
    UserId,
    ProcessId,
    ThreadId,
    ErrorCode,
    MetricValue,
    MetricUnit,
    Status,
    Severity,
    Module,
    Function,
    Filename,
    Host,
    Url,
    Action,
    Message,
    RequestId,
    Unknown,
}

impl SemanticType {
    /// Stable short tag used in the container's field-types map and the
    /// token-pool placeholder encoding. Never renamed across versions.
    pub const fn tag(self) -> &'static str {
        match self {
            SemanticType::Timestamp => "TIMESTAMP",
            SemanticType::IpAddress => "IP_ADDRESS",
            SemanticType::Port => "PORT",
            SemanticType::UserId => "USER_ID",
            SemanticType::ProcessId => "PROCESS_ID",
            SemanticType::ThreadId => "THREAD_ID",
            SemanticType::ErrorCode => "ERROR_CODE",
            SemanticType::MetricValue => "METRIC_VALUE",
            SemanticType::MetricUnit => "METRIC_UNIT",
            SemanticType::Status => "STATUS",
            SemanticType::Severity => "SEVERITY",
            SemanticType::Module => "MODULE",
            SemanticType::Function => "FUNCTION",
            SemanticType::Filename => "FILENAME",
            SemanticType::Host => "HOST",
            SemanticType::Url => "URL",
            SemanticType::Action => "ACTION",
            SemanticType::Message => "MESSAGE",
            SemanticType::RequestId => "REQUEST_ID",
            SemanticType::Unknown => "UNKNOWN",
        }
    }

    pub fn from_tag(tag: &str) -> Option<SemanticType> {
        Some(match tag {
            "TIMESTAMP" => SemanticType::Timestamp,
            "IP_ADDRESS" => SemanticType::IpAddress,
            "PORT" => SemanticType::Port,
            "USER_ID" => SemanticType::UserId,
            "PROCESS_ID" => SemanticType::ProcessId,
            "THREAD_ID" => SemanticType::ThreadId,
            "ERROR_CODE" => SemanticType::ErrorCode,
            "METRIC_VALUE" => SemanticType::MetricValue,
            "METRIC_UNIT" => SemanticType::MetricUnit,
            "STATUS" => SemanticType::Status,
            "SEVERITY" => SemanticType::Severity,
            "MODULE" => SemanticType::Module,
            "FUNCTION" => SemanticType::Function,
            "FILENAME" => SemanticType::Filename,
            "HOST" => SemanticType::Host,
            "URL" => SemanticType::Url,
            "ACTION" => SemanticType::Action,
            "MESSAGE" => SemanticType::Message,
            "REQUEST_ID" => SemanticType::RequestId,
            "UNKNOWN" => SemanticType::Unknown,
            _ => return None,
        })
    }

    /// The columnar category a placeholder of this type is routed to.
    pub fn category(self) -> ColumnCategory {
        match self {
            SemanticType::Timestamp => ColumnCategory::Timestamp,
            SemanticType::Severity | SemanticType::Status => ColumnCategory::Severity,
            SemanticType::IpAddress | SemanticType::Host => ColumnCategory::Ip,
            _ => ColumnCategory::Message,
        }
    }
}

/// The three columnar buckets a matched placeholder value is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnCategory {
    Timestamp,
    Severity,
    Ip,
    Message,
}

/// A candidate label for a field value, with the evidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub semantic_type: SemanticType,
    pub matched_value: String,
    pub confidence: f64,
    pub pattern_name: &'static str,
    pub span: std::ops::Range<usize>,
}

/// Context a caller can supply to sharpen recognition of otherwise-ambiguous
/// bare values (e.g. a lone integer that is a port only because the
/// preceding token was the word "port").
#[derive(Debug, Clone, Default)]
pub struct RecognizeContext<'a> {
    pub preceding_token: Option<&'a str>,
}

/// Category precedence used to break confidence ties. Types not listed
/// here sort after all listed types, in enum declaration order.
fn category_rank(t: SemanticType) -> usize {
    const ORDER: [SemanticType; 14] = [
        SemanticType::Timestamp,
        SemanticType::IpAddress,
        SemanticType::Port,
        SemanticType::Severity,
        SemanticType::Status,
        SemanticType::ErrorCode,
        SemanticType::UserId,
        SemanticType::ProcessId,
        SemanticType::MetricValue,
        SemanticType::Module,
        SemanticType::RequestId,
        SemanticType::Filename,
        SemanticType::Host,
        SemanticType::Action,
    ];
    ORDER.iter().position(|&o| o == t).unwrap_or(ORDER.len())
}

const SEVERITY_KEYWORDS: &[&str] = &[
    "trace", "debug", "info", "notice", "warn", "warning", "error", "err", "critical", "crit",
    "fatal", "alert", "emergency",
];
const STATUS_KEYWORDS: &[&str] = &["success", "failure", "failed", "ok", "passed", "pass"];
const ACTION_KEYWORDS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "login", "logout", "connect",
    "disconnect", "start", "stop", "create", "update", "restart", "shutdown",
];
const METRIC_UNITS: &[&str] = &["ms", "s", "m", "h", "ns", "us", "mb", "gb", "kb", "b", "%", "req/s"];

fn is_keyword(value: &str, keywords: &[&str]) -> bool {
    let lower = value.to_ascii_lowercase();
    keywords.contains(&lower.as_str())
}

fn preceding_is(context: Option<&RecognizeContext>, keywords: &[&str]) -> bool {
    context
        .and_then(|c| c.preceding_token)
        .map(|p| is_keyword(p, keywords))
        .unwrap_or(false)
}

fn push(out: &mut Vec<SemanticMatch>, t: SemanticType, value: &str, confidence: f64, name: &'static str) {
    out.push(SemanticMatch {
        semantic_type: t,
        matched_value: value.to_string(),
        confidence,
        pattern_name: name,
        span: 0..value.len(),
    });
}

/// Recognizes `value`, returning every candidate match sorted by confidence
/// descending, then by [`category_rank`] ascending on ties.
pub fn recognize(value: &str, context: Option<&RecognizeContext>) -> Vec<SemanticMatch> {
    let mut out = Vec::new();

    // --- TIMESTAMP -------------------------------------------------------
    if regex_is_match!(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$", value) {
        push(&mut out, SemanticType::Timestamp, value, 0.95, "iso8601");
    }
    if regex_is_match!(r"^[A-Za-z]{3} [A-Za-z]{3} \d{2} \d{2}:\d{2}:\d{2} \d{4}$", value) {
        push(&mut out, SemanticType::Timestamp, value, 0.92, "apache_ctime");
    }
    if regex_is_match!(r"^[A-Za-z]{3}\s+\d{1,2} \d{2}:\d{2}:\d{2}$", value) {
        push(&mut out, SemanticType::Timestamp, value, 0.90, "syslog_short");
    }
    if regex_is_match!(r"^\d{10}(\d{3})?$", value) {
        push(&mut out, SemanticType::Timestamp, value, 0.85, "epoch");
    }
    if regex_is_match!(r"^\d{2}:\d{2}:\d{2}(\.\d+)?$", value) {
        push(&mut out, SemanticType::Timestamp, value, 0.70, "time_of_day");
    }

    // --- IP_ADDRESS / HOST -------------------------------------------------
    if regex_is_match!(r"^(\d{1,3}\.){3}\d{1,3}$", value) && value.split('.').all(|o| o.parse::<u32>().map(|n| n <= 255).unwrap_or(false)) {
        push(&mut out, SemanticType::IpAddress, value, 0.95, "ipv4");
    }

    // --- PORT --------------------------------------------------------------
    if preceding_is(context, &["port", "listening"]) {
        if let Ok(n) = value.parse::<u32>() {
            if n >= 1 && n <= 65535 {
                push(&mut out, SemanticType::Port, value, 0.85, "keyword_port");
            }
        }
    }

    // --- SEVERITY / STATUS ---------------------------------------------------
    if is_keyword(value, SEVERITY_KEYWORDS) {
        push(&mut out, SemanticType::Severity, value, 0.93, "severity_keyword");
    }
    if is_keyword(value, STATUS_KEYWORDS) {
        push(&mut out, SemanticType::Status, value, 0.80, "status_keyword");
    }
    if let Ok(n) = value.parse::<u32>() {
        if (100..=599).contains(&n) && value.len() == 3 {
            push(&mut out, SemanticType::Status, value, 0.80, "http_status");
        }
    }

    // --- ERROR_CODE ----------------------------------------------------------
    if regex_is_match!(r"(?i)^(E|ERR|ERROR)[-_]?\d{2,6}$", value) {
        push(&mut out, SemanticType::ErrorCode, value, 0.85, "error_code");
    }
    if regex_is_match!(r"^0x[0-9A-Fa-f]{2,8}$", value) {
        push(&mut out, SemanticType::ErrorCode, value, 0.80, "hex_code");
    }

    // --- USER_ID -------------------------------------------------------------
    if preceding_is(context, &["user", "uid", "username"]) && regex_is_match!(r"^[\w.-]+$", value) {
        push(&mut out, SemanticType::UserId, value, 0.92, "keyword_user");
    }
    if regex_is_match!(r"^[\w.+-]+@[\w-]+\.[\w.-]+$", value) {
        push(&mut out, SemanticType::UserId, value, 0.88, "email");
    }

    // --- PROCESS_ID / THREAD_ID -----------------------------------------------
    if preceding_is(context, &["pid", "process"]) {
        if let Ok(_n) = value.parse::<u64>() {
            push(&mut out, SemanticType::ProcessId, value, 0.92, "keyword_pid");
        }
    }
    if preceding_is(context, &["tid", "thread"]) {
        if let Ok(_n) = value.parse::<u64>() {
            push(&mut out, SemanticType::ThreadId, value, 0.90, "keyword_thread_id");
        }
    }

    // --- METRIC_VALUE / METRIC_UNIT --------------------------------------------
    if regex_is_match!(r"(?i)^-?\d+(\.\d+)?(ms|ns|us|s|m|h|mb|gb|kb|b|%)$", value) {
        push(&mut out, SemanticType::MetricValue, value, 0.85, "metric_with_unit");
    } else if regex_is_match!(r"^-?\d+\.\d+$", value) {
        push(&mut out, SemanticType::MetricValue, value, 0.65, "bare_decimal");
    }
    if is_keyword(value, METRIC_UNITS) {
        push(&mut out, SemanticType::MetricUnit, value, 0.75, "unit_keyword");
    }

    // --- REQUEST_ID ------------------------------------------------------------
    if regex_is_match!(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$", value) {
        push(&mut out, SemanticType::RequestId, value, 0.93, "uuid");
    }
    if preceding_is(context, &["request_id", "req_id", "trace_id"]) && regex_is_match!(r"^[\w-]{6,}$", value) {
        push(&mut out, SemanticType::RequestId, value, 0.85, "keyword_request_id");
    }

    // --- MODULE / FUNCTION -------------------------------------------------------
    if regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+\(\)?:?$", value) {
        push(&mut out, SemanticType::Function, value, 0.80, "function_call");
    } else if regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+$", value) {
        push(&mut out, SemanticType::Module, value, 0.85, "dotted_module");
    }

    // --- FILENAME ------------------------------------------------------------------
    if regex_is_match!(
        r"(?i)^[\w./-]+\.(log|txt|py|rs|java|c|cpp|go|js|ts|conf|cfg|ya?ml|json|xml|sql)$",
        value
    ) {
        push(&mut out, SemanticType::Filename, value, 0.85, "filename_ext");
    } else if regex_is_match!(r"^/[\w./-]+$", value) {
        push(&mut out, SemanticType::Filename, value, 0.75, "unix_path");
    }

    // --- HOST --------------------------------------------------------------------
    if regex_is_match!(r"^([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}$", value) {
        push(&mut out, SemanticType::Host, value, 0.80, "hostname");
    }

    // --- URL -----------------------------------------------------------------------
    if regex_is_match!(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$", value) {
        push(&mut out, SemanticType::Url, value, 0.90, "url");
    }

    // --- ACTION ----------------------------------------------------------------------
    if is_keyword(value, ACTION_KEYWORDS) {
        push(&mut out, SemanticType::Action, value, 0.75, "action_keyword");
    }

    // --- bare small integer: weak PROCESS_ID signal, the lowest-confidence
    // pattern in the table so any more specific match always outranks it.
    if regex_is_match!(r"^\d{1,7}$", value) {
        push(&mut out, SemanticType::ProcessId, value, 0.55, "bare_small_int");
    }

    if out.is_empty() {
        push(&mut out, SemanticType::Message, value, 0.50, "fallback_message");
    }

    out.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap()
            .then_with(|| category_rank(a.semantic_type).cmp(&category_rank(b.semantic_type)))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_value_falls_back_to_message() {
        let matches = recognize("zzz_totally_unstructured_999", None);
        assert_eq!(matches[0].semantic_type, SemanticType::Message);
        assert_eq!(matches[0].confidence, 0.50);
    }

    #[test]
    fn ipv4_outranks_bare_small_int_for_dotted_quads() {
        let matches = recognize("192.168.1.1", None);
        assert_eq!(matches[0].semantic_type, SemanticType::IpAddress);
    }

    #[test]
    fn apache_style_timestamp_is_recognized() {
        let matches = recognize("Thu Jun 09 06:07:04 2005", None);
        assert_eq!(matches[0].semantic_type, SemanticType::Timestamp);
        assert_eq!(matches[0].pattern_name, "apache_ctime");
    }

    #[test]
    fn severity_keyword_case_insensitive() {
        let matches = recognize("ERROR", None);
        assert_eq!(matches[0].semantic_type, SemanticType::Severity);
        let matches = recognize("notice", None);
        assert_eq!(matches[0].semantic_type, SemanticType::Severity);
    }

    #[test]
    fn bare_integer_recognized_as_weak_process_id() {
        let matches = recognize("4821", None);
        assert_eq!(matches[0].semantic_type, SemanticType::ProcessId);
        assert_eq!(matches[0].pattern_name, "bare_small_int");
    }

    #[test]
    fn keyword_context_sharpens_port_recognition() {
        let ctx = RecognizeContext { preceding_token: Some("port") };
        let matches = recognize("8080", Some(&ctx));
        assert_eq!(matches[0].semantic_type, SemanticType::Port);
    }
}
