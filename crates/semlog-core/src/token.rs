//! Line tokenizer.
//!
//! Segments a single log line into an ordered sequence of [`Token`]s without
//! any semantic interpretation. Semantic labeling happens one layer up, in
//! [`crate::semantic`].

use std::ops::Range;

/// The lexical class assigned to a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Bracket,
    Quoted,
    Pipe,
    Whitespace,
    Word,
    Number,
    Punctuation,
}

/// A single lexical unit with its source span.
///
/// Bracket and quote delimiters are retained in `value`; callers that want
/// the bare field content use [`get_fields`], which strips them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub kind: TokenKind,
}

impl Token {
    fn new(value: impl Into<String>, span: Range<usize>, kind: TokenKind) -> Self {
        Self {
            value: value.into(),
            start: span.start,
            end: span.end,
            kind,
        }
    }
}

/// Strips a UTF-8 BOM and normalizes CRLF/CR line endings to bare text,
/// trimming a single trailing newline. The core contract (spec. §4.1) only
/// states the newline is stripped; this supplements it for inputs that
/// still carry a BOM or Windows line endings, following
/// `examples/original_source/logsim/preprocessor.py`.
pub fn normalize_line(line: &str) -> &str {
    let line = line.strip_prefix('\u{feff}').unwrap_or(line);
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

const PUNCTUATION_CHARS: &str = ",:;-";

/// Tokenizes a single log line. `line` must already be newline-stripped
/// (see [`normalize_line`]). Returns an empty vector for empty input.
pub fn tokenize(line: &str) -> Vec<Token> {
    if line.is_empty() {
        return Vec::new();
    }
    if is_pipe_delimited_shape(line) {
        return tokenize_pipe_delimited(line);
    }
    tokenize_mixed(line)
}

/// A line is "pipe-delimited shape" when it carries at least two `|`
/// separators. Pipe shape takes priority over bracket/quote segmentation.
fn is_pipe_delimited_shape(line: &str) -> bool {
    line.bytes().filter(|&b| b == b'|').count() >= 2
}

fn tokenize_pipe_delimited(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut rest = line;
    loop {
        match rest.find('|') {
            Some(idx) => {
                let segment = &rest[..idx];
                tokens.push(Token::new(segment, pos..pos + idx, TokenKind::Word));
                tokens.push(Token::new("|", pos + idx..pos + idx + 1, TokenKind::Pipe));
                pos += idx + 1;
                rest = &rest[idx + 1..];
            }
            None => {
                tokens.push(Token::new(rest, pos..pos + rest.len(), TokenKind::Word));
                break;
            }
        }
    }
    tokens
}

fn tokenize_mixed(line: &str) -> Vec<Token> {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < len {
        let c = bytes[i];
        if c == b'[' {
            if let Some(close) = find_byte(bytes, i + 1, b']') {
                tokens.push(Token::new(&line[i..=close], i..close + 1, TokenKind::Bracket));
                i = close + 1;
                continue;
            }
        }
        if c == b'"' || c == b'\'' {
            if let Some(close) = find_byte(bytes, i + 1, c) {
                tokens.push(Token::new(&line[i..=close], i..close + 1, TokenKind::Quoted));
                i = close + 1;
                continue;
            }
        }

        // Run of plain text up to the next special-span opener.
        let run_start = i;
        while i < len {
            let c = bytes[i];
            if c == b'[' && find_byte(bytes, i + 1, b']').is_some() {
                break;
            }
            if (c == b'"' || c == b'\'') && find_byte(bytes, i + 1, c).is_some() {
                break;
            }
            i += 1;
        }
        tokenize_plain_run(&line[run_start..i], run_start, &mut tokens);
    }

    tokens
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == needle).map(|p| p + from)
}

/// Splits a run of plain (non-bracket, non-quote) text on whitespace,
/// classifying each whitespace-delimited piece.
fn tokenize_plain_run(run: &str, base: usize, tokens: &mut Vec<Token>) {
    let mut i = 0usize;
    let bytes = run.as_bytes();
    let len = bytes.len();
    while i < len {
        if (bytes[i] as char).is_whitespace() {
            let start = i;
            while i < len && (bytes[i] as char).is_whitespace() {
                i += 1;
            }
            tokens.push(Token::new(&run[start..i], base + start..base + i, TokenKind::Whitespace));
            continue;
        }
        let start = i;
        while i < len && !(bytes[i] as char).is_whitespace() {
            i += 1;
        }
        let piece = &run[start..i];
        let kind = classify_piece(piece);
        tokens.push(Token::new(piece, base + start..base + i, kind));
    }
}

fn classify_piece(piece: &str) -> TokenKind {
    if is_numeric_literal(piece) {
        return TokenKind::Number;
    }
    if piece.len() == 1 && PUNCTUATION_CHARS.contains(piece) {
        return TokenKind::Punctuation;
    }
    TokenKind::Word
}

/// A piece fully matches an integer or decimal literal: optional leading
/// `-`, digits, and at most one `.` followed by more digits. Anything with
/// embedded punctuation elsewhere (e.g. `1.2.3`) is a word, not a number.
fn is_numeric_literal(piece: &str) -> bool {
    let piece = piece.strip_prefix('-').unwrap_or(piece);
    if piece.is_empty() {
        return false;
    }
    let mut parts = piece.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// Yields the ordered non-whitespace, non-punctuation token values, with
/// bracket/quote delimiters stripped. This is the substrate consumed by
/// template alignment and semantic recognition. Pipe separators are
/// structural delimiters, like punctuation, and are excluded too.
pub fn get_fields(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Punctuation | TokenKind::Pipe))
        .map(|t| strip_delimiters(t))
        .collect()
}

/// The separator a reconstructed line should use when joining this group's
/// pattern elements back together: `|` for pipe-delimited shapes, a single
/// space otherwise.
pub fn join_separator(tokens: &[Token]) -> char {
    if tokens.iter().any(|t| t.kind == TokenKind::Pipe) {
        '|'
    } else {
        ' '
    }
}

fn strip_delimiters(token: &Token) -> String {
    match token.kind {
        TokenKind::Bracket => token.value[1..token.value.len().saturating_sub(1)].to_string(),
        TokenKind::Quoted => token.value[1..token.value.len().saturating_sub(1)].to_string(),
        _ => token.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn bracketed_and_quoted_spans_retain_delimiters() {
        let tokens = tokenize(r#"[2024-01-01] "hello world" done"#);
        assert_eq!(tokens[0].kind, TokenKind::Bracket);
        assert_eq!(tokens[0].value, "[2024-01-01]");
        let quoted = tokens.iter().find(|t| t.kind == TokenKind::Quoted).unwrap();
        assert_eq!(quoted.value, "\"hello world\"");
    }

    #[test]
    fn unclosed_bracket_is_literal_text() {
        let tokens = tokenize("[unterminated and more");
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Bracket));
    }

    #[test]
    fn dotted_number_is_a_word() {
        let tokens = tokenize("version 1.2.3 released");
        let v = tokens.iter().find(|t| t.value == "1.2.3").unwrap();
        assert_eq!(v.kind, TokenKind::Word);
    }

    #[test]
    fn plain_integer_and_decimal_are_numbers() {
        let tokens = tokenize("retries 3 backoff 1.5");
        assert_eq!(tokens.iter().find(|t| t.value == "3").unwrap().kind, TokenKind::Number);
        assert_eq!(tokens.iter().find(|t| t.value == "1.5").unwrap().kind, TokenKind::Number);
    }

    #[test]
    fn pipe_shape_splits_on_pipes() {
        let tokens = tokenize("2024-01-01|componentA|1234|something happened");
        let words: Vec<_> = tokens.iter().filter(|t| t.kind == TokenKind::Word).collect();
        assert_eq!(words.len(), 4);
        assert_eq!(words[3].value, "something happened");
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Pipe).count(), 3);
    }

    #[test]
    fn get_fields_strips_delimiters_and_skips_whitespace_punctuation() {
        let tokens = tokenize("[notice] user: 'alice' logged in");
        let fields = get_fields(&tokens);
        assert_eq!(fields, vec!["notice", "user", "alice", "logged", "in"]);
    }
}
