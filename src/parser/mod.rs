//! SQL statement splitting and classification.
//!
//! The splitter is a byte-scan state machine. Only ASCII delimiters are
//! inspected, so slicing at their offsets is always valid UTF-8.

#[cfg(test)]
mod edge_case_tests;

use memchr::{memchr, memmem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kind of quoted or commented region the scanner can be inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteKind {
    SingleQuote,
    DoubleQuote,
    DollarQuote,
    BlockComment,
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteKind::SingleQuote => write!(f, "string literal"),
            QuoteKind::DoubleQuote => write!(f, "quoted identifier"),
            QuoteKind::DollarQuote => write!(f, "dollar-quoted block"),
            QuoteKind::BlockComment => write!(f, "block comment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("unterminated {kind} starting on line {line}")]
    Unterminated { kind: QuoteKind, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable,
    CreateType,
    CreateFunction,
    CreateIndex,
    CreateSequence,
    CreateTrigger,
    CreateView,
    AlterTable,
    Insert,
    Update,
    Delete,
    Drop,
    Copy,
    Other,
}

impl StatementKind {
    /// DDL that has to run before any data statement.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            StatementKind::CreateTable
                | StatementKind::CreateType
                | StatementKind::CreateFunction
                | StatementKind::CreateIndex
                | StatementKind::CreateSequence
                | StatementKind::CreateTrigger
                | StatementKind::CreateView
                | StatementKind::AlterTable
                | StatementKind::Drop
        )
    }

    pub fn is_data(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete | StatementKind::Copy
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::CreateTable => "CREATE TABLE",
            StatementKind::CreateType => "CREATE TYPE",
            StatementKind::CreateFunction => "CREATE FUNCTION",
            StatementKind::CreateIndex => "CREATE INDEX",
            StatementKind::CreateSequence => "CREATE SEQUENCE",
            StatementKind::CreateTrigger => "CREATE TRIGGER",
            StatementKind::CreateView => "CREATE VIEW",
            StatementKind::AlterTable => "ALTER TABLE",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Drop => "DROP",
            StatementKind::Copy => "COPY",
            StatementKind::Other => "OTHER",
        };
        write!(f, "{}", s)
    }
}

static CREATE_KIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^CREATE\s+(?:OR\s+REPLACE\s+)?(?:UNIQUE\s+)?(?:(?:TEMP|TEMPORARY|UNLOGGED|MATERIALIZED)\s+)?(TABLE|TYPE|FUNCTION|INDEX|SEQUENCE|TRIGGER|VIEW)\b",
    )
    .unwrap()
});

static ALTER_TABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^ALTER\s+TABLE\b").unwrap());

static OWNER_TO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bOWNER\s+TO\b").unwrap());

/// Leading keywords accepted by [`split_executable_statements`].
const EXECUTABLE_KEYWORDS: &[&str] = &["CREATE", "INSERT", "UPDATE", "DELETE", "ALTER", "DROP", "COPY"];

/// Split SQL into statements, failing on input that ends inside a quote,
/// dollar-quoted block or block comment.
pub fn split_statements(sql: &str) -> Result<Vec<String>, SplitError> {
    let scan = scan(sql);
    match scan.unterminated {
        Some((kind, offset)) => Err(SplitError::Unterminated {
            kind,
            line: line_of(sql, offset),
        }),
        None => Ok(scan.statements),
    }
}

/// Best-effort split: an unterminated region is implicitly closed at end of input.
pub fn split_statements_lenient(sql: &str) -> Vec<String> {
    scan(sql).statements
}

/// Stricter variant for the isolated-schema import path: only statements
/// starting with a data/DDL keyword survive, ownership changes are dropped.
pub fn split_executable_statements(sql: &str) -> Result<Vec<String>, SplitError> {
    Ok(split_statements(sql)?
        .into_iter()
        .filter(|stmt| is_executable(stmt))
        .collect())
}

/// Whether a statement passes the strict splitter's filter.
pub fn is_executable(stmt: &str) -> bool {
    let body = skip_leading_comments(stmt);
    let Some(keyword) = first_word(body) else {
        return false;
    };
    let keyword = keyword.to_ascii_uppercase();
    if !EXECUTABLE_KEYWORDS.contains(&keyword.as_str()) {
        return false;
    }
    !(keyword == "ALTER" && OWNER_TO_RE.is_match(body))
}

/// Classify a statement by its leading keywords.
pub fn classify(stmt: &str) -> StatementKind {
    let body = skip_leading_comments(stmt);

    if let Some(caps) = CREATE_KIND_RE.captures(body) {
        return match caps[1].to_ascii_uppercase().as_str() {
            "TABLE" => StatementKind::CreateTable,
            "TYPE" => StatementKind::CreateType,
            "FUNCTION" => StatementKind::CreateFunction,
            "INDEX" => StatementKind::CreateIndex,
            "SEQUENCE" => StatementKind::CreateSequence,
            "TRIGGER" => StatementKind::CreateTrigger,
            _ => StatementKind::CreateView,
        };
    }

    if ALTER_TABLE_RE.is_match(body) {
        return StatementKind::AlterTable;
    }

    match first_word(body).map(|w| w.to_ascii_uppercase()).as_deref() {
        Some("INSERT") => StatementKind::Insert,
        Some("UPDATE") => StatementKind::Update,
        Some("DELETE") => StatementKind::Delete,
        Some("DROP") => StatementKind::Drop,
        Some("COPY") => StatementKind::Copy,
        _ => StatementKind::Other,
    }
}

#[derive(Debug)]
struct Scan {
    statements: Vec<String>,
    /// Region kind and byte offset where it was opened
    unterminated: Option<(QuoteKind, usize)>,
}

#[derive(Debug, Clone, Copy)]
enum State<'a> {
    Normal,
    SingleQuote,
    DoubleQuote,
    DollarQuote(&'a str),
    BlockComment,
}

fn scan(sql: &str) -> Scan {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut statements = Vec::new();
    let mut state = State::Normal;
    let mut start = 0;
    let mut open_at = 0;
    // End of the last code byte; trailing comments are not part of a statement
    let mut code_end = 0;
    let mut i = 0;

    while i < len {
        match state {
            State::Normal => match bytes[i] {
                b'\'' => {
                    state = State::SingleQuote;
                    open_at = i;
                    i += 1;
                }
                b'"' => {
                    state = State::DoubleQuote;
                    open_at = i;
                    i += 1;
                }
                b'$' => match dollar_tag_at(bytes, i) {
                    Some(tag_len) => {
                        state = State::DollarQuote(&sql[i..i + tag_len]);
                        open_at = i;
                        i += tag_len;
                    }
                    None => {
                        i += 1;
                        code_end = i;
                    }
                },
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    i = memchr(b'\n', &bytes[i..]).map_or(len, |p| i + p);
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    open_at = i;
                    i += 2;
                }
                b';' => {
                    push_statement(&mut statements, &sql[start..code_end.max(start)]);
                    i += 1;
                    start = i;
                }
                b if b.is_ascii_whitespace() => i += 1,
                _ => {
                    i += 1;
                    code_end = i;
                }
            },
            State::SingleQuote | State::DoubleQuote => {
                let quote = if matches!(state, State::SingleQuote) {
                    b'\''
                } else {
                    b'"'
                };
                match memchr(quote, &bytes[i..]) {
                    Some(p) => {
                        i += p;
                        // Doubled quote is a literal, not a terminator
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                        } else {
                            state = State::Normal;
                            i += 1;
                            code_end = i;
                        }
                    }
                    None => i = len,
                }
            }
            State::DollarQuote(tag) => match memchr(b'$', &bytes[i..]) {
                Some(p) => {
                    i += p;
                    if sql[i..].starts_with(tag) {
                        state = State::Normal;
                        i += tag.len();
                        code_end = i;
                    } else {
                        i += 1;
                    }
                }
                None => i = len,
            },
            State::BlockComment => match memmem::find(&bytes[i..], b"*/") {
                Some(p) => {
                    state = State::Normal;
                    i += p + 2;
                }
                None => i = len,
            },
        }
    }

    // An unterminated region runs to end of input
    if !matches!(state, State::Normal) {
        code_end = len;
    }
    if start < code_end {
        push_statement(&mut statements, &sql[start..code_end]);
    }

    let unterminated = match state {
        State::Normal => None,
        State::SingleQuote => Some((QuoteKind::SingleQuote, open_at)),
        State::DoubleQuote => Some((QuoteKind::DoubleQuote, open_at)),
        State::DollarQuote(_) => Some((QuoteKind::DollarQuote, open_at)),
        State::BlockComment => Some((QuoteKind::BlockComment, open_at)),
    };

    Scan {
        statements,
        unterminated,
    }
}

/// Length of a `$tag$` opener at `i`, if there is one.
pub(crate) fn dollar_tag_at(bytes: &[u8], i: usize) -> Option<usize> {
    // `$` inside an identifier (e.g. `a$b`) never opens a quote
    if i > 0 && is_ident_byte(bytes[i - 1]) {
        return None;
    }

    let mut j = i + 1;
    if let Some(&b) = bytes.get(j) {
        if b.is_ascii_alphabetic() || b == b'_' {
            j += 1;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                j += 1;
            }
        }
    }

    (bytes.get(j) == Some(&b'$')).then_some(j + 1 - i)
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let stmt = raw.trim();
    if stmt.is_empty() || skip_leading_comments(stmt).is_empty() {
        return;
    }
    statements.push(stmt.to_string());
}

/// Strip leading whitespace, `--` and `/* */` comments.
pub fn skip_leading_comments(stmt: &str) -> &str {
    let mut rest = stmt.trim_start();
    loop {
        if rest.starts_with("--") {
            rest = match rest.find('\n') {
                Some(p) => rest[p + 1..].trim_start(),
                None => "",
            };
        } else if rest.starts_with("/*") {
            rest = match rest.find("*/") {
                Some(p) => rest[p + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

fn first_word(s: &str) -> Option<&str> {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    (end > 0).then(|| &s[..end])
}

fn line_of(sql: &str, offset: usize) -> usize {
    memchr::memchr_iter(b'\n', &sql.as_bytes()[..offset]).count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        let stmts = split_statements("CREATE TABLE t1 (id INT); INSERT INTO t1 VALUES (1);").unwrap();
        assert_eq!(stmts, vec!["CREATE TABLE t1 (id INT)", "INSERT INTO t1 VALUES (1)"]);
    }

    #[test]
    fn test_semicolon_in_string() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b');").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_dollar_quoted_body() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN x:=1; END; $$ LANGUAGE plpgsql;";
        let stmts = split_statements(sql).unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("create unique index i on t (a)"), StatementKind::CreateIndex);
        assert_eq!(classify("CREATE OR REPLACE FUNCTION f()"), StatementKind::CreateFunction);
        assert_eq!(classify("-- note\nINSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(classify("ALTER TABLE ONLY t ADD x int"), StatementKind::AlterTable);
        assert_eq!(classify("GRANT ALL ON t TO x"), StatementKind::Other);
    }

    #[test]
    fn test_trailing_line_comment_is_trimmed() {
        let stmts = split_statements("SELECT 1 -- note\n; SELECT 2 /* done */;").unwrap();
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_dollar_tag_detection() {
        assert_eq!(dollar_tag_at(b"$$", 0), Some(2));
        assert_eq!(dollar_tag_at(b"$body$ x", 0), Some(6));
        assert_eq!(dollar_tag_at(b"$1, $2", 0), None);
        assert_eq!(dollar_tag_at(b"a$b$", 1), None);
    }
}
