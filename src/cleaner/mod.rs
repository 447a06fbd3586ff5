//! pg_dump metadata stripping.
//!
//! Raw `pg_dump`/`psql` output carries lines that are not executable SQL:
//! comments, session `SET`s, `\connect` meta-commands, ownership banners and
//! `(N rows)` footers left over from copy-pasted psql sessions. These are
//! removed before statement splitting.

use once_cell::sync::Lazy;
use regex::Regex;

/// Metadata keywords, matched at column 0 as whole words.
static METADATA_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\\|(?:SET|SELECT|COPY|Type|Schema|Owner|Name|Table|Source|Target)\b)")
        .unwrap()
});

/// `----`, `====`, and psql table rules like `-----+------`
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-=+]+$").unwrap());

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

static ROW_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\(\d+ rows?\)$").unwrap());

/// Remove non-executable dump lines, keeping everything else verbatim.
pub fn clean_dump(sql: &str) -> String {
    sql.lines()
        .filter(|line| !is_metadata_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether a single line would be dropped by [`clean_dump`].
pub fn is_metadata_line(line: &str) -> bool {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with("--") {
        return true;
    }

    // Keyword banners only count at column 0; indented column definitions
    // such as `    name text` stay.
    if METADATA_LINE_RE.is_match(line) {
        return true;
    }

    SEPARATOR_RE.is_match(trimmed) || NUMERIC_RE.is_match(trimmed) || ROW_COUNT_RE.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_comments_blank_and_row_banners() {
        let input = "-- comment\n\n(42 rows)\nINSERT INTO x VALUES (1);";
        assert_eq!(clean_dump(input), "INSERT INTO x VALUES (1);");
    }

    #[test]
    fn test_removes_session_settings() {
        let input = "SET statement_timeout = 0;\nset client_encoding = 'UTF8';\nSELECT pg_catalog.set_config('search_path', '', false);\nCREATE TABLE a (id int);";
        assert_eq!(clean_dump(input), "CREATE TABLE a (id int);");
    }

    #[test]
    fn test_removes_psql_meta_and_banners() {
        let input = "\\connect crm\nSchema | Name | Type | Owner\n--------+------+------\n   3\nCREATE TABLE b (id int);";
        assert_eq!(clean_dump(input), "CREATE TABLE b (id int);");
    }

    #[test]
    fn test_keeps_indented_column_definitions() {
        let input = "CREATE TABLE c (\n    name text,\n    type varchar(10)\n);";
        assert_eq!(clean_dump(input), input);
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        assert!(!is_metadata_line("Settings_table_insert"));
        assert!(is_metadata_line("SET search_path = public;"));
        assert!(is_metadata_line("(1 row)"));
        assert!(is_metadata_line("====="));
    }
}
