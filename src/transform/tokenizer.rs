//! Minimal PostgreSQL tokenizer.
//!
//! Only distinguishes what the identifier rewriter needs: words, quoted
//! identifiers, literals whose contents must never be touched, trivia and
//! punctuation. Concatenating every token's text reproduces the input.

use crate::parser::dollar_tag_at;
use memchr::{memchr, memmem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare keyword or identifier
    Word,
    /// `"Quoted"` identifier
    QuotedIdent,
    /// `'...'` string literal
    StringLit,
    /// `$tag$...$tag$` block
    DollarQuoted,
    Number,
    LineComment,
    BlockComment,
    Whitespace,
    /// `::` cast operator
    DoubleColon,
    Punct,
}

impl TokenKind {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    /// Case-insensitive keyword match; only words can match.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_name(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }
}

pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        let (kind, end) = if b.is_ascii_whitespace() {
            let mut j = i + 1;
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            (TokenKind::Whitespace, j)
        } else if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            (TokenKind::LineComment, memchr(b'\n', &bytes[i..]).map_or(len, |p| i + p))
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let end = memmem::find(&bytes[i + 2..], b"*/").map_or(len, |p| i + 2 + p + 2);
            (TokenKind::BlockComment, end)
        } else if b == b'\'' {
            (TokenKind::StringLit, quoted_end(bytes, i, b'\''))
        } else if b == b'"' {
            (TokenKind::QuotedIdent, quoted_end(bytes, i, b'"'))
        } else if b == b'$' {
            match dollar_tag_at(bytes, i) {
                Some(tag_len) => {
                    let tag = &sql[i..i + tag_len];
                    let body_start = i + tag_len;
                    let end = sql[body_start..]
                        .find(tag)
                        .map_or(len, |p| body_start + p + tag_len);
                    (TokenKind::DollarQuoted, end)
                }
                None => (TokenKind::Punct, i + 1),
            }
        } else if b == b':' && bytes.get(i + 1) == Some(&b':') {
            (TokenKind::DoubleColon, i + 2)
        } else if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 {
            let mut j = i + 1;
            while j < len && (bytes[j].is_ascii_alphanumeric() || matches!(bytes[j], b'_' | b'$') || bytes[j] >= 0x80) {
                j += 1;
            }
            (TokenKind::Word, j)
        } else if b.is_ascii_digit() {
            let mut j = i + 1;
            while j < len && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'.') {
                j += 1;
            }
            (TokenKind::Number, j)
        } else {
            (TokenKind::Punct, i + 1)
        };

        tokens.push(Token {
            kind,
            text: &sql[i..end],
        });
        i = end;
    }

    tokens
}

/// End offset (exclusive) of a quoted run opened at `start`; doubled quotes
/// are literals.
fn quoted_end(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while let Some(p) = memchr(quote, &bytes[i..]) {
        i += p;
        if bytes.get(i + 1) == Some(&quote) {
            i += 2;
        } else {
            return i + 1;
        }
    }
    bytes.len()
}
