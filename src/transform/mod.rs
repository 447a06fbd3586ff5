//! Identifier suffixing for legacy schema imports.
//!
//! Every object a dump creates or references gets a fixed suffix so the
//! imported legacy schema can live next to the current one. Rewriting runs
//! on a token stream: string literals, dollar-quoted bodies and comments are
//! never touched.

pub mod tokenizer;

use ahash::AHashSet;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokenizer::{tokenize, Token, TokenKind};
use tracing::debug;

pub const DEFAULT_SUFFIX: &str = "_PCRM";

/// Built-in PostgreSQL types that casts must never rename.
static BUILTIN_TYPES: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "int", "int2", "int4", "int8", "integer", "smallint", "bigint", "serial", "serial4",
        "serial8", "bigserial", "smallserial", "numeric", "decimal", "real", "double", "float",
        "float4", "float8", "money", "text", "varchar", "char", "character", "bpchar", "name",
        "citext", "bool", "boolean", "date", "time", "timetz", "timestamp", "timestamptz",
        "interval", "uuid", "json", "jsonb", "xml", "bytea", "bit", "varbit", "inet", "cidr",
        "macaddr", "oid", "regclass", "regtype", "regproc", "regprocedure", "regnamespace",
        "regrole", "tsvector", "tsquery", "point", "line", "lseg", "box", "path", "polygon",
        "circle", "int4range", "int8range", "numrange", "tsrange", "tstzrange", "daterange",
        "record", "void", "trigger", "anyelement", "unknown", "macaddr8", "regconfig",
        "regdictionary", "regoper", "regoperator", "regcollation", "anyarray", "anynonarray",
        "anyenum", "anyrange", "anymultirange", "anycompatible", "anycompatiblearray",
        "anycompatiblenonarray", "anycompatiblerange", "anycompatiblemultirange", "cstring",
        "internal", "event_trigger", "language_handler", "fdw_handler", "index_am_handler",
        "table_am_handler", "tsm_handler", "jsonpath", "pg_lsn", "pg_snapshot", "txid_snapshot",
        "tid", "xid", "xid8", "cid", "oidvector", "int2vector", "aclitem", "refcursor",
        "pg_node_tree", "int4multirange", "int8multirange", "nummultirange", "tsmultirange",
        "tstzmultirange", "datemultirange", "hstore",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Tables, types, functions, indexes, sequences, triggers, views, casts
    #[default]
    Full,
    /// CREATE TABLE, INSERT INTO, REFERENCES and ALTER TABLE targets only,
    /// unqualified names only
    Simple,
    /// Leave statements untouched
    None,
}

impl std::str::FromStr for TransformMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(TransformMode::Full),
            "simple" => Ok(TransformMode::Simple),
            "none" => Ok(TransformMode::None),
            _ => Err(format!(
                "Unknown transform mode: {}. Valid options: full, simple, none",
                s
            )),
        }
    }
}

impl std::fmt::Display for TransformMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformMode::Full => write!(f, "full"),
            TransformMode::Simple => write!(f, "simple"),
            TransformMode::None => write!(f, "none"),
        }
    }
}

/// Identifiers renamed during a transform, in first-seen order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformReport {
    pub renamed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IdentifierTransformer {
    suffix: String,
    mode: TransformMode,
    /// Replaces the schema qualifier of every rewritten name
    target_schema: Option<String>,
}

impl Default for IdentifierTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX)
    }
}

impl IdentifierTransformer {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            mode: TransformMode::Full,
            target_schema: None,
        }
    }

    /// Move qualified names into `schema` (`public.jobs` -> `"legacy".jobs_PCRM`).
    /// System schemas are left alone.
    pub fn with_target_schema(mut self, schema: Option<String>) -> Self {
        self.target_schema = schema.map(|s| quote_ident(&s));
        self
    }

    pub fn with_mode(mut self, mode: TransformMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn transform(&self, sql: &str) -> String {
        self.transform_with_report(sql).0
    }

    pub fn transform_with_report(&self, sql: &str) -> (String, TransformReport) {
        if self.mode == TransformMode::None || (self.suffix.is_empty() && self.target_schema.is_none()) {
            return (sql.to_string(), TransformReport::default());
        }

        let tokens = tokenize(sql);
        let mut rewrite = Rewrite {
            transformer: self,
            tokens: &tokens,
            sig: tokens
                .iter()
                .enumerate()
                .filter(|(_, t)| !t.kind.is_trivia())
                .map(|(i, _)| i)
                .collect(),
            replacements: vec![None; tokens.len()],
            report: TransformReport::default(),
            seen: AHashSet::new(),
        };
        rewrite.run();

        let mut out = String::with_capacity(sql.len() + 64);
        for (tok, replacement) in tokens.iter().zip(&rewrite.replacements) {
            out.push_str(replacement.as_deref().unwrap_or(tok.text));
        }

        debug!(renamed = rewrite.report.renamed.len(), mode = %self.mode, "transformed identifiers");
        (out, rewrite.report)
    }

    /// Suffix a bare or quoted identifier unless it already carries the suffix.
    fn suffixed(&self, tok: &Token<'_>) -> Option<(String, String)> {
        match tok.kind {
            TokenKind::Word => {
                let lower = tok.text.to_lowercase();
                if lower.ends_with(&self.suffix.to_lowercase()) {
                    None
                } else {
                    Some((tok.text.to_string(), format!("{}{}", tok.text, self.suffix)))
                }
            }
            TokenKind::QuotedIdent if tok.text.len() >= 2 && tok.text.ends_with('"') => {
                let inner = &tok.text[1..tok.text.len() - 1];
                if inner.ends_with(&self.suffix) {
                    None
                } else {
                    Some((inner.to_string(), format!("\"{}{}\"", inner, self.suffix)))
                }
            }
            _ => None,
        }
    }

    /// Suffix the last segment of a name held in a `'...'::regclass` literal.
    /// Returns the bare name if it was renamed, and the new literal.
    fn suffixed_literal(&self, literal: &str) -> Option<(Option<String>, String)> {
        let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
        if inner.is_empty() || inner.contains('\'') {
            return None;
        }
        let (prefix, last) = match inner.rfind('.') {
            Some(p) => inner.split_at(p + 1),
            None => ("", inner),
        };
        let prefix = match (&self.target_schema, prefix.strip_suffix('.')) {
            (Some(target), Some(schema)) if !is_system_schema(schema.trim_matches('"')) => format!("{}.", target),
            _ => prefix.to_string(),
        };
        let bare = last.trim_matches('"');
        let (original, last) = if bare.to_lowercase().ends_with(&self.suffix.to_lowercase()) {
            (None, last.to_string())
        } else if last.starts_with('"') {
            (Some(bare.to_string()), format!("\"{}{}\"", bare, self.suffix))
        } else {
            (Some(bare.to_string()), format!("{}{}", last, self.suffix))
        };
        let renamed = format!("'{}{}'", prefix, last);
        (renamed != literal).then_some((original, renamed))
    }

}

struct Rewrite<'t, 'a> {
    transformer: &'t IdentifierTransformer,
    tokens: &'t [Token<'a>],
    /// Indexes of non-trivia tokens
    sig: Vec<usize>,
    replacements: Vec<Option<String>>,
    report: TransformReport,
    seen: AHashSet<String>,
}

impl<'t, 'a> Rewrite<'t, 'a> {
    fn tok(&self, k: usize) -> Option<&Token<'a>> {
        self.sig.get(k).map(|&i| &self.tokens[i])
    }

    fn keyword_at(&self, k: usize, keyword: &str) -> bool {
        self.tok(k).is_some_and(|t| t.is_keyword(keyword))
    }

    fn full(&self) -> bool {
        self.transformer.mode == TransformMode::Full
    }

    fn run(&mut self) {
        let mut k = 0;
        while k < self.sig.len() {
            let Some(tok) = self.tok(k).copied() else {
                break;
            };
            k = match tok.kind {
                TokenKind::Word if tok.is_keyword("CREATE") => self.create(k + 1),
                TokenKind::Word if tok.is_keyword("INSERT") && self.keyword_at(k + 1, "INTO") => {
                    self.rename_name(k + 2)
                }
                TokenKind::Word if tok.is_keyword("REFERENCES") => self.rename_name(k + 1),
                TokenKind::Word if tok.is_keyword("ALTER") && self.keyword_at(k + 1, "TABLE") => {
                    let mut j = k + 2;
                    if self.keyword_at(j, "IF") && self.keyword_at(j + 1, "EXISTS") {
                        j += 2;
                    }
                    if self.keyword_at(j, "ONLY") {
                        j += 1;
                    }
                    self.rename_name(j)
                }
                TokenKind::Word if self.full() && tok.is_keyword("ALTER") && self.keyword_at(k + 1, "SEQUENCE") => {
                    self.alter_sequence(k + 2)
                }
                TokenKind::DoubleColon if self.full() => self.cast(k + 1),
                TokenKind::StringLit if self.full() => self.regclass_literal(k),
                _ => k + 1,
            };
        }
    }

    /// Handle everything after `CREATE`; returns the next index to scan.
    fn create(&mut self, mut j: usize) -> usize {
        if self.keyword_at(j, "OR") && self.keyword_at(j + 1, "REPLACE") {
            j += 2;
        }
        while ["UNIQUE", "TEMP", "TEMPORARY", "UNLOGGED", "MATERIALIZED"]
            .iter()
            .any(|m| self.keyword_at(j, m))
        {
            j += 1;
        }

        let Some(kind) = self.tok(j).filter(|t| t.kind == TokenKind::Word) else {
            return j;
        };
        let kind = kind.text.to_ascii_uppercase();
        let handled = match self.transformer.mode {
            TransformMode::Full => matches!(
                kind.as_str(),
                "TABLE" | "TYPE" | "FUNCTION" | "INDEX" | "SEQUENCE" | "TRIGGER" | "VIEW"
            ),
            TransformMode::Simple => kind == "TABLE",
            TransformMode::None => false,
        };
        if !handled {
            return j;
        }

        j += 1;
        if self.keyword_at(j, "CONCURRENTLY") {
            j += 1;
        }
        if self.keyword_at(j, "IF") && self.keyword_at(j + 1, "NOT") && self.keyword_at(j + 2, "EXISTS") {
            j += 3;
        }

        // `CREATE INDEX ON t (...)` has no index name
        let next = if kind == "INDEX" && self.keyword_at(j, "ON") {
            j
        } else {
            self.rename_name(j)
        };

        match kind.as_str() {
            "INDEX" | "TRIGGER" => {
                let mut next = next;
                if let Some(on) = self.find_keyword(next, "ON") {
                    let mut t = on + 1;
                    if self.keyword_at(t, "ONLY") {
                        t += 1;
                    }
                    next = self.rename_name(t);
                }
                if kind == "TRIGGER" {
                    if let Some(exec) = self.find_keyword(next, "EXECUTE") {
                        if self.keyword_at(exec + 1, "FUNCTION") || self.keyword_at(exec + 1, "PROCEDURE") {
                            next = self.rename_name(exec + 2);
                        }
                    }
                }
                next
            }
            _ => next,
        }
    }

    /// Next occurrence of `keyword` before the end of the current statement.
    fn find_keyword(&self, from: usize, keyword: &str) -> Option<usize> {
        (from..self.sig.len())
            .take_while(|&k| self.tok(k).is_some_and(|t| !t.is_punct(";")))
            .find(|&k| self.keyword_at(k, keyword))
    }

    /// Rename a possibly schema-qualified name starting at `k`. The schema
    /// part is kept unless a target schema is set. Returns the index after
    /// the name.
    fn rename_name(&mut self, k: usize) -> usize {
        let Some(last) = self.name_end(k) else {
            return k;
        };
        if last != k {
            self.retarget_schema(last - 2);
            if self.transformer.mode == TransformMode::Simple {
                return last + 1;
            }
        }

        self.replace(last);
        last + 1
    }

    /// Index of the last part of a dotted name starting at `k`.
    fn name_end(&self, k: usize) -> Option<usize> {
        if !self.tok(k).is_some_and(|t| t.is_name()) {
            return None;
        }
        let mut last = k;
        while self.tok(last + 1).is_some_and(|t| t.is_punct("."))
            && self.tok(last + 2).is_some_and(|t| t.is_name())
        {
            last += 2;
        }
        Some(last)
    }

    fn retarget_schema(&mut self, k: usize) {
        let transformer = self.transformer;
        let Some(target) = &transformer.target_schema else {
            return;
        };
        let i = self.sig[k];
        let tok = &self.tokens[i];
        if is_system_schema(tok.text.trim_matches('"')) || tok.text == target.as_str() {
            return;
        }
        self.replacements[i] = Some(target.clone());
    }

    /// `ALTER SEQUENCE [IF EXISTS] name ... [OWNED BY table.column]`
    fn alter_sequence(&mut self, mut j: usize) -> usize {
        if self.keyword_at(j, "IF") && self.keyword_at(j + 1, "EXISTS") {
            j += 2;
        }
        let next = self.rename_name(j);
        let Some(owned) = self.find_keyword(next, "OWNED") else {
            return next;
        };
        if !self.keyword_at(owned + 1, "BY") {
            return owned + 1;
        }

        // The owner is `[schema.]table.column`; the table is the next-to-last part
        let start = owned + 2;
        let last = match self.name_end(start) {
            Some(last) if last > start => last,
            _ => return start,
        };
        let table = last - 2;
        if table > start {
            self.retarget_schema(table - 2);
        }
        self.replace(table);
        last + 1
    }

    fn cast(&mut self, k: usize) -> usize {
        let Some(tok) = self.tok(k) else {
            return k;
        };
        if tok.kind == TokenKind::Word && BUILTIN_TYPES.contains(tok.text.to_lowercase().as_str()) {
            return k + 1;
        }
        // `::pg_catalog.int4` and friends are built-in by definition
        if tok.is_keyword("pg_catalog") {
            return k + 3;
        }
        self.rename_name(k)
    }

    fn regclass_literal(&mut self, k: usize) -> usize {
        let is_regclass = self.tok(k + 1).is_some_and(|t| t.kind == TokenKind::DoubleColon)
            && self.keyword_at(k + 2, "regclass");
        if !is_regclass {
            return k + 1;
        }
        let i = self.sig[k];
        if let Some((original, renamed)) = self.transformer.suffixed_literal(self.tokens[i].text) {
            if let Some(original) = original {
                self.record(original);
            }
            self.replacements[i] = Some(renamed);
        }
        k + 3
    }

    fn replace(&mut self, k: usize) {
        let i = self.sig[k];
        if let Some((original, renamed)) = self.transformer.suffixed(&self.tokens[i]) {
            self.record(original);
            self.replacements[i] = Some(renamed);
        }
    }

    fn record(&mut self, original: String) {
        if self.seen.insert(original.clone()) {
            self.report.renamed.push(original);
        }
    }
}

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_system_schema(schema: &str) -> bool {
    schema.eq_ignore_ascii_case("pg_catalog") || schema.eq_ignore_ascii_case("information_schema")
}
