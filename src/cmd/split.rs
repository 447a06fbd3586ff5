use crate::cleaner::clean_dump;
use crate::input::{read_sql_file, Compression};
use crate::parser::{classify, split_executable_statements, split_statements, split_statements_lenient};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

/// JSON output for the split command
#[derive(Serialize, JsonSchema)]
pub(crate) struct SplitJsonOutput {
    input_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<String>,
    strict: bool,
    total_statements: usize,
    kinds: BTreeMap<String, usize>,
    elapsed_secs: f64,
    statements: Vec<SplitStatement>,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct SplitStatement {
    index: usize,
    kind: String,
    sql: String,
}

pub fn run(file: PathBuf, strict: bool, lenient: bool, json: bool) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let compression = Compression::from_path(&file);
    let content = read_sql_file(&file, None)?;
    let cleaned = clean_dump(&content);

    let statements = if lenient {
        let mut all = split_statements_lenient(&cleaned);
        if strict {
            all.retain(|s| crate::parser::is_executable(s));
        }
        all
    } else if strict {
        split_executable_statements(&cleaned)?
    } else {
        split_statements(&cleaned)?
    };

    let mut kinds = BTreeMap::new();
    let statements: Vec<SplitStatement> = statements
        .into_iter()
        .enumerate()
        .map(|(i, sql)| {
            let kind = classify(&sql).to_string();
            *kinds.entry(kind.clone()).or_insert(0) += 1;
            SplitStatement {
                index: i + 1,
                kind,
                sql,
            }
        })
        .collect();

    if json {
        let output = SplitJsonOutput {
            input_file: file.display().to_string(),
            compression: (compression != Compression::None).then(|| compression.to_string()),
            strict,
            total_statements: statements.len(),
            kinds,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
            statements,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for stmt in &statements {
        println!("-- [{}] {}", stmt.index, stmt.kind);
        println!("{};", stmt.sql);
        println!();
    }

    eprintln!("{} statements in {}", statements.len(), file.display());
    for (kind, count) in &kinds {
        eprintln!("  {:<18} {}", kind, count);
    }
    Ok(())
}
