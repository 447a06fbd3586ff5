use crate::config::Config;
use crate::input::read_sql_file;
use crate::pipeline::{prepare_statements, PipelineOptions};
use crate::transform::TransformMode;
use std::path::PathBuf;

pub fn run(
    config: &Config,
    file: PathBuf,
    suffix: Option<String>,
    mode: Option<TransformMode>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut options = PipelineOptions::from(&config.import);
    if let Some(suffix) = suffix {
        options.suffix = suffix;
    }
    if let Some(mode) = mode {
        options.transform = mode;
    }

    let content = read_sql_file(&file, None)?;
    let prepared = prepare_statements(&content, &options)?;

    let mut text = String::new();
    for stmt in &prepared.statements {
        text.push_str(stmt);
        text.push_str(";\n\n");
    }

    eprintln!(
        "{} statements, {} identifiers renamed with suffix {} ({} mode)",
        prepared.statements.len(),
        prepared.renamed.len(),
        options.suffix,
        options.transform
    );
    if !prepared.renamed.is_empty() {
        eprintln!("  {}", prepared.renamed.join(", "));
    }

    super::write_output(output, &text)
}
