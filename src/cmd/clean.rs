use crate::cleaner::clean_dump;
use crate::input::read_sql_file;
use std::path::PathBuf;

pub fn run(file: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let content = read_sql_file(&file, None)?;
    let cleaned = clean_dump(&content);

    let before = content.lines().count();
    let after = cleaned.lines().count();
    eprintln!("Removed {} of {} lines", before.saturating_sub(after), before);

    super::write_output(output, &cleaned)
}
