use crate::config::Config;
use crate::source::{FetchedFile, FolderEntry, GitHubSource};
use schemars::JsonSchema;
use serde::Serialize;
use std::path::PathBuf;

/// JSON output for `fetch --list`
#[derive(Serialize, JsonSchema)]
pub(crate) struct FetchListJsonOutput {
    repository: String,
    branch: String,
    path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    branches: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    entries: Vec<FolderEntry>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &Config,
    owner: String,
    repo: String,
    branch: String,
    path: String,
    list: bool,
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let source = GitHubSource::new(&config.source, owner.clone(), repo.clone())?;
    let repository = format!("{}/{}", owner, repo);

    if list {
        let mut out = FetchListJsonOutput {
            repository,
            branch: branch.clone(),
            path: path.clone(),
            branches: Vec::new(),
            entries: Vec::new(),
        };
        if path.is_empty() {
            out.branches = source.list_branches()?;
        }
        out.entries = source.list_folder(&branch, &path)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            if !out.branches.is_empty() {
                println!("Branches: {}", out.branches.join(", "));
                println!();
            }
            for entry in &out.entries {
                let marker = if entry.kind == crate::source::EntryKind::Dir { "/" } else { "" };
                println!("{:>12}  {}{}", entry.size, entry.path, marker);
            }
        }
        return Ok(());
    }

    if path.is_empty() {
        anyhow::bail!("--path is required unless --list is given");
    }

    match source.fetch_file(&branch, &path)? {
        FetchedFile::Found(file) => {
            if file.lfs {
                eprintln!("Resolved Git LFS object for {}", file.path);
            }
            super::write_output(output, &file.content)
        }
        FetchedFile::NotFound => {
            anyhow::bail!("{} not found on branch {} of {}", path, branch, repository)
        }
    }
}
