use super::PrefsAction;
use crate::prefs::{ColumnVisibility, JsonFilePreferences, PreferencesStore};
use std::path::PathBuf;

fn open_store(file: Option<PathBuf>) -> anyhow::Result<JsonFilePreferences> {
    match file {
        Some(path) => Ok(JsonFilePreferences::new(path)),
        None => JsonFilePreferences::open_default(),
    }
}

fn split_list(list: Option<String>) -> Vec<String> {
    list.map(|s| {
        s.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

pub fn run(action: PrefsAction) -> anyhow::Result<()> {
    match action {
        PrefsAction::Get { key, file } => {
            let store = open_store(file)?;
            match store.load(&key)? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => {
                    eprintln!("{} is not set ({})", key, store.path().display());
                    std::process::exit(1);
                }
            }
        }
        PrefsAction::Set { key, value, file } => {
            let mut store = open_store(file)?;
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            store.save(&key, value)?;
            eprintln!("Saved {} to {}", key, store.path().display());
        }
        PrefsAction::Columns {
            table,
            hide,
            show,
            file,
        } => {
            let mut store = open_store(file)?;
            let mut columns = ColumnVisibility::load(&store, &table)?;
            let hide = split_list(hide);
            let show = split_list(show);

            if !hide.is_empty() || !show.is_empty() {
                for column in hide {
                    columns.set(column, false);
                }
                for column in show {
                    columns.set(column, true);
                }
                columns.save(&mut store, &table)?;
            }

            let hidden: Vec<&str> = columns.hidden().collect();
            if hidden.is_empty() {
                println!("{}: all columns visible", table);
            } else {
                println!("{}: hidden {}", table, hidden.join(", "));
            }
        }
    }
    Ok(())
}
