use super::MigrateAction;
use crate::config::Config;
use crate::proxy::{MigrationClient, ProxyResponse};

pub fn run(config: &Config, action: MigrateAction) -> anyhow::Result<()> {
    let client = MigrationClient::from_config(&config.migration)?;

    let (label, json, result) = match action {
        MigrateAction::Test { connection, json } => ("Connection test", json, client.test_connection(&connection)),
        MigrateAction::Run { connection, json } => ("Migration", json, client.migrate(&connection)),
        MigrateAction::Sync {
            connection,
            since,
            json,
        } => ("Sync", json, client.sync(&connection, since.as_deref())),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) if json => {
            let failed = ProxyResponse {
                success: false,
                error: Some(e.to_string()),
                payload: Default::default(),
            };
            println!("{}", serde_json::to_string_pretty(&failed)?);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!(e).context(format!("{} failed", label))),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        eprintln!("{} succeeded", label);
        for (key, value) in &response.payload {
            eprintln!("  {}: {}", key, value);
        }
    }
    Ok(())
}
