//! JSON Schema generation for CLI output types.
//!
//! Every command that supports `--json` has an entry here; the `schema`
//! subcommand prints them.

use schemars::{schema_for, Schema};
use std::collections::BTreeMap;

/// Returns all JSON schemas for commands that support --json output.
/// Uses BTreeMap for deterministic ordering (important for diffable output).
pub fn all_schemas() -> BTreeMap<&'static str, Schema> {
    let mut schemas = BTreeMap::new();

    schemas.insert("fetch", schema_for!(crate::cmd::fetch::FetchListJsonOutput));
    schemas.insert("import", schema_for!(crate::pipeline::ImportOutcome));
    schemas.insert("migrate", schema_for!(crate::proxy::ProxyResponse));
    schemas.insert("rates-booking", schema_for!(crate::rates::BookingRate));
    schemas.insert("rates-preview", schema_for!(crate::rates::RatePreview));
    schemas.insert("split", schema_for!(crate::cmd::split::SplitJsonOutput));
    schemas.insert("test-parse", schema_for!(crate::cmd::import::TestParseJsonOutput));
    schemas.insert("validate", schema_for!(crate::cmd::validate::ValidateJsonOutput));

    schemas
}

/// Generate a single schema by command name.
pub fn get_schema(command: &str) -> Option<Schema> {
    all_schemas().remove(command)
}

/// List all available schema names.
pub fn schema_names() -> Vec<&'static str> {
    all_schemas().keys().copied().collect()
}
