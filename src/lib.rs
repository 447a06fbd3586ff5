//! Legacy PostgreSQL dump import pipeline and booking rate engine.

pub mod cleaner;
pub mod cmd;
pub mod config;
pub mod executor;
pub mod input;
pub mod json_schema;
pub mod parser;
pub mod pipeline;
pub mod prefs;
pub mod progress;
pub mod proxy;
pub mod rates;
pub mod remote;
pub mod source;
pub mod transform;
pub mod validate;
