//! Configuration command handlers

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::Result;
use crate::logging::redaction;
use crate::output::OutputWriter;
use courier_core::ClientConfig;
use serde::Serialize;

/// What `config show` prints
#[derive(Debug, Serialize)]
struct ConfigReport {
    /// Layered settings (file, env, flags) with tokens masked
    settings: Config,
    /// The client configuration those settings resolve to
    resolved: ClientConfig,
}

/// Handle the config command
pub async fn handle_config(args: ConfigArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        ConfigAction::Show => handle_config_show(config, output),
    }
}

fn handle_config_show(config: &Config, output: &mut OutputWriter) -> Result<()> {
    let report = ConfigReport {
        settings: config.redacted(),
        resolved: config.client_config()?,
    };

    // default headers may carry secrets too
    let mut value = serde_json::to_value(&report)?;
    redaction::redact_json_value(&mut value);

    output.section("Effective Configuration")?;
    output.data(&value)
}
