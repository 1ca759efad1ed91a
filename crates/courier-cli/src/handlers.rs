//! Command handlers for CLI subcommands
//!
//! This module contains the implementation logic for each CLI subcommand.

mod call;
mod config;
mod endpoints;
mod health;

pub use call::handle_call;
pub use config::handle_config;
pub use endpoints::handle_endpoints;
pub use health::handle_health;

use crate::config::Config;
use crate::error::Result;
use crate::output::OutputWriter;
use courier_core::{ApiClient, CancellationToken, InMemoryCredentialStore, Payload, ResponseEnvelope};
use std::sync::Arc;

/// Build a client from the layered configuration
fn build_client(config: &Config) -> Result<ApiClient> {
    let store = match config.credential() {
        Some(credential) => InMemoryCredentialStore::with_credential(credential),
        None => InMemoryCredentialStore::new(),
    };

    let client = ApiClient::builder()
        .config(config.client_config()?)
        .credentials(Arc::new(store))
        .build()?;

    tracing::debug!(base_url = %client.base_url(), "Client ready");
    Ok(client)
}

/// Token cancelled when the user presses Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling request");
            trigger.cancel();
        }
    });
    token
}

/// Print a response envelope in the configured format
fn render_envelope(output: &mut OutputWriter, envelope: &ResponseEnvelope) -> Result<()> {
    if !envelope.success {
        output.warning("⚠ Server reported success: false")?;
    }

    if output.format() == crate::cli::OutputFormat::Human {
        match &envelope.data {
            Some(Payload::Text(text)) => {
                output.section("Response")?;
                return output.writeln(text);
            }
            Some(Payload::Binary(bytes)) => {
                output.info(&format!("Binary payload ({} bytes) not shown", bytes.len()))?;
                return Ok(());
            }
            _ => output.section("Response")?,
        }
    }

    output.data(envelope)
}
