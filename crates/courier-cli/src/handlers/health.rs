//! The `health` command

use super::{build_client, render_envelope};
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputWriter;

/// Probe the health endpoint; credentials are never sent
pub async fn handle_health(config: &Config, output: &mut OutputWriter) -> Result<()> {
    let client = build_client(config)?;
    output.info(&format!("Probing {}", client.base_url()))?;

    let spinner = output.spinner("Checking API health...");
    let result = client.health().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let envelope = result?;
    output.success("✓ API is reachable")?;
    render_envelope(output, &envelope)
}
