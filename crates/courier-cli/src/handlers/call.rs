//! The `call` command: one request through the full pipeline

use super::{build_client, cancel_on_ctrl_c, render_envelope};
use crate::cli::CallArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use courier_core::endpoints;
use courier_core::http::Method;
use courier_core::{QueryParams, RequestSpec};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Handle the call command
pub async fn handle_call(args: CallArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let client = build_client(config)?;
    let endpoint = endpoints::lookup(&args.endpoint)?;
    let spec = build_spec(&args, endpoint)?.cancellation(cancel_on_ctrl_c());

    output.info(&format!("{} {}{}", spec.method(), client.base_url(), spec.path()))?;

    let spinner = output.spinner(&format!("Calling {}...", endpoint.name));
    let timer = Timer::new("api_call");
    let result = client.execute(spec).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let envelope = result?;
    output.success(&format!(
        "✓ {} completed in {}ms",
        endpoint.name,
        timer.elapsed().as_millis()
    ))?;

    render_envelope(output, &envelope)
}

/// Turn the command arguments into a request
fn build_spec(args: &CallArgs, endpoint: &endpoints::Endpoint) -> Result<RequestSpec> {
    let method = parse_method(&args.method)?;
    let params: Vec<(&str, &str)> = args
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let query: QueryParams = args.query.iter().cloned().collect();
    let mut spec = RequestSpec::endpoint(method, endpoint, &params)?.query_params(query);

    if let Some(data) = &args.data {
        spec = spec.json(read_body(data)?);
    }
    if args.no_auth {
        spec = spec.no_auth();
    }
    if let Some(ms) = args.timeout_ms {
        spec = spec.timeout(Duration::from_millis(ms));
    }
    if let Some(retries) = args.retries {
        spec = spec.max_retries(retries);
    }

    Ok(spec)
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(Error::invalid_args(format!(
            "unsupported HTTP method '{}' (expected GET, POST, PUT, PATCH or DELETE)",
            other
        ))),
    }
}

/// Parse `--data`: inline JSON or `@path` to a JSON file
fn read_body(data: &str) -> Result<Value> {
    let content = match data.strip_prefix('@') {
        Some(path) => {
            let path = Path::new(path);
            if !path.exists() {
                return Err(Error::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            std::fs::read_to_string(path)?
        }
        None => data.to_string(),
    };

    Ok(serde_json::from_str(&content)?)
}
