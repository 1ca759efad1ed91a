//! The `endpoints` command: browse the catalog

use crate::cli::{EndpointsArgs, OutputFormat};
use crate::error::Result;
use crate::output::OutputWriter;
use courier_core::endpoints::{by_domain, Domain, Endpoint, CATALOG};

/// Handle the endpoints command
pub async fn handle_endpoints(args: EndpointsArgs, output: &mut OutputWriter) -> Result<()> {
    let selected = select(args.domain.as_deref())?;

    if output.format() != OutputFormat::Human {
        return output.data(&selected);
    }

    let rows = selected
        .iter()
        .map(|e| vec![e.name.to_string(), e.domain.to_string(), e.template.to_string()])
        .collect();
    output.table(&["NAME", "DOMAIN", "PATH"], rows)?;
    output.info(&format!("{} endpoint(s)", selected.len()))
}

fn select(domain: Option<&str>) -> Result<Vec<&'static Endpoint>> {
    Ok(match domain {
        Some(name) => by_domain(name.parse::<Domain>()?).collect(),
        None => CATALOG.iter().collect(),
    })
}
