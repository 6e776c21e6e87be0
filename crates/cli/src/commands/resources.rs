//! Resource inspection and patching commands

use anyhow::{bail, Result};
use tabled::Tabled;

use crate::client::{ApiClient, PatchRequest, ResourceInfo};
use crate::output::{display_quantity, print_json, print_success, print_table, OutputFormat};

/// Row for the request/limit table
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Request")]
    request: String,
    #[tabled(rename = "Limit")]
    limit: String,
}

impl ResourceRow {
    fn new(resource: &str, info: &ResourceInfo) -> Self {
        Self {
            resource: resource.to_string(),
            request: display_quantity(&info.request),
            limit: display_quantity(&info.limit),
        }
    }
}

/// Show CPU request and limit
pub async fn show_cpu(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info = client.cpu_info().await?;
    print_table(&[ResourceRow::new("cpu", &info)], &info, format);
    Ok(())
}

/// Show memory request and limit
pub async fn show_memory(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info = client.memory_info().await?;
    print_table(&[ResourceRow::new("memory", &info)], &info, format);
    Ok(())
}

/// Show the summed restart count
pub async fn show_restarts(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info = client.restarts().await?;
    match format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => println!("Restarts: {}", info.restarts),
    }
    Ok(())
}

/// Pin CPU and/or memory (request = limit) on the managed workload
pub async fn patch_resources(
    client: &ApiClient,
    cpu: Option<String>,
    memory: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let request = patch_request(cpu, memory)?;
    let response = client.patch(&request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => print_success(&response.message),
    }
    Ok(())
}

fn patch_request(cpu: Option<String>, memory: Option<String>) -> Result<PatchRequest> {
    if cpu.is_none() && memory.is_none() {
        bail!("Nothing to patch: pass --cpu and/or --memory");
    }
    Ok(PatchRequest { cpu, memory })
}
