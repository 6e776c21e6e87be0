//! Agent health command

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, print_json, print_warning, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

/// Show liveness and readiness of the agent
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    if let OutputFormat::Json = format {
        print_json(&HealthReport { health, readiness });
        return Ok(());
    }

    println!("Agent: {}", color_status(&health.status));
    if readiness.ready {
        println!("Ready: {}", color_status("ready"));
    } else {
        println!("Ready: {}", color_status("not ready"));
        if let Some(reason) = &readiness.reason {
            print_warning(reason);
        }
    }

    let rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, component)| ComponentRow {
            name: name.clone(),
            status: color_status(&component.status),
            failures: component.consecutive_failures,
            message: component.message.clone().unwrap_or_default(),
        })
        .collect();

    if !rows.is_empty() {
        let table = tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string();
        println!("{}", table);
    }

    Ok(())
}
