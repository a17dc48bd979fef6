//! Service status commands: health and the profile catalog

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthResponse, ProfileList, ReadinessResponse};
use crate::output::{
    color_status, format_fraction, format_score, format_timestamp, print_header, print_json,
    print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Last Check")]
    last_check: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "IPC")]
    ipc: String,
    #[tabled(rename = "Mem Read")]
    mem_read: String,
    #[tabled(rename = "Mem Write")]
    mem_write: String,
    #[tabled(rename = "C6 Residency")]
    c6res: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.probe("healthz").await?;
    let readiness: ReadinessResponse = client.probe("readyz").await?;

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "health": health,
            "readiness": readiness,
        }));
    }

    print_header("Scorer Health");
    println!("Status:   {}", color_status(&health.status));
    println!(
        "Ready:    {}",
        if readiness.ready {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        }
    );
    if let Some(reason) = &readiness.reason {
        print_warning(reason);
    }
    println!();

    let mut rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, c)| ComponentRow {
            name: name.clone(),
            status: color_status(&c.status),
            failures: c.consecutive_failures,
            last_check: format_timestamp(c.last_check_timestamp),
            message: c.message.clone().unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    print_table(&rows);

    Ok(())
}

pub async fn list_profiles(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let list: ProfileList = client.get("api/v1/profiles").await?;

    if format == OutputFormat::Json {
        return print_json(&list);
    }

    print_header("Application Profiles");
    let rows: Vec<ProfileRow> = list
        .profiles
        .iter()
        .map(|(name, p)| ProfileRow {
            name: name.clone(),
            ipc: format_score(p.ipc),
            mem_read: format_score(p.mem_read),
            mem_write: format_score(p.mem_write),
            c6res: format_fraction(p.c6res / 100.0),
            duration: format!("{}s", p.duration_secs),
        })
        .collect();
    print_table(&rows);

    Ok(())
}
