//! Telemetry cache inspection commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, CachedSocket};
use crate::output::{
    color_status, format_score, print_header, print_json, print_success, print_table,
    OutputFormat,
};

#[derive(Tabled)]
struct CacheRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Socket")]
    socket: u32,
    #[tabled(rename = "IPC")]
    ipc: String,
    #[tabled(rename = "Mem Read")]
    mem_read: String,
    #[tabled(rename = "Mem Write")]
    mem_write: String,
    #[tabled(rename = "C6 Residency")]
    c6res: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Values below zero are the "unknown" sentinel
fn cell(value: f64) -> String {
    if value < 0.0 {
        "?".to_string()
    } else {
        format_score(value)
    }
}

pub async fn show_cache(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let entries: Vec<CachedSocket> = client.get("api/v1/cache").await?;

    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    print_header("Telemetry Cache");
    let rows: Vec<CacheRow> = entries
        .iter()
        .map(|e| CacheRow {
            node: e.node.clone(),
            socket: e.socket,
            ipc: cell(e.ipc),
            mem_read: cell(e.mem_read),
            mem_write: cell(e.mem_write),
            c6res: cell(e.c6res),
            state: color_status(if e.fresh { "fresh" } else { "stale" }),
        })
        .collect();
    print_table(&rows);

    Ok(())
}

pub async fn flush_cache(client: &ApiClient, format: OutputFormat) -> Result<()> {
    client.delete("api/v1/cache").await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "flushed": true }))?,
        OutputFormat::Table => print_success("Telemetry cache flushed"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_cells_render_unknown() {
        assert_eq!(cell(-1.0), "?");
        assert_eq!(cell(0.0), "0");
        assert_eq!(cell(0.25), "0.2500");
    }
}
