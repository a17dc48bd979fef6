//! Placement feedback command

use anyhow::Result;

use crate::client::{ApiClient, Placement};
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Report a committed placement so the cache reflects its expected load
pub async fn record_placement(
    client: &ApiClient,
    node: String,
    socket: u32,
    profile: String,
    no_idle: bool,
    format: OutputFormat,
) -> Result<()> {
    let placement = Placement {
        node,
        socket,
        profile,
        counts_toward_idle: !no_idle,
    };

    client.post_no_content("api/v1/placements", &placement).await?;

    match format {
        OutputFormat::Json => print_json(&placement)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Recorded placement of '{}' on {} socket {}",
                placement.profile, placement.node, placement.socket
            ));
            if !placement.counts_toward_idle {
                print_info("Idle residency left unchanged");
            }
        }
    }

    Ok(())
}
