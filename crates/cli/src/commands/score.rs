//! Scoring commands: single node, ranked node list and idle capacity

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{
    ApiClient, IdleCapacity, PrioritizeRequest, PriorityList, ScoringResult, Workload,
};
use crate::output::{
    color_status, format_fraction, format_score, print_header, print_json, print_table,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct SocketRow {
    #[tabled(rename = "Socket")]
    socket: String,
    #[tabled(rename = "Cores")]
    cores: usize,
    #[tabled(rename = "Base Score")]
    base_score: String,
    #[tabled(rename = "Idle (C6)")]
    idle: String,
    #[tabled(rename = "Gated Score")]
    gated_score: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct PriorityRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Node")]
    host: String,
    #[tabled(rename = "Socket")]
    socket: String,
    #[tabled(rename = "Cores")]
    num_cores: usize,
    #[tabled(rename = "Final Score")]
    final_score: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Node")]
    host: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Retryable")]
    retryable: String,
}

fn socket_label(socket: Option<u32>) -> String {
    socket.map_or_else(|| "-".to_string(), |s| s.to_string())
}

/// Score every socket of one node and show the winner
pub async fn score_node(client: &ApiClient, node: &str, format: OutputFormat) -> Result<()> {
    let result: ScoringResult = client.get(&format!("api/v1/nodes/{}/score", node)).await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    print_header(&format!("Socket Scores: {}", result.node));

    let rows: Vec<SocketRow> = result
        .sockets
        .iter()
        .map(|s| SocketRow {
            socket: if Some(s.socket) == result.socket {
                format!("{} *", s.socket)
            } else {
                s.socket.to_string()
            },
            cores: s.cores,
            base_score: format_score(s.base_score),
            idle: s.c6res.map_or_else(|| "-".to_string(), format_fraction),
            gated_score: format_score(s.gated_score),
            status: color_status(if s.eligible { "eligible" } else { "ineligible" }),
        })
        .collect();
    print_table(&rows);
    println!();

    match result.socket {
        Some(socket) => {
            println!("Winner:        socket {}", socket.to_string().green().bold());
            println!("Score:         {}", format_score(result.score));
            println!("Cores:         {}", result.core_count);
            println!("Final Score:   {}", format_score(result.final_score).cyan());
            println!("Window:        {}s", result.window_secs);
        }
        None => print_warning("No socket is eligible on this node"),
    }

    Ok(())
}

/// Rank nodes for a workload
pub async fn rank_nodes(
    client: &ApiClient,
    nodes: Vec<String>,
    workload: String,
    profile: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let request = PrioritizeRequest {
        workload: Workload {
            name: workload,
            profile,
        },
        nodes,
    };
    let list: PriorityList = client.post("api/v1/prioritize", &request).await?;

    if format == OutputFormat::Json {
        return print_json(&list);
    }

    print_header(&format!("Node Ranking: {}", list.workload));

    let rows: Vec<PriorityRow> = list
        .priorities
        .iter()
        .enumerate()
        .map(|(i, p)| PriorityRow {
            rank: i + 1,
            host: p.host.clone(),
            socket: socket_label(p.socket),
            num_cores: p.num_cores,
            final_score: format_score(p.final_score),
        })
        .collect();
    print_table(&rows);

    if !list.failures.is_empty() {
        println!();
        println!("{}", "Failed Nodes".red().bold());
        let rows: Vec<FailureRow> = list
            .failures
            .iter()
            .map(|f| FailureRow {
                host: f.host.clone(),
                reason: f.reason.clone(),
                retryable: if f.retryable { "yes" } else { "no" }.to_string(),
            })
            .collect();
        print_table(&rows);
    }

    Ok(())
}

/// Show how many cores' worth of idle capacity a node has
pub async fn show_idle(client: &ApiClient, node: &str, format: OutputFormat) -> Result<()> {
    let idle: IdleCapacity = client.get(&format!("api/v1/nodes/{}/idle", node)).await?;

    match format {
        OutputFormat::Json => print_json(&idle)?,
        OutputFormat::Table => {
            print_header(&format!("Idle Capacity: {}", idle.node));
            println!(
                "Idle core equivalent:   {}",
                format!("{:.2}", idle.idle_core_equivalent).cyan()
            );
        }
    }

    Ok(())
}
