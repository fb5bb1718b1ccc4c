//! `jk node`: inspect, cordon, and remove agent nodes.

use clap::Subcommand;
use jk_core::nodes::{delete_node, list_nodes, set_node_offline};

use crate::app::App;
use crate::output::print_output;

#[derive(Debug, Subcommand)]
pub enum NodeCmd {
    /// List Jenkins nodes
    Ls,
    /// Mark a node temporarily offline
    Cordon {
        name: String,
        /// Offline message to display
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Bring a node back online
    Uncordon { name: String },
    /// Delete a node
    Rm { name: String },
}

pub async fn run(app: App, cmd: NodeCmd) -> anyhow::Result<i32> {
    match cmd {
        NodeCmd::Ls => list(app).await,
        NodeCmd::Cordon { name, message } => {
            let client = app.client().await?;
            set_node_offline(&client, &name, true, &message).await?;
            println!("Node {name} marked cordoned");
            Ok(0)
        }
        NodeCmd::Uncordon { name } => {
            let client = app.client().await?;
            set_node_offline(&client, &name, false, "").await?;
            println!("Node {name} marked online");
            Ok(0)
        }
        NodeCmd::Rm { name } => {
            let client = app.client().await?;
            delete_node(&client, &name).await?;
            println!("Deleted node {name}");
            Ok(0)
        }
    }
}

async fn list(app: App) -> anyhow::Result<i32> {
    let client = app.client().await?;
    let nodes = list_nodes(&client).await?;

    print_output(app.format, &nodes, || {
        if nodes.is_empty() {
            println!("No nodes found");
            return Ok(());
        }
        for node in &nodes {
            let mut state = if node.offline { "offline" } else { "online" }.to_string();
            if node.temporarily_offline {
                state.push_str(" (cordoned)");
            }
            if node.offline_cause.is_empty() {
                println!("{}\t{state}", node.name);
            } else {
                println!("{}\t{state}\t{}", node.name, node.offline_cause);
            }
        }
        Ok(())
    })?;
    Ok(0)
}
