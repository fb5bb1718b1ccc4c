//! `jk queue`: inspect and cancel queued items.

use chrono::Utc;
use clap::Subcommand;
use jk_core::queue::{cancel_queue_item, list_queue};

use crate::app::App;
use crate::output::{duration_string, print_output};

#[derive(Debug, Subcommand)]
pub enum QueueCmd {
    /// List queued items
    Ls,
    /// Cancel a queued item
    Cancel { id: i64 },
}

pub async fn run(app: App, cmd: QueueCmd) -> anyhow::Result<i32> {
    match cmd {
        QueueCmd::Ls => list(app).await,
        QueueCmd::Cancel { id } => cancel(app, id).await,
    }
}

async fn list(app: App) -> anyhow::Result<i32> {
    let client = app.client().await?;
    let items = list_queue(&client).await?;

    print_output(app.format, &serde_json::json!({ "items": items_json(&items) }), || {
        if items.is_empty() {
            println!("Queue is empty");
            return Ok(());
        }
        let now = Utc::now().timestamp_millis();
        for item in &items {
            let wait_ms = (now - item.in_queue_since).max(0);
            println!(
                "#{}\t{}\twaiting {}\t{}",
                item.id,
                item.task.name,
                duration_string(wait_ms),
                item.why.as_deref().unwrap_or_default()
            );
        }
        Ok(())
    })?;
    Ok(0)
}

fn items_json(items: &[jk_core::types::QueueItem]) -> Vec<serde_json::Value> {
    items
        .iter()
        .map(|item| {
            serde_json::json!({
                "id": item.id,
                "task": {"name": item.task.name, "url": item.task.url},
                "why": item.why,
                "inQueueSince": item.in_queue_since,
            })
        })
        .collect()
}

async fn cancel(app: App, id: i64) -> anyhow::Result<i32> {
    let client = app.client().await?;
    cancel_queue_item(&client, id).await?;
    println!("Cancelled queue item {id}");
    Ok(0)
}
