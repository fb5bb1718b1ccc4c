//! Build queue inspection and cancellation.

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::types::{QueueItem, QueueListResponse};

/// Lists queued items with their task names and wait reasons.
pub async fn list_queue(client: &JenkinsClient) -> Result<Vec<QueueItem>> {
    let body: QueueListResponse = client
        .get_json(
            "/queue/api/json",
            &[("tree", "items[id,task[name,url],why,inQueueSince]")],
        )
        .await?;
    Ok(body.items)
}

/// Cancels a queued item by id.
pub async fn cancel_queue_item(client: &JenkinsClient, id: i64) -> Result<()> {
    let spec = RequestSpec::post("/queue/cancelItem").query("id", id.to_string());
    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::CancelFailed(format!(
            "server returned HTTP {status}"
        )));
    }
    Ok(())
}
