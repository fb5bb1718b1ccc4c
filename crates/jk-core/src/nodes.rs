//! Agent node inspection and cordoning.

use serde::Serialize;

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::types::ComputerListResponse;

/// The node names Jenkins uses for the controller's built-in executor.
const BUILT_IN_NAMES: [&str; 3] = ["built-in", "master", "built-in node"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub name: String,
    pub offline: bool,
    pub temporarily_offline: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub offline_cause: String,
}

pub async fn list_nodes(client: &JenkinsClient) -> Result<Vec<NodeInfo>> {
    let body: ComputerListResponse = client
        .get_json(
            "/computer/api/json",
            &[(
                "tree",
                "computer[displayName,offline,temporarilyOffline,offlineCauseReason]",
            )],
        )
        .await?;

    Ok(body
        .computers
        .into_iter()
        .map(|c| NodeInfo {
            name: c.display_name,
            offline: c.offline,
            temporarily_offline: c.temporarily_offline,
            offline_cause: c.offline_cause_reason.trim().to_string(),
        })
        .collect())
}

/// Toggles a node's temporarily-offline flag, optionally recording a
/// message.
pub async fn set_node_offline(
    client: &JenkinsClient,
    name: &str,
    offline: bool,
    message: &str,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("node name required".to_string()));
    }

    let mut spec = RequestSpec::post(format!("/computer/{}/toggleOffline", encode_node_name(name)))
        .query("offline", offline.to_string());
    if !message.is_empty() {
        spec = spec.query("offlineMessage", message);
    }

    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: format!("toggle node {name}"),
            status,
        });
    }
    Ok(())
}

/// Deletes a node. The controller's built-in node is protected.
pub async fn delete_node(client: &JenkinsClient, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("node name required".to_string()));
    }
    if is_built_in_node(name) {
        return Err(Error::InvalidInput(
            "cannot delete the built-in node".to_string(),
        ));
    }

    let spec = RequestSpec::post(format!("/computer/{}/doDelete", encode_node_name(name)));
    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: format!("delete node {name}"),
            status,
        });
    }
    Ok(())
}

fn is_built_in_node(name: &str) -> bool {
    let lower = name.to_lowercase();
    BUILT_IN_NAMES.iter().any(|candidate| lower == *candidate)
}

fn encode_node_name(name: &str) -> String {
    // Jenkins exposes the built-in node as "(built-in)" in URLs.
    if is_built_in_node(name) {
        "(built-in)".to_string()
    } else {
        urlencoding::encode(name).into_owned()
    }
}
