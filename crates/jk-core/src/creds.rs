//! Credential store surface.
//!
//! Listing prefers the companion plugin's `/jk/api/credentials` facade
//! and falls back to the core credentials-store API when the facade is
//! absent. Creation and deletion always use the core store endpoints.

use serde::{Deserialize, Serialize};

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::path::encode_job_path;

/// Where credentials live: the controller-wide system store or a
/// folder-scoped store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredScope {
    System,
    Folder(String),
}

impl CredScope {
    pub fn parse(scope: &str, folder: &str) -> Result<Self> {
        match scope.trim().to_lowercase().as_str() {
            "" | "system" => Ok(CredScope::System),
            "folder" => {
                let folder = folder.trim();
                if folder.is_empty() {
                    return Err(Error::InvalidInput(
                        "folder path required when scope=folder".to_string(),
                    ));
                }
                Ok(CredScope::Folder(folder.to_string()))
            }
            other => Err(Error::InvalidInput(format!(
                "unsupported scope {other:?}"
            ))),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CredScope::System => "system",
            CredScope::Folder(_) => "folder",
        }
    }

    fn store_path(&self, suffix: &str) -> Result<String> {
        match self {
            CredScope::System => Ok(format!("/credentials/store/system/domain/_/{suffix}")),
            CredScope::Folder(folder) => {
                let encoded = encode_job_path(folder);
                if encoded.is_empty() {
                    return Err(Error::InvalidInput("invalid folder path".to_string()));
                }
                Ok(format!(
                    "/{encoded}/credentials/store/folder/domain/_/{suffix}"
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialItem {
    pub id: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub scope: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialList {
    pub items: Vec<CredentialItem>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct FacadeList {
    #[serde(default)]
    items: Vec<FacadeItem>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct FacadeItem {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct CoreList {
    #[serde(default)]
    credentials: Vec<CoreItem>,
}

#[derive(Debug, Deserialize)]
struct CoreItem {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "typeName")]
    type_name: String,
    #[serde(default, rename = "displayName")]
    display_name: String,
    #[serde(default)]
    description: String,
}

pub async fn list_credentials(
    client: &JenkinsClient,
    scope: &CredScope,
) -> Result<CredentialList> {
    match list_from_facade(client, scope).await? {
        Some(list) => Ok(list),
        None => list_from_core_api(client, scope).await,
    }
}

/// Returns `None` when the facade endpoint is absent (plain Jenkins
/// without the companion plugin).
async fn list_from_facade(
    client: &JenkinsClient,
    scope: &CredScope,
) -> Result<Option<CredentialList>> {
    let mut spec = RequestSpec::get("/jk/api/credentials").query("scope", scope.label());
    if let CredScope::Folder(folder) = scope {
        spec = spec.query("folderPath", folder);
    }

    let resp = client.execute(&spec).await?;
    match resp.status().as_u16() {
        200 => {
            let body: FacadeList = resp.json().await?;
            Ok(Some(CredentialList {
                items: body
                    .items
                    .into_iter()
                    .map(|item| CredentialItem {
                        id: item.id,
                        kind: item.kind,
                        scope: if item.scope.is_empty() {
                            scope.label().to_string()
                        } else {
                            item.scope
                        },
                        path: item.path,
                        description: item.description,
                    })
                    .collect(),
                next_cursor: body.next_cursor,
            }))
        }
        404 => Ok(None),
        status => Err(Error::RequestFailed {
            context: "list credentials (facade)".to_string(),
            status,
        }),
    }
}

async fn list_from_core_api(client: &JenkinsClient, scope: &CredScope) -> Result<CredentialList> {
    let path = scope.store_path("api/json")?;
    let spec = RequestSpec::get(path.as_str()).query(
        "tree",
        "credentials[id,typeName,displayName,description]",
    );

    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status == 404 {
        // Neither the facade nor the credentials plugin store exists.
        return Err(Error::FeatureUnsupported("credentials listing".to_string()));
    }
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: "list credentials".to_string(),
            status,
        });
    }

    let body: CoreList = resp.json().await?;
    let display_path = match scope {
        CredScope::System => "system".to_string(),
        CredScope::Folder(folder) => folder.clone(),
    };

    Ok(CredentialList {
        items: body
            .credentials
            .into_iter()
            .map(|c| CredentialItem {
                id: c.id,
                kind: c.type_name,
                scope: scope.label().to_string(),
                path: display_path.clone(),
                description: if c.description.trim().is_empty() {
                    c.display_name
                } else {
                    c.description
                },
            })
            .collect(),
        next_cursor: String::new(),
    })
}

/// Creates a secret-text credential in the given scope.
pub async fn create_secret_text(
    client: &JenkinsClient,
    scope: &CredScope,
    id: &str,
    description: &str,
    secret: &str,
) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidInput("credential id required".to_string()));
    }
    if secret.is_empty() {
        return Err(Error::InvalidInput(
            "secret value cannot be empty".to_string(),
        ));
    }

    let payload = serde_json::json!({
        "": "0",
        "credentials": {
            "scope": "GLOBAL",
            "id": id,
            "description": description,
            "$class": "org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl",
            "secret": secret,
        }
    });

    let path = scope.store_path("createCredentials")?;
    let form = vec![("json".to_string(), payload.to_string())];
    let spec = RequestSpec::post(path.as_str()).form(form);

    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: format!("create credential {id}"),
            status,
        });
    }
    Ok(())
}

pub async fn delete_credential(client: &JenkinsClient, scope: &CredScope, id: &str) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidInput("credential id required".to_string()));
    }

    let path = scope.store_path(&format!("credential/{}/doDelete", urlencoding::encode(id)))?;
    let resp = client.execute(&RequestSpec::post(path.as_str())).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: format!("delete credential {id}"),
            status,
        });
    }
    Ok(())
}
