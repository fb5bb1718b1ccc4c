//! Plugin manager surface: list, install, enable/disable.

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::types::{InstalledPlugin, PluginListResponse};

pub async fn list_plugins(client: &JenkinsClient) -> Result<Vec<InstalledPlugin>> {
    let body: PluginListResponse = client
        .get_json("/pluginManager/api/json", &[("depth", "1")])
        .await?;
    Ok(body.plugins)
}

/// Triggers installation through the update center. Identifiers default
/// to `@latest` when no version is pinned.
pub async fn install_plugins(client: &JenkinsClient, plugins: &[String]) -> Result<()> {
    let payload = build_install_xml(plugins)?;
    let spec = RequestSpec::post("/pluginManager/installNecessaryPlugins")
        .body("text/xml", payload.into_bytes());

    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: "install plugins".to_string(),
            status,
        });
    }
    Ok(())
}

pub async fn set_plugin_enabled(client: &JenkinsClient, name: &str, enabled: bool) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("plugin name required".to_string()));
    }

    let verb = if enabled { "enable" } else { "disable" };
    let spec = RequestSpec::post(format!(
        "/pluginManager/plugin/{}/{verb}",
        urlencoding::encode(name)
    ));
    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 300 {
        return Err(Error::RequestFailed {
            context: format!("{verb} plugin {name}"),
            status,
        });
    }
    Ok(())
}

/// The `installNecessaryPlugins` endpoint takes a tiny XML document:
/// `<jenkins><install plugin="git@latest"/></jenkins>`.
fn build_install_xml(plugins: &[String]) -> Result<String> {
    let mut entries = Vec::new();
    for plugin in plugins {
        let trimmed = plugin.trim();
        if trimmed.is_empty() {
            continue;
        }
        let pinned = if trimmed.contains('@') {
            trimmed.to_string()
        } else {
            format!("{trimmed}@latest")
        };
        entries.push(format!(
            "  <install plugin=\"{}\"/>",
            xml_escape(&pinned)
        ));
    }

    if entries.is_empty() {
        return Err(Error::InvalidInput(
            "at least one plugin identifier required".to_string(),
        ));
    }
    Ok(format!("<jenkins>\n{}\n</jenkins>\n", entries.join("\n")))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_install_xml() {
        let xml = build_install_xml(&["git".to_string(), "workflow-job@2.40".to_string()]).unwrap();
        assert!(xml.contains("<install plugin=\"git@latest\"/>"));
        assert!(xml.contains("<install plugin=\"workflow-job@2.40\"/>"));
        assert!(xml.starts_with("<jenkins>"));
    }

    #[test]
    fn test_build_install_xml_rejects_empty() {
        assert!(build_install_xml(&[]).is_err());
        assert!(build_install_xml(&["  ".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_list_plugins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pluginManager/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "plugins": [
                    {"shortName": "git", "version": "5.0", "enabled": true, "pinned": false}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let plugins = list_plugins(&client).await.unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].short_name, "git");
        assert!(plugins[0].enabled);
    }

    #[tokio::test]
    async fn test_install_posts_xml_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/pluginManager/installNecessaryPlugins"))
            .and(body_string_contains("git@latest"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        install_plugins(&client, &["git".to_string()]).await.unwrap();
    }
}
