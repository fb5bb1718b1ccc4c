//! Job parameter discovery.
//!
//! Three sources: the job's `config.xml` (authoritative definitions,
//! including types and defaults), recent runs (observed usage via the
//! listing pipeline's metadata collector), and `auto` (config first,
//! falling back to runs when the config yields nothing). Secret-looking
//! parameters are always redacted: no default, no samples.

use serde::Serialize;

use crate::client::{Accept, JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::filter::is_likely_secret;
use crate::path::{encode_job_path, normalize_job_path};
use crate::run::{execute_run_list, ParameterInfo, RunListOptions};

pub const DEFAULT_RUNS_LIMIT: usize = 50;

const MAX_CHOICE_SAMPLES: usize = 5;

/// Where to read parameter definitions from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamsSource {
    #[default]
    Auto,
    Config,
    Runs,
}

impl ParamsSource {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(ParamsSource::Auto),
            "config" => Ok(ParamsSource::Config),
            "runs" => Ok(ParamsSource::Runs),
            _ => Err(Error::InvalidInput(format!(
                "unsupported source {value:?} (expected auto, config, runs)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsOutput {
    pub job_path: String,
    pub source: &'static str,
    pub parameters: Vec<ParameterInfo>,
}

/// Discovers parameters for a job from the requested source.
pub async fn discover_parameters(
    client: &JenkinsClient,
    job_path: &str,
    source: ParamsSource,
    limit_runs: usize,
) -> Result<ParamsOutput> {
    let limit_runs = if limit_runs == 0 {
        DEFAULT_RUNS_LIMIT
    } else {
        limit_runs
    };

    let (mut parameters, used_source) = match source {
        ParamsSource::Config => (params_from_config(client, job_path).await?, "config"),
        ParamsSource::Runs => (params_from_runs(client, job_path, limit_runs).await?, "runs"),
        ParamsSource::Auto => {
            let config_result = params_from_config(client, job_path).await;
            match config_result {
                Ok(params) if !params.is_empty() => (params, "config"),
                Ok(_) => (params_from_runs(client, job_path, limit_runs).await?, "runs"),
                Err(config_err) => match params_from_runs(client, job_path, limit_runs).await {
                    Ok(params) => (params, "runs"),
                    Err(_) => return Err(config_err),
                },
            }
        }
    };

    parameters.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    Ok(ParamsOutput {
        job_path: normalize_job_path(job_path),
        source: used_source,
        parameters,
    })
}

async fn params_from_config(client: &JenkinsClient, job_path: &str) -> Result<Vec<ParameterInfo>> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }

    let spec = RequestSpec::get(format!("/{encoded}/config.xml")).accept(Accept::Xml);
    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status == 404 {
        return Ok(Vec::new());
    }
    if status >= 400 {
        return Err(Error::RequestFailed {
            context: format!("fetch config for {job_path}"),
            status,
        });
    }

    let body = resp.text().await?;
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    parse_parameters_from_config(&body)
}

async fn params_from_runs(
    client: &JenkinsClient,
    job_path: &str,
    limit: usize,
) -> Result<Vec<ParameterInfo>> {
    let opts = RunListOptions {
        limit,
        with_meta: true,
        ..RunListOptions::default()
    };
    let output = execute_run_list(client, job_path, &opts).await?;

    let mut params = output
        .metadata
        .map(|meta| meta.parameters)
        .unwrap_or_default();
    for param in &mut params {
        if param.frequency == 0.0 {
            param.frequency = 1.0;
        }
    }
    Ok(params)
}

/// Parses parameter definitions out of a job `config.xml`. Every
/// immediate child of a `parameterDefinitions` element is one parameter;
/// the element name (minus its package prefix) determines the type.
pub fn parse_parameters_from_config(xml: &str) -> Result<Vec<ParameterInfo>> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut params = Vec::new();

    for defs in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "parameterDefinitions")
    {
        for node in defs.children().filter(|n| n.is_element()) {
            let (kind, type_secret) = parameter_type_from_element(node.tag_name().name());
            let mut info = ParameterInfo {
                kind,
                is_secret: type_secret,
                frequency: 1.0,
                ..ParameterInfo::default()
            };

            for field in node.children().filter(|n| n.is_element()) {
                match field.tag_name().name() {
                    "name" => {
                        info.name = field.text().unwrap_or_default().trim().to_string();
                    }
                    "defaultValue" => {
                        info.default = field.text().unwrap_or_default().trim().to_string();
                    }
                    "choices" => {
                        for choice in field
                            .descendants()
                            .filter(|n| n.is_element() && n.tag_name().name() == "string")
                        {
                            let value = choice.text().unwrap_or_default().trim().to_string();
                            if value.is_empty() || info.sample_values.contains(&value) {
                                continue;
                            }
                            if info.sample_values.len() < MAX_CHOICE_SAMPLES {
                                info.sample_values.push(value);
                            }
                        }
                    }
                    _ => {}
                }
            }

            if info.name.is_empty() {
                continue;
            }
            if is_likely_secret(&info.name) {
                info.is_secret = true;
            }
            if info.is_secret {
                info.default.clear();
                info.sample_values.clear();
            }
            params.push(info);
        }
    }

    params.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(params)
}

/// Maps a definition element name (package prefix stripped) to a
/// parameter type and its inherent secrecy.
fn parameter_type_from_element(element_name: &str) -> (String, bool) {
    let local = element_name
        .rsplit('.')
        .next()
        .unwrap_or(element_name)
        .to_string();

    match local.to_lowercase().as_str() {
        "stringparameterdefinition" => ("string".to_string(), false),
        "booleanparameterdefinition" => ("boolean".to_string(), false),
        "choiceparameterdefinition" => ("choice".to_string(), false),
        "textparameterdefinition" => ("text".to_string(), false),
        "fileparameterdefinition" => ("file".to_string(), false),
        "passwordparameterdefinition" => ("password".to_string(), true),
        "credentialsparameterdefinition" => ("credentials".to_string(), true),
        lower => {
            let cleaned = local
                .strip_suffix("ParameterDefinition")
                .or_else(|| local.strip_suffix("Definition"))
                .unwrap_or(&local);
            let secret = lower.contains("password") || lower.contains("secret");
            let cleaned = if cleaned.is_empty() { &local } else { cleaned };
            (cleaned.to_lowercase(), secret)
        }
    }
}
