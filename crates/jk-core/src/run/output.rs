//! Serializable output shapes for run listings and run detail.
//!
//! These are the agent-facing contracts: stable field names, `camelCase`
//! on the wire, optional blocks omitted when empty.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::inspect::{
    extract_causes, extract_parameters, extract_scm_info, status_from_building, value_to_string,
    CauseInfo, RunInspection, ScmInfo,
};
use crate::types::{ArtifactItem, RunDetail, TestReport};

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListOutput {
    pub schema_version: String,
    pub items: Vec<RunListItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<RunGroupOutput>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_cursor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunListMetadata>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListItem {
    pub id: String,
    pub number: i64,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub start_time: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<RunItemFields>,
}

/// Extra projections requested via `--select`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunItemFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<ArtifactItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<RunCauseOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<i64>,
}

impl RunItemFields {
    fn is_empty(&self) -> bool {
        self.parameters.is_none()
            && self.artifacts.is_none()
            && self.causes.is_none()
            && self.url.is_none()
            && self.queue_id.is_none()
            && self.estimated_duration_ms.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunGroupOutput {
    pub key: String,
    pub value: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<RunListItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<RunListItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListMetadata {
    pub filters: FilterMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterInfo>,
    pub fields: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_by: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub aggregation: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub since: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterMetadata {
    pub available: Vec<&'static str>,
    pub operators: Vec<&'static str>,
}

/// One discovered job parameter, shared between run metadata and the
/// `run params` command. Secret parameters never carry a default or
/// samples.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default: String,
    pub is_secret: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<String>,
    pub frequency: f64,
}

impl Default for ParameterInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            default: String::new(),
            is_secret: false,
            sample_values: Vec::new(),
            frequency: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCauseOutput {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl From<&CauseInfo> for RunCauseOutput {
    fn from(cause: &CauseInfo) -> Self {
        Self {
            kind: cause.kind.clone(),
            user_id: cause.user_id.clone(),
            user_name: cause.user_name.clone(),
            description: cause.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunScmOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
}

impl From<ScmInfo> for RunScmOutput {
    fn from(scm: ScmInfo) -> Self {
        Self {
            branch: scm.branch,
            commit: scm.commit,
            repo: scm.repo,
            author: scm.author,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParameterOutput {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStageOutput {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub start_time: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub pause_duration_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestSummary {
    pub total: i64,
    pub failed: i64,
    pub skipped: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueueInfo {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunNodeInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub executor: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetailOutput {
    pub id: String,
    pub number: i64,
    pub job_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub start_time: String,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub estimated_duration_ms: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RunParameterOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm: Option<RunScmOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<RunCauseOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<RunStageOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<RunTestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<RunQueueInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<RunNodeInfo>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

pub fn format_timestamp(ms: i64) -> String {
    if ms <= 0 {
        return String::new();
    }
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Result column for a listing: running builds render empty, completed
/// builds with no recorded result count as SUCCESS.
pub fn result_for_list(result: Option<&str>, building: bool) -> String {
    if building {
        return String::new();
    }
    let normalized = result.unwrap_or_default().trim().to_uppercase();
    if normalized.is_empty() {
        "SUCCESS".to_string()
    } else {
        normalized
    }
}

/// Renders one matched inspection as a listing item, attaching the
/// selected extra fields.
pub fn build_run_list_item(
    job_path: &str,
    inspection: &RunInspection,
    selection: &[String],
) -> RunListItem {
    let summary = &inspection.summary;
    let scm = extract_scm_info(&summary.actions, &summary.change_set);

    let mut fields = RunItemFields::default();
    for field in selection {
        match field.as_str() {
            "parameters" => {
                fields.parameters = Some(inspection.parameters.clone().into_iter().collect());
            }
            "artifacts" => fields.artifacts = Some(inspection.artifacts.clone()),
            "causes" => {
                fields.causes = Some(inspection.causes.iter().map(RunCauseOutput::from).collect());
            }
            "url" => fields.url = summary.url.clone(),
            "queueid" => fields.queue_id = Some(summary.queue_id),
            "estimateddurationms" => {
                fields.estimated_duration_ms = Some(summary.estimated_duration);
            }
            _ => {}
        }
    }

    RunListItem {
        id: format!("{job_path}/{}", summary.number),
        number: summary.number,
        status: status_from_building(summary.building).to_string(),
        result: result_for_list(summary.result.as_deref(), summary.building),
        duration_ms: summary.duration,
        start_time: format_timestamp(summary.timestamp),
        branch: scm.branch,
        commit: scm.commit,
        fields: (!fields.is_empty()).then_some(fields),
    }
}

/// Assembles the `run view` output from the raw detail payload.
pub fn build_run_detail_output(
    job_path: &str,
    detail: &RunDetail,
    test_report: Option<&TestReport>,
) -> RunDetailOutput {
    let normalized = crate::path::normalize_job_path(job_path);
    let status = status_from_building(detail.building);
    let result = result_for_list(detail.result.as_deref(), detail.building);

    let parameters = extract_detail_parameters(detail);
    let scm = extract_scm_info(&detail.actions, &detail.change_set);
    let causes: Vec<RunCauseOutput> = extract_causes(&detail.actions)
        .iter()
        .map(RunCauseOutput::from)
        .collect();
    let stages = extract_stages(&detail.stages);

    let queue = (detail.queue_id > 0).then(|| RunQueueInfo {
        id: detail.queue_id,
    });

    let built_on = detail.built_on.clone().unwrap_or_default();
    let executor = detail.executor.as_ref().map(|e| e.number).unwrap_or(0);
    let node = (!built_on.is_empty() || executor > 0).then(|| RunNodeInfo {
        display_name: built_on,
        executor,
    });

    RunDetailOutput {
        id: format!("{normalized}/{}", detail.number),
        number: detail.number,
        job_path: normalized,
        url: detail.url.clone().unwrap_or_default(),
        status: status.to_string(),
        result,
        start_time: format_timestamp(detail.timestamp),
        duration_ms: detail.duration,
        estimated_duration_ms: detail.estimated_duration,
        parameters,
        scm: (!scm.is_empty()).then(|| scm.into()),
        causes,
        stages,
        artifacts: detail.artifacts.clone(),
        tests: test_report.map(|report| RunTestSummary {
            total: report.total_count,
            failed: report.fail_count,
            skipped: report.skip_count,
        }),
        queue,
        node,
        description: detail
            .description
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string(),
        display_name: detail
            .full_display_name
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

/// Merges the detail-level `parameters` array with any parameters buried
/// in actions; first occurrence wins, output sorted by name.
pub fn extract_detail_parameters(detail: &RunDetail) -> Vec<RunParameterOutput> {
    let mut seen = std::collections::HashSet::new();
    let mut params = Vec::new();

    for entry in &detail.parameters {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        params.push(RunParameterOutput {
            name: name.to_string(),
            value: entry.get("value").cloned().unwrap_or(Value::Null),
        });
    }

    for (name, value) in extract_parameters(&detail.actions) {
        if seen.insert(name.clone()) {
            params.push(RunParameterOutput {
                name,
                value: Value::String(value),
            });
        }
    }

    params.sort_by(|a, b| a.name.cmp(&b.name));
    params
}

/// Collects rerun parameters as form values from a previous run.
pub fn collect_rerun_parameters(detail: &RunDetail) -> Vec<(String, String)> {
    extract_detail_parameters(detail)
        .into_iter()
        .map(|p| (p.name, value_to_string(&p.value)))
        .collect()
}

fn extract_stages(raw: &[Value]) -> Vec<RunStageOutput> {
    let mut stages = Vec::with_capacity(raw.len());
    for stage in raw {
        let name = stage
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let mut status = stage
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let result = stage
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        if status.is_empty()
            && matches!(
                result.as_str(),
                "SUCCESS" | "UNSTABLE" | "FAILURE" | "ABORTED" | "NOT_BUILT"
            )
        {
            status = "completed".to_string();
        }

        stages.push(RunStageOutput {
            name: name.to_string(),
            status,
            result,
            duration_ms: first_i64(stage, &["durationMillis", "durationMs", "duration"]),
            start_time: format_timestamp(first_i64(stage, &["startTimeMillis"])),
            pause_duration_ms: first_i64(stage, &["pauseDurationMillis", "pauseDurationMs"]),
        });
    }
    stages
}

fn first_i64(value: &Value, keys: &[&str]) -> i64 {
    for key in keys {
        if let Some(n) = value.get(key).and_then(Value::as_i64) {
            if n != 0 {
                return n;
            }
        }
        if let Some(f) = value.get(key).and_then(Value::as_f64) {
            if f != 0.0 {
                return f as i64;
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "");
        assert_eq!(format_timestamp(-5), "");
        assert_eq!(format_timestamp(1_700_000_000_000), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_result_for_list() {
        assert_eq!(result_for_list(Some("failure"), false), "FAILURE");
        assert_eq!(result_for_list(None, false), "SUCCESS");
        assert_eq!(result_for_list(Some(""), false), "SUCCESS");
        assert_eq!(result_for_list(Some("SUCCESS"), true), "");
    }

    #[test]
    fn test_detail_parameters_merge_and_sort() {
        let detail: RunDetail = serde_json::from_value(json!({
            "number": 1,
            "parameters": [{"name": "ZETA", "value": "z"}],
            "actions": [{"parameters": [
                {"name": "ALPHA", "value": "a"},
                {"name": "ZETA", "value": "shadowed"}
            ]}]
        }))
        .unwrap();

        let params = extract_detail_parameters(&detail);
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ALPHA", "ZETA"]);
        assert_eq!(params[1].value, json!("z"));
    }

    #[test]
    fn test_stage_status_derived_from_result() {
        let detail: RunDetail = serde_json::from_value(json!({
            "number": 1,
            "stages": [
                {"name": "Build", "result": "SUCCESS", "durationMillis": 1200},
                {"name": "Deploy", "status": "IN_PROGRESS"},
                {"noname": true}
            ]
        }))
        .unwrap();

        let out = build_run_detail_output("team/app", &detail, None);
        assert_eq!(out.stages.len(), 2);
        assert_eq!(out.stages[0].status, "completed");
        assert_eq!(out.stages[0].duration_ms, 1200);
        assert_eq!(out.stages[1].status, "in_progress");
    }

    #[test]
    fn test_detail_output_shape() {
        let detail: RunDetail = serde_json::from_value(json!({
            "number": 128,
            "result": "SUCCESS",
            "building": false,
            "timestamp": 1_700_000_000_000i64,
            "duration": 45000,
            "url": "https://jenkins.example.com/job/team/job/app/128/",
            "queueId": 42,
            "builtOn": "agent-7",
            "executor": {"number": 2}
        }))
        .unwrap();

        let out = build_run_detail_output("/team/app/", &detail, None);
        assert_eq!(out.id, "team/app/128");
        assert_eq!(out.job_path, "team/app");
        assert_eq!(out.status, "completed");
        assert_eq!(out.result, "SUCCESS");
        assert_eq!(out.queue.unwrap().id, 42);
        let node = out.node.unwrap();
        assert_eq!(node.display_name, "agent-7");
        assert_eq!(node.executor, 2);
    }

    #[test]
    fn test_collect_rerun_parameters_stringifies() {
        let detail: RunDetail = serde_json::from_value(json!({
            "number": 1,
            "parameters": [
                {"name": "CHART", "value": "nova"},
                {"name": "REPLICAS", "value": 3},
                {"name": "DRY_RUN", "value": true}
            ]
        }))
        .unwrap();

        let form = collect_rerun_parameters(&detail);
        assert!(form.contains(&("CHART".to_string(), "nova".to_string())));
        assert!(form.contains(&("REPLICAS".to_string(), "3".to_string())));
        assert!(form.contains(&("DRY_RUN".to_string(), "true".to_string())));
    }
}
