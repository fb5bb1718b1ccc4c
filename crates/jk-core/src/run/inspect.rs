//! Per-run inspection: building the typed attribute context.
//!
//! One inspection per build, shared between filtering, grouping, and
//! metadata collection. The `actions` array is schema-less, so each
//! extractor pulls what it recognizes out of the raw JSON maps and
//! otherwise no-ops.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::filter::{AttrContext, AttrValue};
use crate::types::{ArtifactItem, ChangeSet, RunSummary};

/// A classified build cause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CauseInfo {
    pub kind: String,
    pub user_id: String,
    pub user_name: String,
    pub description: String,
}

/// SCM facts pulled from actions and the changeset; first non-empty wins
/// per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScmInfo {
    pub branch: String,
    pub commit: String,
    pub repo: String,
    pub author: String,
}

impl ScmInfo {
    pub fn is_empty(&self) -> bool {
        self.branch.is_empty()
            && self.commit.is_empty()
            && self.repo.is_empty()
            && self.author.is_empty()
    }
}

/// Everything derived from one build: the summary, its attribute context,
/// and the extracted parameter/cause/artifact views.
#[derive(Debug, Clone)]
pub struct RunInspection {
    pub summary: RunSummary,
    pub context: AttrContext,
    pub parameters: HashMap<String, String>,
    pub causes: Vec<CauseInfo>,
    pub artifacts: Vec<ArtifactItem>,
}

pub fn status_from_building(building: bool) -> &'static str {
    if building {
        "running"
    } else {
        "completed"
    }
}

/// Builds the attribute context for a run. Parameters, causes, and
/// artifacts are only extracted when a filter, selection, or grouping
/// actually references them.
pub fn inspect_run(
    summary: RunSummary,
    need_params: bool,
    need_causes: bool,
    need_artifacts: bool,
) -> RunInspection {
    let mut ctx = AttrContext::new();

    let result = summary
        .result
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_uppercase();
    let status = status_from_building(summary.building);
    ctx.insert(
        "result".to_string(),
        AttrValue::Str(if result.is_empty() {
            status.to_string()
        } else {
            result
        }),
    );
    ctx.insert("status".to_string(), AttrValue::Str(status.to_string()));
    ctx.insert("queue.id".to_string(), AttrValue::Int(summary.queue_id));
    ctx.insert("building".to_string(), AttrValue::Bool(summary.building));
    if let Some(started) = DateTime::<Utc>::from_timestamp_millis(summary.timestamp) {
        ctx.insert("started".to_string(), AttrValue::Instant(started));
    }
    ctx.insert(
        "duration".to_string(),
        AttrValue::Span(millis_to_duration(summary.duration)),
    );
    ctx.insert(
        "estimatedDuration".to_string(),
        AttrValue::Span(millis_to_duration(summary.estimated_duration)),
    );

    let mut parameters = HashMap::new();
    if need_params {
        parameters = extract_parameters(&summary.actions);
        for (name, value) in &parameters {
            ctx.insert(format!("param.{name}"), AttrValue::Str(value.clone()));
        }
    }

    let mut causes = Vec::new();
    if need_causes {
        causes = extract_causes(&summary.actions);
        let users: Vec<String> = causes
            .iter()
            .filter_map(|c| {
                if !c.user_name.is_empty() {
                    Some(c.user_name.clone())
                } else if !c.user_id.is_empty() {
                    Some(c.user_id.clone())
                } else {
                    None
                }
            })
            .collect();
        let kinds: Vec<String> = causes
            .iter()
            .filter(|c| !c.kind.is_empty())
            .map(|c| c.kind.clone())
            .collect();
        if !users.is_empty() {
            ctx.insert("cause.user".to_string(), AttrValue::List(users));
        }
        if !kinds.is_empty() {
            ctx.insert("cause.type".to_string(), AttrValue::List(kinds));
        }
    }

    if need_artifacts {
        let names: Vec<String> = summary
            .artifacts
            .iter()
            .filter(|a| !a.file_name.is_empty())
            .map(|a| a.file_name.clone())
            .collect();
        let paths: Vec<String> = summary
            .artifacts
            .iter()
            .filter(|a| !a.relative_path.is_empty())
            .map(|a| a.relative_path.clone())
            .collect();
        if !names.is_empty() {
            ctx.insert("artifact.name".to_string(), AttrValue::List(names));
        }
        if !paths.is_empty() {
            ctx.insert("artifact.path".to_string(), AttrValue::List(paths));
        }
    }

    let scm = extract_scm_info(&summary.actions, &summary.change_set);
    if !scm.branch.is_empty() {
        ctx.insert("branch".to_string(), AttrValue::Str(scm.branch));
    }
    if !scm.commit.is_empty() {
        ctx.insert("commit".to_string(), AttrValue::Str(scm.commit));
    }

    let artifacts = summary.artifacts.clone();
    RunInspection {
        summary,
        context: ctx,
        parameters,
        causes,
        artifacts,
    }
}

fn millis_to_duration(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

/// Walks `actions[].parameters[]`; first occurrence wins per name.
pub fn extract_parameters(actions: &[Value]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for action in actions {
        let Some(entries) = action.get("parameters").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || params.contains_key(name) {
                continue;
            }
            let value = entry
                .get("value")
                .map(value_to_string)
                .unwrap_or_default();
            params.insert(name.to_string(), value);
        }
    }
    params
}

/// Renders a parameter value the way a user typed it: strings verbatim,
/// everything else via JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn extract_causes(actions: &[Value]) -> Vec<CauseInfo> {
    let mut causes = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for action in actions {
        let Some(entries) = action.get("causes").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(map) = entry.as_object() else {
                continue;
            };
            let class_name = map
                .get("_class")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let description = map
                .get("shortDescription")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let cause = CauseInfo {
                kind: classify_cause(class_name, description),
                user_id: map
                    .get("userId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                user_name: map
                    .get("userName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                description: description.to_string(),
            };
            let key = format!(
                "{}|{}|{}|{}",
                cause.kind, cause.user_id, cause.user_name, cause.description
            );
            if seen.insert(key) {
                causes.push(cause);
            }
        }
    }
    causes
}

/// Maps a cause `_class` (or its short description as a fallback) onto
/// the coarse type used by `cause.type` filters.
pub fn classify_cause(class_name: &str, description: &str) -> String {
    let class_lower = class_name.to_lowercase();
    let by_class = if class_lower.contains("useridcause") {
        "user"
    } else if class_lower.contains("scmtrigger") {
        "scm"
    } else if class_lower.contains("timertrigger") {
        "timer"
    } else if class_lower.contains("upstream") {
        "upstream"
    } else {
        ""
    };
    if !by_class.is_empty() {
        return by_class.to_string();
    }

    let desc_lower = description.to_lowercase();
    let by_desc = if desc_lower.contains("user") {
        "user"
    } else if desc_lower.contains("scm") {
        "scm"
    } else if desc_lower.contains("timer") {
        "timer"
    } else if desc_lower.contains("upstream") {
        "upstream"
    } else {
        "other"
    };
    by_desc.to_string()
}

pub fn extract_scm_info(actions: &[Value], change_set: &ChangeSet) -> ScmInfo {
    let mut info = ScmInfo::default();

    for action in actions {
        if let Some(last_built) = action.get("lastBuiltRevision").and_then(Value::as_object) {
            if info.commit.is_empty() {
                if let Some(sha) = last_built.get("SHA1").and_then(Value::as_str) {
                    info.commit = sha.to_string();
                }
            }
            if let Some(branches) = last_built.get("branch").and_then(Value::as_array) {
                for branch in branches {
                    if info.branch.is_empty() {
                        if let Some(name) = branch.get("name").and_then(Value::as_str) {
                            info.branch = name.to_string();
                        }
                    }
                }
            }
        }

        if let Some(by_branch) = action.get("buildsByBranchName").and_then(Value::as_object) {
            for (name, entry) in by_branch {
                if info.branch.is_empty() {
                    info.branch = name.clone();
                }
                if info.commit.is_empty() {
                    if let Some(rev) = entry.get("revision").and_then(Value::as_str) {
                        info.commit = rev.to_string();
                    }
                }
            }
        }

        if let Some(remotes) = action.get("remoteUrls").and_then(Value::as_array) {
            if info.repo.is_empty() {
                if let Some(url) = remotes.iter().find_map(Value::as_str) {
                    info.repo = url.to_string();
                }
            }
        }

        if info.repo.is_empty() {
            if let Some(remote) = action.get("remoteUrl").and_then(Value::as_str) {
                info.repo = remote.to_string();
            }
        }
    }

    for item in &change_set.items {
        if info.commit.is_empty() && !item.commit_id.is_empty() {
            info.commit = item.commit_id.clone();
        }
        if info.author.is_empty() {
            if !item.author_email.is_empty() {
                info.author = item.author_email.clone();
            } else if !item.author.full_name.is_empty() {
                info.author = item.author.full_name.clone();
            }
        }
        if !info.commit.is_empty() && !info.author.is_empty() {
            break;
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary_with_actions(actions: Vec<Value>) -> RunSummary {
        RunSummary {
            number: 128,
            result: Some("failure".to_string()),
            building: false,
            timestamp: 1_700_000_000_000,
            duration: 45_000,
            estimated_duration: 60_000,
            queue_id: 9,
            actions,
            ..RunSummary::default()
        }
    }

    #[test]
    fn test_context_core_keys() {
        let inspection = inspect_run(summary_with_actions(vec![]), false, false, false);
        let ctx = &inspection.context;

        assert_eq!(ctx.get("result"), Some(&AttrValue::Str("FAILURE".into())));
        assert_eq!(ctx.get("status"), Some(&AttrValue::Str("completed".into())));
        assert_eq!(ctx.get("queue.id"), Some(&AttrValue::Int(9)));
        assert_eq!(
            ctx.get("duration"),
            Some(&AttrValue::Span(Duration::from_millis(45_000)))
        );
        assert!(matches!(ctx.get("started"), Some(AttrValue::Instant(_))));
    }

    #[test]
    fn test_empty_result_defaults_to_status() {
        let mut summary = summary_with_actions(vec![]);
        summary.result = None;
        summary.building = true;
        let inspection = inspect_run(summary, false, false, false);
        assert_eq!(
            inspection.context.get("result"),
            Some(&AttrValue::Str("running".into()))
        );
    }

    #[test]
    fn test_parameters_enter_context_and_map() {
        let actions = vec![json!({
            "parameters": [
                {"name": "CHART", "value": "nova"},
                {"name": "REPLICAS", "value": 3},
                {"name": "CHART", "value": "shadowed"},
            ]
        })];
        let inspection = inspect_run(summary_with_actions(actions), true, false, false);

        assert_eq!(
            inspection.context.get("param.CHART"),
            Some(&AttrValue::Str("nova".into()))
        );
        assert_eq!(inspection.parameters.get("CHART").unwrap(), "nova");
        assert_eq!(inspection.parameters.get("REPLICAS").unwrap(), "3");

        // Context and map agree for every extracted parameter.
        for (name, value) in &inspection.parameters {
            assert_eq!(
                inspection.context.get(&format!("param.{name}")),
                Some(&AttrValue::Str(value.clone()))
            );
        }
    }

    #[test]
    fn test_cause_extraction_and_classification() {
        let actions = vec![json!({
            "causes": [
                {"_class": "hudson.model.Cause$UserIdCause", "userId": "amy", "userName": "Amy"},
                {"_class": "hudson.triggers.SCMTrigger$SCMTriggerCause", "shortDescription": "Started by an SCM change"},
            ]
        })];
        let inspection = inspect_run(summary_with_actions(actions), false, true, false);

        assert_eq!(inspection.causes.len(), 2);
        assert_eq!(inspection.causes[0].kind, "user");
        assert_eq!(inspection.causes[1].kind, "scm");
        assert_eq!(
            inspection.context.get("cause.user"),
            Some(&AttrValue::List(vec!["Amy".into()]))
        );
        assert_eq!(
            inspection.context.get("cause.type"),
            Some(&AttrValue::List(vec!["user".into(), "scm".into()]))
        );
    }

    #[test]
    fn test_classify_cause_fallbacks() {
        assert_eq!(classify_cause("", "Started by timer"), "timer");
        assert_eq!(classify_cause("", "Started by upstream project"), "upstream");
        assert_eq!(classify_cause("", "Replayed #12"), "other");
        assert_eq!(
            classify_cause("hudson.model.Cause$UpstreamCause", ""),
            "upstream"
        );
    }

    #[test]
    fn test_artifact_sequences() {
        let mut summary = summary_with_actions(vec![]);
        summary.artifacts = vec![
            ArtifactItem {
                file_name: "report.xml".into(),
                relative_path: "target/report.xml".into(),
                size: 10,
            },
            ArtifactItem {
                file_name: "app.jar".into(),
                relative_path: "target/app.jar".into(),
                size: 20,
            },
        ];
        let inspection = inspect_run(summary, false, false, true);
        assert_eq!(
            inspection.context.get("artifact.name"),
            Some(&AttrValue::List(vec![
                "report.xml".into(),
                "app.jar".into()
            ]))
        );
    }

    #[test]
    fn test_scm_from_last_built_revision() {
        let actions = vec![json!({
            "lastBuiltRevision": {
                "SHA1": "abc123",
                "branch": [{"SHA1": "abc123", "name": "origin/main"}]
            },
            "remoteUrls": ["git@example.com:team/app.git"]
        })];
        let scm = extract_scm_info(&actions, &ChangeSet::default());
        assert_eq!(scm.commit, "abc123");
        assert_eq!(scm.branch, "origin/main");
        assert_eq!(scm.repo, "git@example.com:team/app.git");
    }

    #[test]
    fn test_scm_changeset_fallback() {
        let change_set: ChangeSet = serde_json::from_value(json!({
            "items": [{"commitId": "def456", "authorEmail": "amy@example.com"}]
        }))
        .unwrap();
        let scm = extract_scm_info(&[], &change_set);
        assert_eq!(scm.commit, "def456");
        assert_eq!(scm.author, "amy@example.com");
    }

    #[test]
    fn test_null_and_shapeless_actions_ignored() {
        let actions = vec![
            Value::Null,
            json!({"unrelated": true}),
            json!({"parameters": "not-an-array"}),
        ];
        let inspection = inspect_run(summary_with_actions(actions), true, true, true);
        assert!(inspection.parameters.is_empty());
        assert!(inspection.causes.is_empty());
    }
}
