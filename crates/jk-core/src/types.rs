//! API response types for the Jenkins JSON surfaces.
//!
//! `actions` stays schema-less (`serde_json::Value`): its shape depends on
//! installed plugins, and the extraction helpers in [`crate::run`] pull
//! parameters, causes, and SCM info out of the raw maps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunListResponse {
    #[serde(default)]
    pub builds: Vec<RunSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSummary {
    pub number: i64,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default, rename = "estimatedDuration")]
    pub estimated_duration: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "queueId")]
    pub queue_id: i64,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default, rename = "changeSet")]
    pub change_set: ChangeSet,
    #[serde(default)]
    pub artifacts: Vec<ArtifactItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunDetail {
    pub number: i64,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default, rename = "estimatedDuration")]
    pub estimated_duration: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub stages: Vec<Value>,
    #[serde(default, rename = "changeSet")]
    pub change_set: ChangeSet,
    #[serde(default)]
    pub artifacts: Vec<ArtifactItem>,
    #[serde(default, rename = "queueId")]
    pub queue_id: i64,
    #[serde(default, rename = "builtOn")]
    pub built_on: Option<String>,
    #[serde(default)]
    pub executor: Option<ExecutorRef>,
    #[serde(default, rename = "fullDisplayName")]
    pub full_display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorRef {
    #[serde(default)]
    pub number: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactItem {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "relativePath")]
    pub relative_path: String,
    #[serde(default)]
    pub size: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub items: Vec<ChangeSetItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeSetItem {
    #[serde(default, rename = "authorEmail")]
    pub author_email: String,
    #[serde(default, rename = "commitId")]
    pub commit_id: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub author: ChangeSetAuthor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeSetAuthor {
    #[serde(default, rename = "fullName")]
    pub full_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueItemStatus {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub why: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default, rename = "inQueueSince")]
    pub in_queue_since: i64,
    #[serde(default)]
    pub executable: Option<QueueExecutable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueExecutable {
    #[serde(default)]
    pub number: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueListResponse {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueItem {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub why: Option<String>,
    #[serde(default, rename = "inQueueSince")]
    pub in_queue_since: i64,
    #[serde(default)]
    pub task: QueueTaskRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueTaskRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// A child entry from a folder's `jobs[name,_class]` tree query.
#[derive(Debug, Clone, Deserialize)]
pub struct JobNode {
    pub name: String,
    #[serde(default, rename = "_class")]
    pub class_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListResponse {
    #[serde(default)]
    pub jobs: Vec<JobNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComputerListResponse {
    #[serde(default, rename = "computer")]
    pub computers: Vec<Computer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Computer {
    #[serde(default, rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(default, rename = "temporarilyOffline")]
    pub temporarily_offline: bool,
    #[serde(default, rename = "offlineCauseReason")]
    pub offline_cause_reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginListResponse {
    #[serde(default)]
    pub plugins: Vec<InstalledPlugin>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstalledPlugin {
    #[serde(default, rename = "shortName")]
    pub short_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(default, rename = "totalCount")]
    pub total_count: i64,
    #[serde(default, rename = "failCount")]
    pub fail_count: i64,
    #[serde(default, rename = "skipCount")]
    pub skip_count: i64,
    #[serde(default)]
    pub suites: Vec<TestSuite>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSuite {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, rename = "className")]
    pub class_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CrumbResponse {
    #[serde(default)]
    pub crumb: String,
    #[serde(default, rename = "crumbRequestField")]
    pub crumb_request_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_tolerates_sparse_payloads() {
        let summary: RunSummary = serde_json::from_str(r#"{"number": 7}"#).unwrap();
        assert_eq!(summary.number, 7);
        assert!(summary.result.is_none());
        assert!(!summary.building);
        assert!(summary.actions.is_empty());
        assert!(summary.change_set.items.is_empty());
    }

    #[test]
    fn test_run_summary_accepts_null_actions_entries() {
        let summary: RunSummary = serde_json::from_str(
            r#"{"number": 1, "actions": [null, {}, {"parameters": []}]}"#,
        )
        .unwrap();
        assert_eq!(summary.actions.len(), 3);
    }

    #[test]
    fn test_queue_item_with_executable() {
        let status: QueueItemStatus = serde_json::from_str(
            r#"{"id": 42, "executable": {"number": 128}, "cancelled": false}"#,
        )
        .unwrap();
        assert_eq!(status.executable.unwrap().number, 128);
    }
}
