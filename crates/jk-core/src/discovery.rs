//! Recursive job discovery with glob matching.
//!
//! Walks folders depth-limited, classifying children by their `_class`
//! string: multibranch projects, plain folders, and leaf jobs. A glob
//! that matches a multibranch container selects all of its branches;
//! an unmatched multibranch is still descended so individual branches
//! can match.

use std::collections::HashSet;

use globset::GlobBuilder;
use tokio_util::sync::CancellationToken;

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::path::{encode_job_path, join_job_path, normalize_job_path};
use crate::types::JobListResponse;

pub const MAX_DISCOVERY_DEPTH: usize = 5;

const CHILDREN_TREE: &str = "jobs[name,_class]";

/// A compiled job glob. `*` stays within one path component; `**` spans
/// components. An empty glob matches everything.
#[derive(Debug, Clone)]
pub struct JobGlob {
    raw: String,
    matcher: Option<globset::GlobMatcher>,
}

impl JobGlob {
    pub fn new(glob: &str) -> Result<Self> {
        let raw = glob.trim().to_string();
        if raw.is_empty() {
            return Ok(Self { raw, matcher: None });
        }
        let matcher = GlobBuilder::new(&raw)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("invalid job glob {glob:?}: {e}")))?
            .compile_matcher();
        Ok(Self {
            raw,
            matcher: Some(matcher),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_none()
    }

    /// Tries, in order: the full path, the base name, each intermediate
    /// component, and the folder-relative remainder.
    pub fn matches(&self, folder: &str, job_path: &str) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };

        if matcher.is_match(job_path) {
            return true;
        }

        let base = job_path.rsplit('/').next().unwrap_or(job_path);
        if matcher.is_match(base) {
            return true;
        }

        let parts: Vec<&str> = job_path.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if matcher.is_match(part) {
                return true;
            }
        }

        if !folder.is_empty() {
            if let Some(rel) = job_path.strip_prefix(&format!("{folder}/")) {
                if matcher.is_match(rel) {
                    return true;
                }
            }
        }

        false
    }
}

fn is_multibranch_class(class_name: &str) -> bool {
    class_name.to_lowercase().contains("multibranch")
}

fn is_folder_class(class_name: &str) -> bool {
    let lower = class_name.to_lowercase();
    lower.contains("folder") && !lower.contains("multibranch")
}

/// Enumerates job paths under `folder_path` that match `glob`, walking at
/// most `max_depth` levels. Output is sorted and deduplicated.
pub async fn discover_jobs(
    client: &JenkinsClient,
    cancel: &CancellationToken,
    folder_path: &str,
    glob: &JobGlob,
    max_depth: usize,
) -> Result<Vec<String>> {
    let folder = normalize_job_path(folder_path);
    let mut visited: HashSet<String> = HashSet::new();
    let mut results: Vec<String> = Vec::new();
    let mut pending: Vec<(String, usize)> = vec![(folder.clone(), 0)];

    while let Some((current, depth)) = pending.pop() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if depth > max_depth {
            continue;
        }

        let path = if current.is_empty() {
            "/api/json".to_string()
        } else {
            format!("/{}/api/json", encode_job_path(&current))
        };
        let spec = RequestSpec::get(path.as_str()).query("tree", CHILDREN_TREE);
        let resp = client.execute(&spec).await?;
        let status = resp.status().as_u16();

        // A 404 below the root means the node has no children API: a
        // leaf reached through a folder listing race.
        if status == 404 && !current.is_empty() {
            if glob.matches(&folder, &current) && visited.insert(current.clone()) {
                results.push(current);
            }
            continue;
        }
        if status >= 400 {
            return Err(Error::RequestFailed {
                context: format!("list jobs for {current:?}"),
                status,
            });
        }

        let payload: JobListResponse = resp.json().await?;
        for job in payload.jobs {
            let child = join_job_path(&current, &job.name);
            let matches = glob.matches(&folder, &child);

            if is_multibranch_class(&job.class_name) {
                if matches {
                    // The user matched the container; all branches are
                    // wanted, unfiltered.
                    collect_branches(client, &child, &mut results, &mut visited).await?;
                } else {
                    pending.push((child, depth + 1));
                }
                continue;
            }

            if is_folder_class(&job.class_name) {
                pending.push((child, depth + 1));
                continue;
            }

            if matches && visited.insert(child.clone()) {
                results.push(child);
            }
        }
    }

    results.sort();
    Ok(results)
}

async fn collect_branches(
    client: &JenkinsClient,
    multibranch_path: &str,
    results: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> Result<()> {
    let path = format!("/{}/api/json", encode_job_path(multibranch_path));
    let spec = RequestSpec::get(path.as_str()).query("tree", CHILDREN_TREE);
    let resp = client.execute(&spec).await?;
    let status = resp.status().as_u16();
    if status >= 400 {
        return Err(Error::RequestFailed {
            context: format!("list branches for {multibranch_path:?}"),
            status,
        });
    }

    let payload: JobListResponse = resp.json().await?;
    for branch in payload.jobs {
        if is_folder_class(&branch.class_name) || is_multibranch_class(&branch.class_name) {
            continue;
        }
        let branch_path = join_job_path(multibranch_path, &branch.name);
        if visited.insert(branch_path.clone()) {
            results.push(branch_path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_class_detection() {
        assert!(is_multibranch_class(
            "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject"
        ));
        assert!(!is_folder_class(
            "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject"
        ));
        assert!(is_folder_class("com.cloudbees.hudson.plugins.folder.Folder"));
        assert!(!is_folder_class(
            "org.jenkinsci.plugins.workflow.job.WorkflowJob"
        ));
    }

    #[test]
    fn test_glob_strategies() {
        let glob = JobGlob::new("*ada*").unwrap();
        // Base name.
        assert!(glob.matches("", "Tools/ada"));
        // Intermediate component.
        assert!(glob.matches("", "Tools/ada/master"));
        // No hit anywhere.
        assert!(!glob.matches("", "Tools/terraform/prod"));

        // Folder-relative remainder.
        let rel = JobGlob::new("deploy-*").unwrap();
        assert!(rel.matches("team", "team/deploy-app"));
        assert!(!rel.matches("team", "other/deploy-app"));

        // Double star crosses separators, single star does not.
        let deep = JobGlob::new("team/**/main").unwrap();
        assert!(deep.matches("", "team/app/main"));
        assert!(deep.matches("", "team/a/b/main"));
        let shallow = JobGlob::new("team/*").unwrap();
        assert!(shallow.matches("", "team/app"));
    }

    #[test]
    fn test_empty_glob_matches_everything() {
        let glob = JobGlob::new("  ").unwrap();
        assert!(glob.is_empty());
        assert!(glob.matches("", "anything/at/all"));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        assert!(matches!(
            JobGlob::new("a[unterminated"),
            Err(Error::InvalidInput(_))
        ));
    }

    fn jobs_body(entries: &[(&str, &str)]) -> serde_json::Value {
        let jobs: Vec<serde_json::Value> = entries
            .iter()
            .map(|(name, class)| serde_json::json!({"name": name, "_class": class}))
            .collect();
        serde_json::json!({ "jobs": jobs })
    }

    const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";
    const MULTIBRANCH_CLASS: &str =
        "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject";
    const JOB_CLASS: &str = "org.jenkinsci.plugins.workflow.job.WorkflowJob";

    #[tokio::test]
    async fn test_matched_multibranch_emits_all_branches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(&[("Tools", FOLDER_CLASS)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/Tools/api/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(&[("ada", MULTIBRANCH_CLASS)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/Tools/job/ada/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jobs_body(&[
                ("master", JOB_CLASS),
                ("PR-22", JOB_CLASS),
                ("nested", FOLDER_CLASS),
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let glob = JobGlob::new("*ada*").unwrap();
        let jobs = discover_jobs(
            &client,
            &CancellationToken::new(),
            "",
            &glob,
            MAX_DISCOVERY_DEPTH,
        )
        .await
        .unwrap();

        assert_eq!(jobs, vec!["Tools/ada/PR-22", "Tools/ada/master"]);
    }

    #[tokio::test]
    async fn test_unmatched_multibranch_recursed_for_branch_matches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(&[("ada", MULTIBRANCH_CLASS)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/ada/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jobs_body(&[
                ("master", JOB_CLASS),
                ("PR-7", JOB_CLASS),
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let glob = JobGlob::new("*master*").unwrap();
        let jobs = discover_jobs(
            &client,
            &CancellationToken::new(),
            "",
            &glob,
            MAX_DISCOVERY_DEPTH,
        )
        .await
        .unwrap();

        assert_eq!(jobs, vec!["ada/master"]);
    }

    #[tokio::test]
    async fn test_leaf_404_emitted_when_matching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/solo/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let glob = JobGlob::new("solo").unwrap();
        let jobs = discover_jobs(
            &client,
            &CancellationToken::new(),
            "solo",
            &glob,
            MAX_DISCOVERY_DEPTH,
        )
        .await
        .unwrap();

        assert_eq!(jobs, vec!["solo"]);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_walk() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let glob = JobGlob::new("").unwrap();
        let err = discover_jobs(&client, &cancel, "", &glob, MAX_DISCOVERY_DEPTH)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
