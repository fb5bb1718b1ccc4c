//! Multi-job run search.
//!
//! Feeds each discovered job through the listing pipeline, merges the
//! matches, orders them newest-first, and trims to the requested limit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{execute_run_list, RunListItem, RunListOptions};
use crate::client::JenkinsClient;
use crate::error::{Error, Result};
use crate::filter::Filter;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_SEARCH_MAX_SCAN: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct RunSearchOptions {
    pub filters: Vec<Filter>,
    pub raw_filters: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
    pub max_scan: usize,
    pub select_fields: Vec<String>,
    pub allow_regex: bool,
    pub folder: String,
    pub job_glob: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSearchOutput {
    pub schema_version: String,
    pub items: Vec<RunSearchItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunSearchMetadata>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSearchItem {
    pub job_path: String,
    #[serde(flatten)]
    pub run: RunListItem,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSearchMetadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub folder: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub job_glob: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub since: String,
    pub jobs_scanned: usize,
    pub max_scan: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<String>,
}

pub fn search_metadata(opts: &RunSearchOptions, jobs_scanned: usize) -> RunSearchMetadata {
    RunSearchMetadata {
        folder: opts.folder.clone(),
        job_glob: opts.job_glob.clone(),
        query: opts.query.clone(),
        filters: opts.raw_filters.clone(),
        since: opts
            .since
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default(),
        jobs_scanned,
        max_scan: opts.max_scan,
        selection: opts.select_fields.clone(),
    }
}

/// Runs the listing pipeline over each job path and merges the results.
/// Cancellation aborts between jobs; partial results are not returned.
pub async fn execute_run_search(
    client: &JenkinsClient,
    cancel: &CancellationToken,
    job_paths: &[String],
    opts: &RunSearchOptions,
) -> Result<RunSearchOutput> {
    let limit = if opts.limit == 0 {
        DEFAULT_SEARCH_LIMIT
    } else {
        opts.limit
    };
    let max_scan = if opts.max_scan == 0 {
        DEFAULT_SEARCH_MAX_SCAN
    } else {
        opts.max_scan
    };

    let mut items = Vec::new();
    for job_path in job_paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let list_opts = RunListOptions {
            limit: max_scan,
            filters: opts.filters.clone(),
            since: opts.since,
            select_fields: opts.select_fields.clone(),
            allow_regex: opts.allow_regex,
            ..RunListOptions::default()
        };

        let output = execute_run_list(client, job_path, &list_opts).await?;
        items.extend(output.items.into_iter().map(|run| RunSearchItem {
            job_path: job_path.clone(),
            run,
        }));
    }

    sort_search_items(&mut items);
    items.truncate(limit);

    Ok(RunSearchOutput {
        schema_version: super::SCHEMA_VERSION.to_string(),
        items,
        metadata: Some(search_metadata(
            &RunSearchOptions {
                max_scan,
                ..opts.clone()
            },
            job_paths.len(),
        )),
    })
}

/// Newest first; ties order by job path, then by build number descending.
fn sort_search_items(items: &mut [RunSearchItem]) {
    items.sort_by(|a, b| {
        let ta = parse_time(&a.run.start_time);
        let tb = parse_time(&b.run.start_time);
        tb.cmp(&ta)
            .then_with(|| a.job_path.cmp(&b.job_path))
            .then_with(|| b.run.number.cmp(&a.run.number))
    });
}

fn parse_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::inspect::inspect_run;
    use crate::run::output::build_run_list_item;
    use crate::types::RunSummary;

    fn item(job_path: &str, number: i64, timestamp: i64) -> RunSearchItem {
        let summary = RunSummary {
            number,
            timestamp,
            result: Some("SUCCESS".to_string()),
            ..RunSummary::default()
        };
        let inspection = inspect_run(summary, false, false, false);
        RunSearchItem {
            job_path: job_path.to_string(),
            run: build_run_list_item(job_path, &inspection, &[]),
        }
    }

    #[test]
    fn test_sort_newest_first_then_path_then_number() {
        let t0 = 1_700_000_000_000i64;
        let mut items = vec![
            item("b/job", 1, t0),
            item("a/job", 9, t0 + 60_000),
            item("a/job", 8, t0),
            item("a/job", 12, t0),
        ];
        sort_search_items(&mut items);

        assert_eq!(items[0].run.number, 9);
        assert_eq!(items[1].job_path, "a/job");
        assert_eq!(items[1].run.number, 12);
        assert_eq!(items[2].run.number, 8);
        assert_eq!(items[3].job_path, "b/job");
    }

    #[test]
    fn test_search_item_serializes_flat() {
        let entry = item("team/app", 7, 1_700_000_000_000);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["jobPath"], "team/app");
        assert_eq!(value["number"], 7);
        assert_eq!(value["id"], "team/app/7");
    }

    #[tokio::test]
    async fn test_search_cancellation_aborts_between_jobs() {
        let server = wiremock::MockServer::start().await;
        let client = crate::client::tests::test_client(&server).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = execute_run_search(
            &client,
            &cancel,
            &["team/app".to_string()],
            &RunSearchOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
