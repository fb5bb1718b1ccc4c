//! Run discovery, filtering, and shaping.
//!
//! The pipeline asks the server for exactly what the request needs (tree
//! queries keep parameter payloads off the wire unless something
//! references them), over-fetches a little headroom for filtering, then
//! inspects, filters, groups, and paginates locally.

pub mod cursor;
pub mod inspect;
pub mod meta;
pub mod output;
pub mod search;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::filter::{self, EvalOptions, Filter};
use crate::path::{encode_job_path, normalize_job_path};
use crate::types::{RunDetail, RunListResponse, RunSummary};

pub use cursor::{decode_cursor, encode_cursor, CursorPayload};
pub use inspect::{inspect_run, RunInspection};
pub use meta::MetadataCollector;
pub use output::{
    build_run_detail_output, build_run_list_item, collect_rerun_parameters, ParameterInfo,
    RunDetailOutput, RunListItem, RunListMetadata, RunListOutput, SCHEMA_VERSION,
};

/// Extra headroom fetched beyond `limit` so filtered-out runs do not
/// starve a page.
const LIST_HEADROOM: usize = 50;
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Shape of each group in grouped output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregation {
    #[default]
    Count,
    First,
    Last,
}

impl Aggregation {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "count" => Ok(Aggregation::Count),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            _ => Err(Error::UnsupportedAggregation(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
        }
    }
}

struct SelectFieldSpec {
    name: &'static str,
    requires_parameters: bool,
    requires_artifacts: bool,
    requires_causes: bool,
}

const SELECT_FIELDS: [SelectFieldSpec; 13] = [
    field("branch"),
    field("commit"),
    with_causes("causes"),
    field("durationms"),
    field("estimateddurationms"),
    field("number"),
    with_params("parameters"),
    with_artifacts("artifacts"),
    field("queueid"),
    field("result"),
    field("starttime"),
    field("status"),
    field("url"),
];

const fn field(name: &'static str) -> SelectFieldSpec {
    SelectFieldSpec {
        name,
        requires_parameters: false,
        requires_artifacts: false,
        requires_causes: false,
    }
}

const fn with_params(name: &'static str) -> SelectFieldSpec {
    SelectFieldSpec {
        name,
        requires_parameters: true,
        requires_artifacts: false,
        requires_causes: false,
    }
}

const fn with_artifacts(name: &'static str) -> SelectFieldSpec {
    SelectFieldSpec {
        name,
        requires_parameters: false,
        requires_artifacts: true,
        requires_causes: false,
    }
}

const fn with_causes(name: &'static str) -> SelectFieldSpec {
    SelectFieldSpec {
        name,
        requires_parameters: false,
        requires_artifacts: false,
        requires_causes: true,
    }
}

/// Parses a comma-separated `--select` value into a deduplicated,
/// sorted field list.
pub fn parse_select_fields(value: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    for part in value.split(',') {
        let field = part.trim().to_lowercase();
        if field.is_empty() {
            continue;
        }
        if !SELECT_FIELDS.iter().any(|spec| spec.name == field) {
            return Err(Error::UnsupportedSelectField(part.trim().to_string()));
        }
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields.sort();
    Ok(fields)
}

pub fn available_select_fields() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SELECT_FIELDS.iter().map(|spec| spec.name).collect();
    names.sort_unstable();
    names
}

fn selection_requires(fields: &[String], probe: fn(&SelectFieldSpec) -> bool) -> bool {
    fields.iter().any(|field| {
        SELECT_FIELDS
            .iter()
            .any(|spec| spec.name == field && probe(spec))
    })
}

/// Inputs to the run listing pipeline.
#[derive(Debug, Clone, Default)]
pub struct RunListOptions {
    pub limit: usize,
    pub cursor: String,
    pub filters: Vec<Filter>,
    pub since: Option<DateTime<Utc>>,
    pub select_fields: Vec<String>,
    pub group_by: String,
    pub aggregation: Aggregation,
    pub with_meta: bool,
    pub allow_regex: bool,
}

/// What the tree query must include for this request.
#[derive(Debug, Clone, Copy)]
struct FetchNeeds {
    parameters: bool,
    artifacts: bool,
    causes: bool,
}

fn fetch_needs(opts: &RunListOptions) -> FetchNeeds {
    FetchNeeds {
        parameters: filter::requires_parameters(&opts.filters)
            || selection_requires(&opts.select_fields, |s| s.requires_parameters)
            || opts.group_by.starts_with("param.")
            || opts.with_meta,
        artifacts: filter::requires_artifacts(&opts.filters)
            || selection_requires(&opts.select_fields, |s| s.requires_artifacts)
            || opts.group_by.starts_with("artifact."),
        causes: filter::requires_causes(&opts.filters)
            || selection_requires(&opts.select_fields, |s| s.requires_causes)
            || opts.group_by.starts_with("cause."),
    }
}

fn build_run_list_tree(fetch_limit: usize, needs: FetchNeeds) -> String {
    let mut action_fields = vec![
        "lastBuiltRevision[SHA1,branch[name]]".to_string(),
        "buildsByBranchName[*]".to_string(),
        "remoteUrls".to_string(),
    ];
    if needs.parameters {
        action_fields.push("parameters[name,value]".to_string());
    }
    if needs.causes {
        action_fields.push("causes[shortDescription,userId,userName,_class]".to_string());
    }

    let mut fields = vec![
        "number".to_string(),
        "url".to_string(),
        "result".to_string(),
        "building".to_string(),
        "timestamp".to_string(),
        "duration".to_string(),
        "estimatedDuration".to_string(),
        "queueId".to_string(),
        format!("actions[{}]", action_fields.join(",")),
        "changeSet[items[authorEmail,author[fullName],commitId,msg]]".to_string(),
    ];
    if needs.artifacts {
        fields.push("artifacts[fileName,relativePath,size]".to_string());
    }

    format!("builds[{}]{{,{fetch_limit}}}", fields.join(","))
}

/// Fetches and processes a run listing for one job.
pub async fn execute_run_list(
    client: &JenkinsClient,
    job_path: &str,
    opts: &RunListOptions,
) -> Result<RunListOutput> {
    let mut opts = opts.clone();
    if opts.limit == 0 {
        opts.limit = DEFAULT_LIST_LIMIT;
    }

    let needs = fetch_needs(&opts);
    let fetch_limit = opts.limit + LIST_HEADROOM;

    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }
    let path = format!("/{encoded}/api/json");
    let tree = build_run_list_tree(fetch_limit, needs);

    let spec = RequestSpec::get(path.as_str()).query("tree", tree);
    let resp = client.execute(&spec).await?;
    let status = resp.status();
    if status.as_u16() == 404 {
        return Err(Error::NotFound(format!("job {job_path}")));
    }
    if !status.is_success() {
        return Err(Error::RequestFailed {
            context: format!("list runs for {job_path}"),
            status: status.as_u16(),
        });
    }
    let body: RunListResponse = resp.json().await?;

    let (output, _) = process_run_list(job_path, &opts, body.builds)?;
    Ok(output)
}

struct GroupAccumulator {
    value: String,
    count: usize,
    first: Option<RunInspection>,
    first_timestamp: i64,
    last: Option<RunInspection>,
    last_timestamp: i64,
}

impl GroupAccumulator {
    fn new(value: String) -> Self {
        Self {
            value,
            count: 0,
            first: None,
            first_timestamp: 0,
            last: None,
            last_timestamp: 0,
        }
    }

    fn observe(&mut self, inspection: &RunInspection) {
        let timestamp = inspection.summary.timestamp;
        self.count += 1;
        if self.last.is_none() || timestamp > self.last_timestamp {
            self.last = Some(inspection.clone());
            self.last_timestamp = timestamp;
        }
        if self.first.is_none() || timestamp < self.first_timestamp {
            self.first = Some(inspection.clone());
            self.first_timestamp = timestamp;
        }
    }
}

/// Group key resolution: the attribute context first, then the
/// parameters map for `param.<NAME>` keys.
fn resolve_group_value(inspection: &RunInspection, key: &str) -> String {
    if let Some(value) = inspection.context.get(key) {
        return value.display();
    }
    if let Some(name) = key.strip_prefix("param.") {
        if let Some(value) = inspection.parameters.get(name) {
            return value.clone();
        }
    }
    String::new()
}

/// The pure half of the pipeline: sort, cut at the cursor, inspect,
/// filter, group, collect metadata, paginate. Exposed for table tests;
/// [`execute_run_list`] feeds it from the wire.
pub fn process_run_list(
    job_path: &str,
    opts: &RunListOptions,
    builds: Vec<RunSummary>,
) -> Result<(RunListOutput, Vec<RunInspection>)> {
    let normalized = normalize_job_path(job_path);
    let needs = fetch_needs(opts);

    let mut sorted = builds;
    sorted.sort_by(|a, b| b.number.cmp(&a.number));

    let mut cutoff = 0i64;
    if !opts.cursor.trim().is_empty() {
        let payload = decode_cursor(opts.cursor.trim())?;
        if !payload.job_path.is_empty() && payload.job_path != normalized {
            return Err(Error::CursorMismatch {
                cursor: payload.job_path,
                job: normalized,
            });
        }
        cutoff = payload.number;
    }

    let since_ms = opts.since.map(|t| t.timestamp_millis()).unwrap_or(0);
    let eval_opts = EvalOptions {
        allow_regex: opts.allow_regex,
    };

    let mut collector = MetadataCollector::new(opts.with_meta);
    let mut groups: HashMap<String, GroupAccumulator> = HashMap::new();
    let mut matched: Vec<RunInspection> = Vec::with_capacity(opts.limit.min(sorted.len()));
    let mut more_matches = false;

    for summary in sorted {
        if cutoff > 0 && summary.number >= cutoff {
            continue;
        }
        // Runs arrive newest-first; once one is older than the bound,
        // the rest are too.
        if since_ms > 0 && summary.timestamp < since_ms {
            break;
        }

        let inspection = inspect_run(summary, needs.parameters, needs.causes, needs.artifacts);

        if !opts.filters.is_empty()
            && !filter::evaluate(&inspection.context, &opts.filters, eval_opts)
        {
            continue;
        }

        collector.observe(&inspection);

        if !opts.group_by.is_empty() {
            let value = resolve_group_value(&inspection, &opts.group_by);
            groups
                .entry(value.clone())
                .or_insert_with(|| GroupAccumulator::new(value))
                .observe(&inspection);
        }

        if matched.len() < opts.limit {
            matched.push(inspection);
        } else {
            more_matches = true;
        }
    }

    let next_cursor = if more_matches && !matched.is_empty() {
        encode_cursor(
            &normalized,
            matched.last().map(|i| i.summary.number).unwrap_or(0),
        )
    } else {
        String::new()
    };

    let items: Vec<RunListItem> = matched
        .iter()
        .map(|inspection| build_run_list_item(&normalized, inspection, &opts.select_fields))
        .collect();

    let group_output = assemble_groups(&normalized, opts, groups);

    let metadata = opts.with_meta.then(|| RunListMetadata {
        filters: output::FilterMetadata {
            available: filter::allowed_keys(),
            operators: filter::operators(),
        },
        parameters: collector.parameters(),
        fields: available_select_fields(),
        selection: opts.select_fields.clone(),
        group_by: opts.group_by.clone(),
        aggregation: if opts.group_by.is_empty() {
            String::new()
        } else {
            opts.aggregation.as_str().to_string()
        },
        since: opts
            .since
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default(),
        suggestions: build_suggestions(&normalized, opts),
    });

    let output = RunListOutput {
        schema_version: SCHEMA_VERSION.to_string(),
        items,
        groups: group_output,
        next_cursor,
        metadata,
    };
    Ok((output, matched))
}

/// Groups sort by count descending, then value ascending
/// (case-insensitive).
fn assemble_groups(
    job_path: &str,
    opts: &RunListOptions,
    groups: HashMap<String, GroupAccumulator>,
) -> Vec<output::RunGroupOutput> {
    if opts.group_by.is_empty() {
        return Vec::new();
    }

    let mut accumulators: Vec<GroupAccumulator> = groups.into_values().collect();
    accumulators.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.value.to_lowercase().cmp(&b.value.to_lowercase()))
    });

    accumulators
        .into_iter()
        .map(|acc| {
            let first = matches!(opts.aggregation, Aggregation::First)
                .then(|| {
                    acc.first
                        .as_ref()
                        .map(|i| build_run_list_item(job_path, i, &opts.select_fields))
                })
                .flatten();
            let last = matches!(opts.aggregation, Aggregation::Count | Aggregation::Last)
                .then(|| {
                    acc.last
                        .as_ref()
                        .map(|i| build_run_list_item(job_path, i, &opts.select_fields))
                })
                .flatten();
            output::RunGroupOutput {
                key: opts.group_by.clone(),
                value: acc.value,
                count: acc.count,
                first,
                last,
            }
        })
        .collect()
}

fn build_suggestions(job_path: &str, opts: &RunListOptions) -> Vec<String> {
    let mut suggestions = Vec::with_capacity(3);
    if opts.filters.is_empty() {
        suggestions.push(format!(
            "jk run ls {job_path} --filter result=SUCCESS --limit 5"
        ));
    }
    if opts.group_by.is_empty() {
        suggestions.push(format!("jk run ls {job_path} --group-by result --agg last"));
    }
    if !selection_requires(&opts.select_fields, |s| s.requires_parameters) {
        suggestions.push(format!("jk run ls {job_path} --filter param.NAME~=value"));
    }
    suggestions.truncate(3);
    suggestions
}

/// Fetches the detail payload for one run; 404 maps to [`Error::NotFound`].
pub async fn fetch_run_detail(
    client: &JenkinsClient,
    job_path: &str,
    number: i64,
) -> Result<RunDetail> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }
    let path = format!("/{encoded}/{number}/api/json");
    let resp = client.execute(&RequestSpec::get(path.as_str())).await?;
    let status = resp.status();
    if status.as_u16() == 404 {
        return Err(Error::NotFound(format!("run {job_path} #{number}")));
    }
    if !status.is_success() {
        return Err(Error::RequestFailed {
            context: format!("fetch run {job_path} #{number}"),
            status: status.as_u16(),
        });
    }
    Ok(resp.json().await?)
}

/// How to stop a running build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    Stop,
    Term,
    Kill,
}

impl CancelMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "stop" => Ok(CancelMode::Stop),
            "term" | "terminate" => Ok(CancelMode::Term),
            "kill" => Ok(CancelMode::Kill),
            _ => Err(Error::InvalidInput(format!(
                "unsupported cancel mode {value:?}"
            ))),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            CancelMode::Stop => "stop",
            CancelMode::Term => "term",
            CancelMode::Kill => "kill",
        }
    }
}

/// Requests cancellation of a running build.
pub async fn cancel_run(
    client: &JenkinsClient,
    job_path: &str,
    number: i64,
    mode: CancelMode,
) -> Result<()> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }
    let path = format!("/{encoded}/{number}/{}", mode.action());
    let resp = client.execute(&RequestSpec::post(path.as_str())).await?;
    let status = resp.status();
    if status.as_u16() >= 300 {
        return Err(Error::CancelFailed(format!(
            "server returned HTTP {}",
            status.as_u16()
        )));
    }
    Ok(())
}
