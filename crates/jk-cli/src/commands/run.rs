//! `jk run`: trigger, list, search, inspect, cancel, and rerun job runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Args, Subcommand};
use jk_core::discovery::{discover_jobs, JobGlob, MAX_DISCOVERY_DEPTH};
use jk_core::run::search::{execute_run_search, RunSearchOptions, RunSearchOutput};
use jk_core::run::{
    self, cancel_run, execute_run_list, fetch_run_detail, Aggregation, CancelMode, RunListOptions,
};
use jk_core::trigger::{
    exit_code_for_result, monitor_run, trigger_run, wait_for_build_number, DEFAULT_QUEUE_TIMEOUT,
};
use jk_core::{filter, fuzzy, testreport, JenkinsClient};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::output::{duration_string, print_output};

#[derive(Debug, Subcommand)]
pub enum RunCmd {
    /// Trigger a job run
    Start(StartArgs),
    /// List recent runs
    #[command(
        name = "ls",
        after_help = "Examples:\n  \
            jk run ls Helm.Chart.Deploy\n  \
            jk run ls Helm.Chart.Deploy --filter param.CHART_NAME~nova --filter result=SUCCESS --since 7d\n  \
            jk run ls Helm.Chart.Deploy --group-by param.CHART_NAME --agg last --json\n  \
            jk run ls Helm.Chart.Deploy --select parameters --limit 5 --json --with-meta"
    )]
    Ls(LsArgs),
    /// Search runs across jobs
    Search(SearchArgs),
    /// Discover job parameter definitions
    Params(ParamsArgs),
    /// View run details
    View {
        job_path: String,
        build_number: i64,
    },
    /// Cancel a running job
    Cancel {
        job_path: String,
        build_number: i64,
        /// Termination mode: stop, term, or kill
        #[arg(long, default_value = "stop")]
        mode: String,
    },
    /// Rerun a job using the previous parameters
    Rerun(RerunArgs),
}

#[derive(Debug, Args)]
pub struct StartArgs {
    pub job_path: String,
    /// Build parameter key=value (repeatable)
    #[arg(short = 'p', long = "param")]
    pub param: Vec<String>,
    /// Follow the run progress until completion
    #[arg(long)]
    pub follow: bool,
    /// Polling interval when following runs
    #[arg(long, default_value = "500ms")]
    pub interval: String,
}

#[derive(Debug, Args)]
pub struct LsArgs {
    pub job_path: String,
    /// Number of runs to list
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Cursor for pagination (use value from previous output)
    #[arg(long, default_value = "")]
    pub cursor: String,
    /// Filter runs (repeatable): key[op]value
    #[arg(long = "filter")]
    pub filters: Vec<String>,
    /// Filter runs since timestamp or duration (RFC3339, 72h, 7d)
    #[arg(long, default_value = "")]
    pub since: String,
    /// Select additional fields (comma-separated)
    #[arg(long, default_value = "")]
    pub select: String,
    /// Group results by field (e.g. param.CHART_NAME)
    #[arg(long, default_value = "")]
    pub group_by: String,
    /// Aggregation for grouped results: count, first, last
    #[arg(long = "agg", default_value = "count")]
    pub aggregation: String,
    /// Include metadata in structured output
    #[arg(long)]
    pub with_meta: bool,
    /// Enable regular expression matching for filters
    #[arg(long)]
    pub regex: bool,
}

#[derive(Debug, Args)]
#[command(after_help = "Examples:\n  \
    jk search --job-glob \"*ada*\" --limit 5\n  \
    jk run search --folder releases --filter param.CHART_NAME~nova --limit 5 --json\n  \
    jk run search --job-glob \"*/deploy-*\" --filter result=FAILURE --select parameters --since 30d")]
pub struct SearchArgs {
    /// Folder path to search in
    #[arg(long, default_value = "")]
    pub folder: String,
    /// Job glob pattern (e.g. "*/deploy-*")
    #[arg(long, default_value = "")]
    pub job_glob: String,
    /// Free-text query to rank matching job paths
    #[arg(long, default_value = "")]
    pub query: String,
    /// Filter runs (repeatable): key[op]value
    #[arg(long = "filter")]
    pub filters: Vec<String>,
    /// Only search runs since timestamp or duration (RFC3339, 72h, 7d)
    #[arg(long, default_value = "")]
    pub since: String,
    /// Max results to return
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
    /// Max builds to scan per job
    #[arg(long, default_value_t = 500)]
    pub max_scan: usize,
    /// Select additional fields (comma-separated)
    #[arg(long, default_value = "")]
    pub select: String,
    /// Enable regular expression matching for filters
    #[arg(long)]
    pub regex: bool,
}

#[derive(Debug, Args)]
pub struct ParamsArgs {
    pub job_path: String,
    /// Parameter source: auto, config, or runs
    #[arg(long, default_value = "auto")]
    pub source: String,
    /// Number of recent runs to scan when inferring parameters
    #[arg(long, default_value_t = 50)]
    pub limit_runs: usize,
}

#[derive(Debug, Args)]
pub struct RerunArgs {
    pub job_path: String,
    pub build_number: i64,
    /// Follow the rerun progress until completion
    #[arg(long)]
    pub follow: bool,
    /// Polling interval when following runs
    #[arg(long, default_value = "500ms")]
    pub interval: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerOutput {
    job_path: String,
    message: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    queue_location: String,
}

pub async fn run(app: App, cmd: RunCmd, cancel: CancellationToken) -> anyhow::Result<i32> {
    match cmd {
        RunCmd::Start(args) => start(app, args, cancel).await,
        RunCmd::Ls(args) => list(app, args).await,
        RunCmd::Search(args) => run_search(app, args, cancel).await,
        RunCmd::Params(args) => params(app, args).await,
        RunCmd::View {
            job_path,
            build_number,
        } => view(app, &job_path, build_number).await,
        RunCmd::Cancel {
            job_path,
            build_number,
            mode,
        } => cancel_cmd(app, &job_path, build_number, &mode).await,
        RunCmd::Rerun(args) => rerun(app, args, cancel).await,
    }
}

fn parse_param_assignments(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            anyhow::bail!("invalid parameter {entry:?} (expected key=value)");
        };
        params.push((key.trim().to_string(), value.to_string()));
    }
    Ok(params)
}

fn parse_interval(raw: &str) -> anyhow::Result<Duration> {
    Ok(filter::parse_duration(raw)?)
}

async fn start(app: App, args: StartArgs, cancel: CancellationToken) -> anyhow::Result<i32> {
    let params = parse_param_assignments(&args.param)?;
    let interval = parse_interval(&args.interval)?;
    let client = app.client().await?;

    let location = trigger_run(&client, &args.job_path, &params).await?;

    if !app.format.is_structured() {
        println!("Triggered run for {}", args.job_path);
    }

    if !args.follow {
        let payload = TriggerOutput {
            job_path: args.job_path.clone(),
            message: "run requested",
            queue_location: location,
        };
        print_output(app.format, &payload, || Ok(()))?;
        return Ok(0);
    }

    follow_triggered(&app, &client, &cancel, &args.job_path, &location, interval).await
}

async fn follow_triggered(
    app: &App,
    client: &Arc<JenkinsClient>,
    cancel: &CancellationToken,
    job_path: &str,
    queue_location: &str,
    interval: Duration,
) -> anyhow::Result<i32> {
    let number =
        wait_for_build_number(client, cancel, queue_location, DEFAULT_QUEUE_TIMEOUT).await?;

    let stream_logs = !app.format.is_structured();
    let sink = stream_logs.then(|| Arc::new(Mutex::new(std::io::stdout())));

    let result = monitor_run(client, cancel, job_path, number, interval, sink).await?;

    if app.format.is_structured() {
        let detail = fetch_run_detail(client, job_path, number).await?;
        let report = match testreport::fetch_test_report(client, job_path, number).await {
            Ok(report) => report,
            Err(err) => {
                tracing::debug!(error = %err, "fetch test report failed");
                None
            }
        };
        let output = run::build_run_detail_output(job_path, &detail, report.as_ref());
        print_output(app.format, &output, || Ok(()))?;
    }

    Ok(exit_code_for_result(&result))
}

async fn list(app: App, args: LsArgs) -> anyhow::Result<i32> {
    let opts = build_list_options(&args)?;
    let client = app.client().await?;
    let output = execute_run_list(&client, &args.job_path, &opts).await?;

    print_output(app.format, &output, || {
        render_run_list_human(&output, &opts);
        Ok(())
    })?;
    Ok(0)
}

fn build_list_options(args: &LsArgs) -> anyhow::Result<RunListOptions> {
    let filters = filter::parse(&args.filters)?;
    let since = if args.since.trim().is_empty() {
        None
    } else {
        Some(filter::parse_since(&args.since)?)
    };
    let select_fields = run::parse_select_fields(&args.select)?;
    let aggregation = Aggregation::parse(&args.aggregation)?;
    if args.group_by.is_empty() && aggregation != Aggregation::Count {
        anyhow::bail!("aggregation flag requires --group-by");
    }

    Ok(RunListOptions {
        limit: args.limit,
        cursor: args.cursor.clone(),
        filters,
        since,
        select_fields,
        group_by: args.group_by.clone(),
        aggregation,
        with_meta: args.with_meta,
        allow_regex: args.regex,
    })
}

fn render_run_list_human(output: &run::RunListOutput, opts: &RunListOptions) {
    if output.items.is_empty() && output.groups.is_empty() {
        println!("No runs found");
        return;
    }

    if !opts.group_by.is_empty() && !output.groups.is_empty() {
        println!(
            "Grouped by {} (agg={})",
            opts.group_by,
            opts.aggregation.as_str()
        );
        for group in &output.groups {
            let label = if group.value.trim().is_empty() {
                "(none)"
            } else {
                group.value.as_str()
            };
            let shown = match opts.aggregation {
                Aggregation::First => group.first.as_ref(),
                _ => group.last.as_ref(),
            };
            match (opts.aggregation, shown) {
                (Aggregation::Count, Some(item)) => println!(
                    "{label}\t{}\t#{}\t{}\t{}",
                    group.count, item.number, item.result, item.start_time
                ),
                (Aggregation::Count, None) => println!("{label}\t{}", group.count),
                (_, Some(item)) => println!(
                    "{label}\t#{}\t{}\t{}",
                    item.number, item.result, item.start_time
                ),
                (_, None) => println!("{label}\t(no data)"),
            }
        }
    } else {
        for item in &output.items {
            println!(
                "#{}\t{}\t{}\t{}",
                item.number,
                if item.result.is_empty() {
                    item.status.to_uppercase()
                } else {
                    item.result.clone()
                },
                item.start_time,
                duration_string(item.duration_ms)
            );
        }
    }

    if !output.next_cursor.is_empty() {
        println!("Next cursor: {}", output.next_cursor);
    }
}

pub async fn run_search(
    app: App,
    args: SearchArgs,
    cancel: CancellationToken,
) -> anyhow::Result<i32> {
    let filters = filter::parse(&args.filters)?;
    let since = if args.since.trim().is_empty() {
        None
    } else {
        Some(filter::parse_since(&args.since)?)
    };
    let select_fields = run::parse_select_fields(&args.select)?;
    let glob = JobGlob::new(&args.job_glob)?;

    let opts = RunSearchOptions {
        filters,
        raw_filters: args.filters.clone(),
        since,
        limit: args.limit,
        max_scan: args.max_scan,
        select_fields,
        allow_regex: args.regex,
        folder: jk_core::path::normalize_job_path(&args.folder),
        job_glob: args.job_glob.clone(),
        query: args.query.trim().to_string(),
    };

    let client = app.client().await?;
    let mut job_paths = discover_jobs(&client, &cancel, &opts.folder, &glob, MAX_DISCOVERY_DEPTH)
        .await?;

    // A free-text query reranks the discovered paths; only scored
    // matches survive.
    if !opts.query.is_empty() {
        job_paths = fuzzy::search(&opts.query, &job_paths, 0)
            .into_iter()
            .map(|m| m.value)
            .collect();
    }

    if job_paths.is_empty() {
        let empty = RunSearchOutput {
            schema_version: run::SCHEMA_VERSION.to_string(),
            items: Vec::new(),
            metadata: Some(jk_core::run::search::search_metadata(&opts, 0)),
        };
        print_output(app.format, &empty, || {
            println!("No matching runs found");
            Ok(())
        })?;
        return Ok(0);
    }

    let output = execute_run_search(&client, &cancel, &job_paths, &opts).await?;

    print_output(app.format, &output, || {
        if output.items.is_empty() {
            println!("No matching runs found");
            return Ok(());
        }
        for item in &output.items {
            let result = if item.run.result.is_empty() {
                item.run.status.to_uppercase()
            } else {
                item.run.result.clone()
            };
            println!(
                "{}\t#{}\t{}\t{}\t{}",
                item.job_path,
                item.run.number,
                result,
                item.run.start_time,
                duration_string(item.run.duration_ms)
            );
        }
        Ok(())
    })?;
    Ok(0)
}

async fn params(app: App, args: ParamsArgs) -> anyhow::Result<i32> {
    let source = jk_core::params::ParamsSource::parse(&args.source)?;
    let client = app.client().await?;
    let output =
        jk_core::params::discover_parameters(&client, &args.job_path, source, args.limit_runs)
            .await?;

    print_output(app.format, &output, || {
        if output.parameters.is_empty() {
            println!(
                "No parameters found for {} (source: {})",
                output.job_path, output.source
            );
            return Ok(());
        }

        println!(
            "Parameters for {} (source: {}):\n",
            output.job_path, output.source
        );
        for param in &output.parameters {
            let kind = if param.kind.is_empty() {
                "string"
            } else {
                param.kind.as_str()
            };
            let usage = if param.frequency >= 0.999 {
                "required"
            } else {
                "optional"
            };
            println!("  {} ({kind}, {usage})", param.name);
            if !param.default.is_empty() && !param.is_secret {
                println!("    Default: {}", param.default);
            }
            if param.is_secret {
                println!("    Marked as secret (values not displayed)");
            }
            if !param.sample_values.is_empty() && !param.is_secret {
                println!("    Sample values: {}", param.sample_values.join(", "));
            }
            if param.frequency > 0.0 && param.frequency < 0.999 {
                println!("    Seen in {:.0}% of recent runs", param.frequency * 100.0);
            }
        }
        Ok(())
    })?;
    Ok(0)
}

async fn view(app: App, job_path: &str, build_number: i64) -> anyhow::Result<i32> {
    let client = app.client().await?;
    let detail = fetch_run_detail(&client, job_path, build_number).await?;
    let report = match testreport::fetch_test_report(&client, job_path, build_number).await {
        Ok(report) => report,
        Err(err) => {
            tracing::debug!(error = %err, "fetch test report failed");
            None
        }
    };
    let output = run::build_run_detail_output(job_path, &detail, report.as_ref());

    print_output(app.format, &output, || {
        println!("Run #{} ({})", output.number, output.status);
        if !output.result.is_empty() {
            println!("Result: {}", output.result);
        }
        println!("URL: {}", output.url);
        if !output.start_time.is_empty() {
            println!("Started: {}", output.start_time);
        }
        println!("Duration: {}", duration_string(output.duration_ms));
        if let Some(scm) = &output.scm {
            println!(
                "SCM: branch={} commit={} repo={}",
                scm.branch, scm.commit, scm.repo
            );
        }
        if !output.parameters.is_empty() {
            println!("Parameters:");
            for param in &output.parameters {
                println!(
                    "  {}={}",
                    param.name,
                    jk_core::run::inspect::value_to_string(&param.value)
                );
            }
        }
        if let Some(tests) = &output.tests {
            println!(
                "Tests: total={} failed={} skipped={}",
                tests.total, tests.failed, tests.skipped
            );
        }
        Ok(())
    })?;
    Ok(0)
}

async fn cancel_cmd(app: App, job_path: &str, build_number: i64, mode: &str) -> anyhow::Result<i32> {
    let mode = CancelMode::parse(mode)?;
    let client = app.client().await?;
    cancel_run(&client, job_path, build_number, mode).await?;

    let payload = serde_json::json!({
        "jobPath": job_path,
        "build": build_number,
        "action": mode.action(),
        "status": "requested",
    });
    print_output(app.format, &payload, || {
        println!(
            "Cancellation requested for {job_path} #{build_number} ({})",
            mode.action()
        );
        Ok(())
    })?;
    Ok(0)
}

async fn rerun(app: App, args: RerunArgs, cancel: CancellationToken) -> anyhow::Result<i32> {
    let interval = parse_interval(&args.interval)?;
    let client = app.client().await?;

    let detail = fetch_run_detail(&client, &args.job_path, args.build_number).await?;
    let params = run::collect_rerun_parameters(&detail);
    let location = trigger_run(&client, &args.job_path, &params).await?;

    if !app.format.is_structured() {
        println!("Triggered rerun for {} #{}", args.job_path, args.build_number);
    }

    if !args.follow {
        let payload = TriggerOutput {
            job_path: args.job_path.clone(),
            message: "rerun requested",
            queue_location: location,
        };
        print_output(app.format, &payload, || Ok(()))?;
        return Ok(0);
    }

    follow_triggered(&app, &client, &cancel, &args.job_path, &location, interval).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_assignments() {
        let parsed =
            parse_param_assignments(&["CHART=nova".to_string(), "X= spaced ".to_string()]).unwrap();
        assert_eq!(parsed[0], ("CHART".to_string(), "nova".to_string()));
        assert_eq!(parsed[1], ("X".to_string(), " spaced ".to_string()));
        assert!(parse_param_assignments(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_build_list_options_validates_aggregation() {
        let mut args = LsArgs {
            job_path: "app".to_string(),
            limit: 20,
            cursor: String::new(),
            filters: Vec::new(),
            since: String::new(),
            select: String::new(),
            group_by: String::new(),
            aggregation: "last".to_string(),
            with_meta: false,
            regex: false,
        };
        assert!(build_list_options(&args).is_err());

        args.group_by = "result".to_string();
        let opts = build_list_options(&args).unwrap();
        assert_eq!(opts.aggregation, Aggregation::Last);
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("1s").unwrap(), Duration::from_secs(1));
        assert!(parse_interval("oops").is_err());
    }
}
