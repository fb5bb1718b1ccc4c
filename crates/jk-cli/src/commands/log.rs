//! `jk log`: show or follow run console output.

use std::time::Duration;

use clap::Args;
use jk_core::logs::{collect_log_snapshot, stream_progressive_log};
use jk_core::run::fetch_run_detail;
use jk_core::run::output::format_timestamp;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::output::{duration_string, print_output};

const SNAPSHOT_MAX_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_FOLLOW_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Args)]
#[command(
    long_about = "Display the console log for a Jenkins run. Add --follow to stream live \
                  output similar to `gh run view --log`."
)]
pub struct LogArgs {
    pub job_path: String,
    pub build_number: i64,
    /// Stream log output until the run finishes
    #[arg(long)]
    pub follow: bool,
    /// Polling interval while following live logs
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Disable headings and additional formatting
    #[arg(long)]
    pub plain: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogOutput {
    job_path: String,
    build: i64,
    status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    result: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    start_time: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    duration: String,
    log: String,
    #[serde(skip_serializing_if = "is_false")]
    truncated: bool,
}

fn is_false(v: &bool) -> bool {
    !v
}

pub async fn run(app: App, args: LogArgs, cancel: CancellationToken) -> anyhow::Result<i32> {
    if args.build_number <= 0 {
        anyhow::bail!("build number must be positive");
    }
    let mut interval = jk_core::filter::parse_duration(&args.interval)?;
    if interval.is_zero() {
        interval = DEFAULT_FOLLOW_INTERVAL;
    }

    let client = app.client().await?;
    let detail = fetch_run_detail(&client, &args.job_path, args.build_number).await?;

    let status = if detail.building {
        "running"
    } else {
        "completed"
    };
    let mut result = detail
        .result
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_uppercase();
    if status == "completed" && result.is_empty() {
        result = "SUCCESS".to_string();
    }

    if args.follow {
        if app.format.is_structured() {
            anyhow::bail!("--json/--yaml not supported with --follow");
        }

        if !args.plain {
            print_heading(&args, &detail, status, &result);
            println!();
        }

        let mut out = std::io::stdout();
        stream_progressive_log(
            &client,
            &cancel,
            &args.job_path,
            args.build_number,
            interval,
            &mut out,
        )
        .await?;

        if !args.plain {
            println!();
            println!("Run status: {}", result.to_uppercase());
        }
        return Ok(0);
    }

    let mut buf = Vec::new();
    let truncated = collect_log_snapshot(
        &client,
        &cancel,
        &args.job_path,
        args.build_number,
        SNAPSHOT_MAX_BYTES,
        &mut buf,
    )
    .await?;

    let output = LogOutput {
        job_path: args.job_path.clone(),
        build: args.build_number,
        status: status.to_string(),
        result: result.clone(),
        start_time: format_timestamp(detail.timestamp),
        duration: if detail.duration > 0 {
            duration_string(detail.duration)
        } else {
            String::new()
        },
        log: String::from_utf8_lossy(&buf).into_owned(),
        truncated,
    };

    print_output(app.format, &output, || {
        if !args.plain {
            print_heading(&args, &detail, status, &result);
            println!();
        }

        if output.log.is_empty() {
            if !args.plain {
                println!("(log is empty)");
            }
        } else {
            print!("{}", output.log);
            if !output.log.ends_with('\n') {
                println!();
            }
        }

        if truncated && !args.plain {
            println!();
            println!("(log truncated; use --follow to stream live output)");
        }
        Ok(())
    })?;
    Ok(0)
}

fn print_heading(args: &LogArgs, detail: &jk_core::types::RunDetail, status: &str, result: &str) {
    println!("==> {} #{}", args.job_path, args.build_number);
    let mut pieces = Vec::new();
    if !status.is_empty() {
        pieces.push(format!("status: {}", status.to_uppercase()));
    }
    if !result.is_empty() {
        pieces.push(format!("result: {result}"));
    }
    if detail.timestamp > 0 {
        pieces.push(format!("started: {}", format_timestamp(detail.timestamp)));
    }
    if detail.duration > 0 {
        pieces.push(format!("duration: {}", duration_string(detail.duration)));
    }
    if !pieces.is_empty() {
        println!("   {}", pieces.join("   "));
    }
}
