//! Trigger-and-follow: queue submission to terminal result.
//!
//! States: queued (a `Location` header pointing into the build queue),
//! resolved (the queue item gained an `executable` build number), running
//! (status polls while a cooperative follower streams the log), terminal
//! (result normalized and mapped to an exit code). The follower runs on a
//! child cancellation token and is always cancelled and joined exactly
//! once before the terminal line is emitted.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::logs;
use crate::path::encode_job_path;
use crate::types::{QueueItemStatus, RunDetail};

pub const DEFAULT_FOLLOW_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Posts the trigger and returns the queue location (`Location` header,
/// falling back to `X-Queue-Item`; may be empty when the server reports
/// neither).
pub async fn trigger_run(
    client: &JenkinsClient,
    job_path: &str,
    params: &[(String, String)],
) -> Result<String> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }

    let spec = if params.is_empty() {
        RequestSpec::post(format!("/{encoded}/build"))
    } else {
        RequestSpec::post(format!("/{encoded}/buildWithParameters")).form(params.to_vec())
    };

    let resp = client.execute(&spec).await?;
    let status = resp.status();
    if status.as_u16() >= 300 {
        return Err(Error::TriggerFailed(format!(
            "server returned HTTP {}",
            status.as_u16()
        )));
    }

    let location = resp
        .headers()
        .get("Location")
        .or_else(|| resp.headers().get("X-Queue-Item"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Ok(location)
}

/// Polls the queue item until it resolves to a build number. Cancellation
/// of the queue item surfaces its `why`; the deadline maps to
/// [`Error::QueueTimeout`].
pub async fn wait_for_build_number(
    client: &JenkinsClient,
    cancel: &CancellationToken,
    queue_location: &str,
    timeout: Duration,
) -> Result<i64> {
    let location = queue_location.trim();
    if location.is_empty() {
        return Err(Error::InvalidInput(
            "follow requested but queue location unavailable".to_string(),
        ));
    }

    let mut queue_api = as_request_path(client.base_url(), location);
    if !queue_api.contains("/api/json") {
        queue_api = format!("{}/api/json", queue_api.trim_end_matches('/'));
    }

    let timeout = if timeout.is_zero() {
        DEFAULT_QUEUE_TIMEOUT
    } else {
        timeout
    };
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let status: QueueItemStatus = client.get_json(&queue_api, &[]).await?;

        if status.cancelled {
            return Err(Error::QueueItemCancelled(
                status.why.unwrap_or_default(),
            ));
        }
        if let Some(executable) = &status.executable {
            if executable.number > 0 {
                return Ok(executable.number);
            }
        }
        if Instant::now() >= deadline {
            return Err(Error::QueueTimeout);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => {}
        }
    }
}

/// Reduces a queue location (often an absolute URL) to a request path
/// against the client's base URL.
fn as_request_path(base_url: &str, location: &str) -> String {
    if let Some(rest) = location.strip_prefix(base_url) {
        return ensure_leading_slash(rest);
    }
    if let Some(scheme_end) = location.find("://") {
        let after_scheme = &location[scheme_end + 3..];
        if let Some(slash) = after_scheme.find('/') {
            return after_scheme[slash..].to_string();
        }
        return "/".to_string();
    }
    ensure_leading_slash(location)
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// A writer shared between the status poller and the log follower task.
struct SharedWriter<W>(Arc<Mutex<W>>);

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| std::io::Error::other("output writer poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0
            .lock()
            .map_err(|_| std::io::Error::other("output writer poisoned"))?
            .flush()
    }
}

fn write_line<W: Write>(sink: &Arc<Mutex<W>>, line: &str) {
    if let Ok(mut w) = sink.lock() {
        let _ = writeln!(w, "{line}");
        let _ = w.flush();
    }
}

/// Follows a running build until it leaves the building state: polls
/// status every two seconds, streams the log into `sink` when one is
/// given, prints a heartbeat when nothing completed for five seconds,
/// and returns the normalized terminal result (empty result reads as
/// SUCCESS).
pub async fn monitor_run<W: Write + Send + 'static>(
    client: &Arc<JenkinsClient>,
    cancel: &CancellationToken,
    job_path: &str,
    build: i64,
    interval: Duration,
    sink: Option<Arc<Mutex<W>>>,
) -> Result<String> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }
    let status_path = format!("/{encoded}/{build}/api/json");
    let interval = if interval.is_zero() {
        DEFAULT_FOLLOW_INTERVAL
    } else {
        interval
    };

    let mut follower: Option<(CancellationToken, tokio::task::JoinHandle<Result<()>>)> = None;
    if let Some(sink) = sink.clone() {
        let child = cancel.child_token();
        let task_token = child.clone();
        let task_client = Arc::clone(client);
        let task_job = job_path.to_string();
        let handle = tokio::spawn(async move {
            let mut writer = SharedWriter(sink);
            logs::stream_progressive_log(
                &task_client,
                &task_token,
                &task_job,
                build,
                interval,
                &mut writer,
            )
            .await
        });
        follower = Some((child, handle));
    }

    let mut last_heartbeat: Option<Instant> = None;

    loop {
        let detail: RunDetail = match client.get_json(&status_path, &[]).await {
            Ok(detail) => detail,
            Err(err) => {
                // Drain the follower before surfacing the poll error.
                if let Some((token, handle)) = follower.take() {
                    token.cancel();
                    let _ = handle.await;
                }
                return Err(err);
            }
        };

        if !detail.building {
            if let Some((token, handle)) = follower.take() {
                token.cancel();
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => return Err(err),
                    Err(join_err) => {
                        return Err(Error::Io(std::io::Error::other(format!(
                            "log follower failed: {join_err}"
                        ))))
                    }
                }
            }

            let result = normalize_result(detail.result.as_deref());
            if let Some(sink) = &sink {
                write_line(
                    sink,
                    &format!("\nRun #{} completed with status {result}", detail.number),
                );
            }
            return Ok(result);
        }

        if let Some(sink) = &sink {
            let due = last_heartbeat
                .map(|t| t.elapsed() >= HEARTBEAT_INTERVAL)
                .unwrap_or(true);
            if due {
                write_line(sink, &format!("Run #{} still running...", detail.number));
                last_heartbeat = Some(Instant::now());
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                if let Some((token, handle)) = follower.take() {
                    token.cancel();
                    let _ = handle.await;
                }
                return Err(Error::Cancelled);
            }
            _ = tokio::time::sleep(STATUS_POLL_INTERVAL) => {}
        }
    }
}

/// A completed build with no recorded result reads as SUCCESS.
pub fn normalize_result(result: Option<&str>) -> String {
    let normalized = result.unwrap_or_default().trim().to_uppercase();
    if normalized.is_empty() {
        "SUCCESS".to_string()
    } else {
        normalized
    }
}

/// The strict result-to-exit-code table for follow mode.
pub fn exit_code_for_result(result: &str) -> i32 {
    match result.to_uppercase().as_str() {
        "UNSTABLE" => 10,
        "FAILURE" => 11,
        "ABORTED" => 12,
        "NOT_BUILT" => 13,
        _ => 0,
    }
}
