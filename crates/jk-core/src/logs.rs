//! Progressive console log streaming.
//!
//! Jenkins serves console text incrementally: the client polls
//! `logText/progressiveText?start=<offset>` and the response carries the
//! next offset in `X-Text-Size` plus an `X-More-Data` flag. Follow mode
//! loops until the flag clears; snapshot mode additionally stops at a
//! byte budget and treats an empty chunk with more data pending as a
//! stall.

use std::io::Write;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::client::{Accept, JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::path::encode_job_path;

const HEADER_TEXT_SIZE: &str = "X-Text-Size";
const HEADER_MORE_DATA: &str = "X-More-Data";

const DEFAULT_SNAPSHOT_MAX_BYTES: usize = 512 * 1024;
const SNAPSHOT_MAX_ITERATIONS: usize = 1000;

/// Streams the console log until the server stops reporting more data.
/// Cancellation is a clean exit: the function returns `Ok(())` and the
/// caller inspects its token to distinguish.
pub async fn stream_progressive_log<W: Write + Send>(
    client: &JenkinsClient,
    cancel: &CancellationToken,
    job_path: &str,
    build: i64,
    interval: Duration,
    out: &mut W,
) -> Result<()> {
    let path = log_text_path(job_path, build)?;
    let mut offset: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let spec = RequestSpec::get(path.as_str())
            .streaming()
            .accept(Accept::Text)
            .query("start", offset.to_string());

        let resp = match client.execute(&spec).await {
            Ok(resp) => resp,
            Err(_) if cancel.is_cancelled() => return Ok(()),
            Err(err) => return Err(err),
        };

        if resp.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            // The build rotated its log out from under us; restart.
            offset = 0;
            if sleep_or_cancel(cancel, interval).await {
                return Ok(());
            }
            continue;
        }

        let headers = resp.headers().clone();
        let chunk = match resp.bytes().await {
            Ok(chunk) => chunk,
            Err(_) if cancel.is_cancelled() => return Ok(()),
            Err(err) => return Err(Error::ReadLogChunk(err)),
        };

        if !chunk.is_empty() {
            out.write_all(&chunk)?;
            out.flush()?;
        }

        if let Some(next) = header_number(&headers, HEADER_TEXT_SIZE) {
            offset = next;
        }

        if !header_is_true(&headers, HEADER_MORE_DATA) {
            return Ok(());
        }
        if sleep_or_cancel(cancel, interval).await {
            return Ok(());
        }
    }
}

/// Collects a bounded snapshot of the log. Returns `true` when output was
/// truncated: the byte budget was hit, progress stalled while the server
/// still advertised more data, or the iteration cap tripped.
pub async fn collect_log_snapshot<W: Write + Send>(
    client: &JenkinsClient,
    cancel: &CancellationToken,
    job_path: &str,
    build: i64,
    max_bytes: usize,
    out: &mut W,
) -> Result<bool> {
    let path = log_text_path(job_path, build)?;
    let max_bytes = if max_bytes == 0 {
        DEFAULT_SNAPSHOT_MAX_BYTES
    } else {
        max_bytes
    };

    let mut offset: u64 = 0;
    let mut total = 0usize;

    for _ in 0..SNAPSHOT_MAX_ITERATIONS {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let spec = RequestSpec::get(path.as_str())
            .streaming()
            .accept(Accept::Text)
            .query("start", offset.to_string());
        let resp = client.execute(&spec).await?;

        if resp.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            offset = 0;
            continue;
        }

        let headers = resp.headers().clone();
        let chunk = resp.bytes().await.map_err(Error::ReadLogChunk)?;

        if !chunk.is_empty() {
            out.write_all(&chunk)?;
            total += chunk.len();
        }

        if let Some(next) = header_number(&headers, HEADER_TEXT_SIZE) {
            offset = next;
        }

        if !header_is_true(&headers, HEADER_MORE_DATA) {
            return Ok(false);
        }
        if chunk.is_empty() {
            return Ok(true);
        }
        if total >= max_bytes {
            return Ok(true);
        }
    }

    Ok(true)
}

fn log_text_path(job_path: &str, build: i64) -> Result<String> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }
    Ok(format!("/{encoded}/{build}/logText/progressiveText"))
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn header_is_true(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Sleeps for `interval`, returning true when cancelled first.
async fn sleep_or_cancel(cancel: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}
