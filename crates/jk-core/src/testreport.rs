//! JUnit test report aggregation for a run.

use crate::client::{JenkinsClient, RequestSpec};
use crate::error::{Error, Result};
use crate::path::encode_job_path;
use crate::types::TestReport;

/// Fetches the aggregated test report for a run; `None` when the run has
/// no recorded tests.
pub async fn fetch_test_report(
    client: &JenkinsClient,
    job_path: &str,
    build: i64,
) -> Result<Option<TestReport>> {
    let encoded = encode_job_path(job_path);
    if encoded.is_empty() {
        return Err(Error::InvalidInput("job path is required".to_string()));
    }
    if build <= 0 {
        return Err(Error::InvalidInput(
            "build number must be positive".to_string(),
        ));
    }

    let path = format!("/{encoded}/{build}/testReport/api/json");
    let resp = client.execute(&RequestSpec::get(path.as_str())).await?;
    let status = resp.status().as_u16();
    if status == 404 {
        return Ok(None);
    }
    if status >= 400 {
        return Err(Error::RequestFailed {
            context: format!("fetch test report for {job_path} #{build}"),
            status,
        });
    }
    Ok(Some(resp.json().await?))
}
