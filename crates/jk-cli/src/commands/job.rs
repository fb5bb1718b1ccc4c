//! `jk job`: list and view jobs.

use clap::Subcommand;
use jk_core::client::RequestSpec;
use jk_core::path::encode_job_path;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::output::print_output;

#[derive(Debug, Subcommand)]
pub enum JobCmd {
    /// List jobs
    Ls {
        /// Folder path to list jobs from
        #[arg(long, default_value = "")]
        folder: String,
    },
    /// View job details
    View { job_path: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct JobSummary {
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    color: String,
}

#[derive(Debug, Deserialize)]
struct JobListBody {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

pub async fn run(app: App, cmd: JobCmd) -> anyhow::Result<i32> {
    match cmd {
        JobCmd::Ls { folder } => list(app, &folder).await,
        JobCmd::View { job_path } => view(app, &job_path).await,
    }
}

async fn list(app: App, folder: &str) -> anyhow::Result<i32> {
    let client = app.client().await?;

    let path = if folder.is_empty() {
        "/api/json".to_string()
    } else {
        format!("/{}/api/json", encode_job_path(folder))
    };

    let mut body: JobListBody = client
        .get_json(&path, &[("tree", "jobs[name,url,color]")])
        .await?;
    body.jobs.sort_by(|a, b| a.name.cmp(&b.name));

    print_output(app.format, &body.jobs, || {
        if body.jobs.is_empty() {
            println!("No jobs found");
            return Ok(());
        }
        for job in &body.jobs {
            println!("{}\t{}", job.name, job.url);
        }
        Ok(())
    })?;
    Ok(0)
}

async fn view(app: App, job_path: &str) -> anyhow::Result<i32> {
    let client = app.client().await?;

    let path = format!("/{}/api/json", encode_job_path(job_path));
    let resp = client.execute(&RequestSpec::get(path.as_str())).await?;
    if resp.status().as_u16() == 404 {
        return Err(jk_core::Error::NotFound(format!("job {job_path}")).into());
    }
    if !resp.status().is_success() {
        return Err(jk_core::Error::RequestFailed {
            context: format!("view job {job_path}"),
            status: resp.status().as_u16(),
        }
        .into());
    }
    let data: serde_json::Value = resp.json().await.map_err(jk_core::Error::Http)?;

    print_output(app.format, &data, || {
        if let Some(name) = data.get("name").and_then(|v| v.as_str()) {
            println!("Name: {name}");
        }
        if let Some(desc) = data.get("description").and_then(|v| v.as_str()) {
            if !desc.is_empty() {
                println!("Description: {desc}");
            }
        }
        if let Some(url) = data.get("url").and_then(|v| v.as_str()) {
            println!("URL: {url}");
        }
        Ok(())
    })?;
    Ok(0)
}
