//! `jk artifact`: list and download run artifacts.

use std::path::Path;

use clap::Subcommand;
use globset::GlobBuilder;
use jk_core::client::{Accept, RequestSpec};
use jk_core::path::encode_job_path;
use jk_core::run::fetch_run_detail;
use jk_core::types::ArtifactItem;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::output::print_output;

#[derive(Debug, Subcommand)]
pub enum ArtifactCmd {
    /// List artifacts for a run
    Ls {
        job_path: String,
        build_number: i64,
    },
    /// Download artifacts
    Download {
        job_path: String,
        build_number: i64,
        /// Glob to match artifact paths
        #[arg(short = 'p', long, default_value = "**/*")]
        pattern: String,
        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: String,
        /// Do not error when no artifacts match
        #[arg(long)]
        allow_empty: bool,
    },
}

pub async fn run(app: App, cmd: ArtifactCmd, cancel: CancellationToken) -> anyhow::Result<i32> {
    match cmd {
        ArtifactCmd::Ls {
            job_path,
            build_number,
        } => list(app, &job_path, build_number).await,
        ArtifactCmd::Download {
            job_path,
            build_number,
            pattern,
            output,
            allow_empty,
        } => {
            download(
                app,
                &job_path,
                build_number,
                &pattern,
                &output,
                allow_empty,
                cancel,
            )
            .await
        }
    }
}

async fn list(app: App, job_path: &str, build_number: i64) -> anyhow::Result<i32> {
    let client = app.client().await?;
    let detail = fetch_run_detail(&client, job_path, build_number).await?;
    let items = detail.artifacts;

    print_output(app.format, &items, || {
        if items.is_empty() {
            println!("No artifacts found");
            return Ok(());
        }
        for item in &items {
            println!("{}\t{}\t{} bytes", item.relative_path, item.file_name, item.size);
        }
        Ok(())
    })?;
    Ok(0)
}

async fn download(
    app: App,
    job_path: &str,
    build_number: i64,
    pattern: &str,
    output_dir: &str,
    allow_empty: bool,
    cancel: CancellationToken,
) -> anyhow::Result<i32> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| jk_core::Error::InvalidInput(format!("invalid pattern {pattern:?}: {e}")))?
        .compile_matcher();

    let client = app.client().await?;
    let detail = fetch_run_detail(&client, job_path, build_number).await?;
    let items = detail.artifacts;
    let matched: Vec<&ArtifactItem> = items
        .iter()
        .filter(|item| matcher.is_match(&item.relative_path))
        .collect();

    if matched.is_empty() {
        if allow_empty {
            println!("No artifacts matched pattern");
            return Ok(0);
        }
        return Err(jk_core::Error::NotFound("artifacts matching pattern".to_string()).into());
    }

    let encoded = encode_job_path(job_path);
    let base = format!("/{encoded}/{build_number}/artifact");

    for artifact in matched {
        if cancel.is_cancelled() {
            return Err(jk_core::Error::Cancelled.into());
        }

        let dest = Path::new(output_dir).join(&artifact.relative_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spec = RequestSpec::get(format!("{base}/{}", artifact.relative_path))
            .accept(Accept::Text)
            .streaming();
        let resp = client.execute(&spec).await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(jk_core::Error::RequestFailed {
                context: format!("download artifact {}", artifact.relative_path),
                status,
            }
            .into());
        }

        let bytes = resp.bytes().await.map_err(jk_core::Error::Http)?;
        std::fs::write(&dest, &bytes)?;
        println!("Downloaded {}", dest.display());
    }

    Ok(0)
}
