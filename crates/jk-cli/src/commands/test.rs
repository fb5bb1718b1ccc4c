//! `jk test`: aggregated test results.

use clap::Subcommand;
use jk_core::testreport::fetch_test_report;

use crate::app::App;
use crate::output::print_output;

#[derive(Debug, Subcommand)]
pub enum TestCmd {
    /// Show aggregated test results for a run
    Report {
        job_path: String,
        build_number: i64,
    },
}

pub async fn run(app: App, cmd: TestCmd) -> anyhow::Result<i32> {
    let TestCmd::Report {
        job_path,
        build_number,
    } = cmd;

    let client = app.client().await?;
    let report = fetch_test_report(&client, &job_path, build_number).await?;

    let Some(report) = report else {
        println!("No test report available");
        return Ok(0);
    };

    print_output(app.format, &report, || {
        println!("Total: {}", report.total_count);
        println!("Failed: {}", report.fail_count);
        println!("Skipped: {}", report.skip_count);
        if !report.suites.is_empty() {
            println!("Suites: {}", report.suites.len());
        }
        Ok(())
    })?;
    Ok(0)
}
