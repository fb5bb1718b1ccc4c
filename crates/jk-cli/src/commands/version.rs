//! `jk version`: build metadata.

use jk_core::build_info;
use serde::Serialize;

use crate::app::App;
use crate::output::print_output;

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    commit: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    date: &'static str,
}

pub fn run(app: App) -> anyhow::Result<i32> {
    let info = VersionInfo {
        version: build_info::VERSION,
        commit: build_info::COMMIT,
        date: build_info::DATE,
    };

    print_output(app.format, &info, || {
        print!("jk {}", info.version);
        if !info.commit.is_empty() {
            print!(" ({})", info.commit);
        }
        if !info.date.is_empty() {
            print!(" built {}", info.date);
        }
        println!();
        Ok(())
    })?;
    Ok(0)
}
