//! `jk plugin`: list, install, enable, disable plugins.

use std::io::IsTerminal;

use clap::Subcommand;
use jk_core::plugins::{install_plugins, list_plugins, set_plugin_enabled};

use crate::app::App;
use crate::output::print_output;
use crate::terminal;
use crate::SilentExit;

#[derive(Debug, Subcommand)]
pub enum PluginCmd {
    /// List installed plugins
    Ls,
    /// Install plugins via the Jenkins update center
    Install {
        /// Plugin identifiers: name or name@version
        #[arg(required = true)]
        plugins: Vec<String>,
        /// Do not prompt for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Enable a plugin
    Enable { name: String },
    /// Disable a plugin
    Disable { name: String },
}

pub async fn run(app: App, cmd: PluginCmd) -> anyhow::Result<i32> {
    match cmd {
        PluginCmd::Ls => list(app).await,
        PluginCmd::Install { plugins, yes } => install(app, plugins, yes).await,
        PluginCmd::Enable { name } => toggle(app, &name, true).await,
        PluginCmd::Disable { name } => toggle(app, &name, false).await,
    }
}

async fn list(app: App) -> anyhow::Result<i32> {
    let client = app.client().await?;
    let mut plugins = list_plugins(&client).await?;
    plugins.sort_by(|a, b| a.short_name.cmp(&b.short_name));

    let rows: Vec<serde_json::Value> = plugins
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.short_name,
                "version": p.version,
                "enabled": p.enabled,
                "pinned": p.pinned,
            })
        })
        .collect();

    print_output(app.format, &rows, || {
        if plugins.is_empty() {
            println!("No plugins installed");
            return Ok(());
        }
        for plugin in &plugins {
            let mut status = if plugin.enabled { "enabled" } else { "disabled" }.to_string();
            if plugin.pinned {
                status.push_str(" (pinned)");
            }
            println!("{}\t{}\t{status}", plugin.short_name, plugin.version);
        }
        Ok(())
    })?;
    Ok(0)
}

async fn install(app: App, plugins: Vec<String>, assume_yes: bool) -> anyhow::Result<i32> {
    if !assume_yes {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!("confirmation required when stdin is not a TTY (use --yes)");
        }
        let answer = terminal::prompt(
            &format!("Install plugins: {}? [y/N]", plugins.join(", ")),
            "n",
        )?;
        if !matches!(answer.to_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled");
            return Err(SilentExit(1).into());
        }
    }

    let client = app.client().await?;
    install_plugins(&client, &plugins).await?;
    println!("Plugin installation triggered. Monitor Jenkins for progress.");
    Ok(0)
}

async fn toggle(app: App, name: &str, enable: bool) -> anyhow::Result<i32> {
    let client = app.client().await?;
    set_plugin_enabled(&client, name, enable).await?;
    println!(
        "Plugin {name} {}",
        if enable { "enabled" } else { "disabled" }
    );
    Ok(0)
}
