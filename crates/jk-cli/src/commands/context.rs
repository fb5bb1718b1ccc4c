//! `jk context`: list, switch, remove contexts.

use anyhow::Context as _;
use clap::Subcommand;
use jk_config::secret::{token_key, SecretStore};

use crate::app::App;

#[derive(Debug, Subcommand)]
pub enum ContextCmd {
    /// List configured contexts
    Ls,
    /// Set the active context
    Use { name: String },
    /// Remove a context and its credentials
    Rm { name: String },
}

pub fn run(app: App, cmd: ContextCmd) -> anyhow::Result<i32> {
    match cmd {
        ContextCmd::Ls => list(app),
        ContextCmd::Use { name } => use_context(app, &name),
        ContextCmd::Rm { name } => remove(app, &name),
    }
}

fn list(app: App) -> anyhow::Result<i32> {
    if app.config.contexts.is_empty() {
        println!("No contexts configured");
        return Ok(0);
    }

    for (name, ctx) in &app.config.contexts {
        let marker = if *name == app.config.active { "*" } else { " " };
        println!("{marker} {name}\t{}", ctx.url);
    }
    Ok(0)
}

fn use_context(mut app: App, name: &str) -> anyhow::Result<i32> {
    app.config
        .set_active(name)
        .with_context(|| format!("context {name:?}"))?;
    app.config.save().context("save config")?;
    println!("Switched to context {name}");
    Ok(0)
}

fn remove(mut app: App, name: &str) -> anyhow::Result<i32> {
    app.config
        .context(name)
        .with_context(|| format!("context {name:?}"))?;

    let store = SecretStore::open()?;
    app.config.remove_context(name);
    app.config.save().context("save config")?;
    store.delete(&token_key(name)).context("delete token")?;

    println!("Removed context {name}");
    Ok(0)
}
