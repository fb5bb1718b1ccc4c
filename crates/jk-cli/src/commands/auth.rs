//! `jk auth`: login, logout, status.

use anyhow::Context as _;
use clap::{Args, Subcommand};
use jk_config::secret::{token_key, SecretStore};
use jk_config::Context;

use crate::app::App;
use crate::terminal;

#[derive(Debug, Subcommand)]
pub enum AuthCmd {
    /// Authenticate to Jenkins and persist a context
    Login(LoginArgs),
    /// Remove credentials for a context
    Logout {
        /// Context name to remove (defaults to active)
        context: Option<String>,
    },
    /// Display authentication status
    Status,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Jenkins base URL (e.g. https://jenkins.example.com)
    pub url: String,
    /// Context name (defaults to the Jenkins hostname)
    #[arg(long)]
    pub name: Option<String>,
    /// Jenkins username
    #[arg(long)]
    pub username: Option<String>,
    /// Jenkins API token (prompted when omitted)
    #[arg(long)]
    pub token: Option<String>,
    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
    /// Proxy URL for this context
    #[arg(long)]
    pub proxy: Option<String>,
    /// Custom CA bundle for TLS verification
    #[arg(long)]
    pub ca_file: Option<String>,
    /// Set the context as active after login
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub set_active: bool,
}

pub async fn run(app: App, cmd: AuthCmd) -> anyhow::Result<i32> {
    match cmd {
        AuthCmd::Login(args) => login(app, args),
        AuthCmd::Logout { context } => logout(app, context),
        AuthCmd::Status => status(app),
    }
}

fn login(mut app: App, args: LoginArgs) -> anyhow::Result<i32> {
    let url = normalize_url(&args.url)?;
    let context_name = match args.name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => derive_context_name(&url),
    };

    let username = match args.username {
        Some(username) if !username.is_empty() => username,
        _ => terminal::prompt("Username", "").context("read username")?,
    };
    let token = match args.token {
        Some(token) if !token.is_empty() => token,
        _ => terminal::prompt_secret("API token").context("read token")?,
    };

    let store = SecretStore::open()?;

    app.config.set_context(
        context_name.clone(),
        Context {
            url: url.clone(),
            username,
            insecure: args.insecure,
            proxy: args.proxy.unwrap_or_default(),
            ca_file: args.ca_file.unwrap_or_default(),
            allow_insecure_store: false,
        },
    );
    if args.set_active {
        app.config
            .set_active(&context_name)
            .context("set active context")?;
    }
    app.config.save().context("save config")?;

    store
        .set(&token_key(&context_name), &token)
        .context("store token")?;

    println!("Logged in to {url} ({context_name})");
    Ok(0)
}

fn logout(mut app: App, context: Option<String>) -> anyhow::Result<i32> {
    let name = match context {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            if app.config.active.is_empty() {
                anyhow::bail!("no context specified and no active context");
            }
            app.config.active.clone()
        }
    };

    let store = SecretStore::open()?;
    app.config.remove_context(&name);
    app.config.save().context("save config")?;
    store.delete(&token_key(&name)).context("delete token")?;

    println!("Logged out of context {name}");
    Ok(0)
}

fn status(app: App) -> anyhow::Result<i32> {
    match app.config.active_context() {
        Ok(Some((name, ctx))) => {
            println!("Active context: {name}");
            println!("URL: {}", ctx.url);
            println!("Username: {}", ctx.username);
            Ok(0)
        }
        _ => {
            println!("No active context");
            Ok(0)
        }
    }
}

fn normalize_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        anyhow::bail!("invalid Jenkins URL {raw:?} (expected http:// or https://)");
    }
    let host = &trimmed[trimmed.find("://").map(|i| i + 3).unwrap_or(0)..];
    if host.is_empty() || host.starts_with('/') {
        anyhow::bail!("invalid Jenkins URL {raw:?}");
    }
    Ok(trimmed.to_string())
}

fn derive_context_name(url: &str) -> String {
    let after_scheme = url.find("://").map(|i| &url[i + 3..]).unwrap_or(url);
    let host = after_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or(after_scheme);
    let name = host.to_lowercase().replace('.', "-");
    if name.is_empty() {
        "default".to_string()
    } else {
        name
    }
}
