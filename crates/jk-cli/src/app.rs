//! Shared command services: configuration, context resolution, and
//! client construction.

use std::sync::Arc;

use anyhow::Context as _;
use jk_config::secret::{token_key, SecretStore};
use jk_config::Config;
use jk_core::{ClientOptions, Error, JenkinsClient};

use crate::output::OutputFormat;

pub struct App {
    pub config: Config,
    pub format: OutputFormat,
    context_override: Option<String>,
}

impl App {
    pub fn load(context_override: Option<String>, format: OutputFormat) -> anyhow::Result<Self> {
        let config = Config::load().context("load configuration")?;
        Ok(Self {
            config,
            format,
            context_override,
        })
    }

    /// The context to operate on: the `--context` flag (or `JK_CONTEXT`)
    /// wins, then the configured active context.
    pub fn resolve_context_name(&self) -> Result<String, Error> {
        if let Some(name) = &self.context_override {
            let name = name.trim();
            if !name.is_empty() {
                return Ok(name.to_string());
            }
        }

        match self.config.active_context()? {
            Some((name, _)) => Ok(name.to_string()),
            None => Err(Error::NoActiveContext),
        }
    }

    /// Builds an authenticated client for the resolved context, reading
    /// the API token from the secret store.
    pub async fn client(&self) -> anyhow::Result<Arc<JenkinsClient>> {
        let name = self.resolve_context_name()?;
        let ctx = self
            .config
            .context(&name)
            .with_context(|| format!("context {name:?}"))?;

        let store = SecretStore::open().map_err(Error::Secret)?;
        let token = store
            .get(&token_key(&name))
            .map_err(Error::Secret)
            .with_context(|| format!("load token for context {name}"))?;

        let opts = ClientOptions::from_context(ctx, &token)?;
        let client = JenkinsClient::connect(opts).await?;
        Ok(Arc::new(client))
    }
}
