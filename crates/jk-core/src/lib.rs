//! Jenkins interaction engine for the jk CLI.
//!
//! The crate is organized leaf-first: [`path`] and [`filter`] have no
//! network dependencies, [`client`] provides the authenticated transport
//! with CSRF crumb handling and capability probing, and the higher layers
//! ([`run`], [`discovery`], [`trigger`], [`params`], [`logs`]) compose it
//! into the streaming, stateful operations the CLI exposes.

pub mod build_info;
pub mod client;
pub mod creds;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod fuzzy;
pub mod logs;
pub mod nodes;
pub mod params;
pub mod path;
pub mod plugins;
pub mod queue;
pub mod run;
pub mod testreport;
pub mod trigger;
pub mod types;

pub use client::{Capabilities, ClientOptions, JenkinsClient};
pub use error::{Error, Result};
