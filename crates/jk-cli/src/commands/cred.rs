//! `jk cred`: list, create, and delete credentials.

use std::io::Read;

use clap::Subcommand;
use jk_core::creds::{
    create_secret_text, delete_credential, list_credentials, CredScope,
};

use crate::app::App;
use crate::output::print_output;

#[derive(Debug, Subcommand)]
pub enum CredCmd {
    /// List credentials
    Ls {
        /// Scope to query: system or folder
        #[arg(long, default_value = "system")]
        scope: String,
        /// Folder path when scope=folder (e.g. team/service)
        #[arg(long, default_value = "")]
        folder: String,
    },
    /// Create a secret text credential
    CreateSecret {
        /// Scope to create the credential in (system or folder)
        #[arg(long, default_value = "system")]
        scope: String,
        /// Folder path when scope=folder
        #[arg(long, default_value = "")]
        folder: String,
        /// Credential identifier
        #[arg(long)]
        id: String,
        /// Credential description
        #[arg(long, default_value = "")]
        description: String,
        /// Secret value (omit to read from stdin with --from-stdin)
        #[arg(long, default_value = "")]
        secret: String,
        /// Read secret value from standard input
        #[arg(long)]
        from_stdin: bool,
    },
    /// Delete a credential
    Rm {
        id: String,
        /// Scope of the credential (system or folder)
        #[arg(long, default_value = "system")]
        scope: String,
        /// Folder path when scope=folder
        #[arg(long, default_value = "")]
        folder: String,
    },
}

pub async fn run(app: App, cmd: CredCmd) -> anyhow::Result<i32> {
    match cmd {
        CredCmd::Ls { scope, folder } => {
            let scope = CredScope::parse(&scope, &folder)?;
            let client = app.client().await?;
            let list = list_credentials(&client, &scope).await?;

            print_output(app.format, &list, || {
                if list.items.is_empty() {
                    println!("No credentials found");
                    return Ok(());
                }
                for item in &list.items {
                    if item.path.is_empty() {
                        println!("{}\t{}", item.id, item.kind);
                    } else {
                        println!("{}\t{}\t{}", item.id, item.kind, item.path);
                    }
                }
                Ok(())
            })?;
            Ok(0)
        }
        CredCmd::CreateSecret {
            scope,
            folder,
            id,
            description,
            secret,
            from_stdin,
        } => {
            let scope = CredScope::parse(&scope, &folder)?;

            let secret_value = if from_stdin {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf.trim_end_matches('\n').to_string()
            } else {
                secret
            };

            let client = app.client().await?;
            create_secret_text(&client, &scope, &id, &description, &secret_value).await?;

            let scope_label = match &scope {
                CredScope::System => "system",
                CredScope::Folder(_) => "folder",
            };
            println!("Created credential {id} in {scope_label} scope");
            Ok(0)
        }
        CredCmd::Rm { id, scope, folder } => {
            let scope = CredScope::parse(&scope, &folder)?;
            let client = app.client().await?;
            delete_credential(&client, &scope, &id).await?;
            println!("Deleted credential {id}");
            Ok(0)
        }
    }
}
