// Administrator bootstrap and recovery
// Talks to the database directly, no web console required

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mineradmin::config::{self, POSTGRES_ENV};
use mineradmin::credentials::Credentials;
use mineradmin::store::PgStore;
use mineradmin::validate;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "mineradmin_cli", version, about = "Manage MinerAdmin administrators")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long = "postgres", env = POSTGRES_ENV, hide_env_values = true, global = true)]
    postgres_url: Option<String>,

    #[arg(long, env = "MINERADMIN_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an administrator and print its password
    AddAdmin {
        #[arg(long)]
        login: String,
    },
    /// Generate a new password for an administrator and print it
    ResetPassword {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing(&cli.log_level)?;

    let url = cli
        .postgres_url
        .with_context(|| format!("Missing --postgres or {}", POSTGRES_ENV))?;
    let store = PgStore::connect(&url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let credentials = Credentials::new(Arc::new(store));

    let secret = match cli.command {
        Command::AddAdmin { login } => {
            let login = validate::admin_login(&login)?;
            credentials
                .add_admin(&login)
                .await
                .with_context(|| format!("Failed to add admin {}", login))?
        }
        Command::ResetPassword { id } => {
            let id = validate::id(&id, "invalid admin ID")?;
            credentials
                .reset_password(id)
                .await
                .with_context(|| format!("Failed to reset password of admin {}", id))?
        }
    };

    println!("{}", secret.expose());
    Ok(())
}
