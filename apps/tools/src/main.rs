use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::mint_token;
use shared::{
    domain::{DeploymentScope, UserId},
    protocol::{FieldValue, Fields, WriteMode},
};
use storage::{DocumentStore, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Operator tasks that need direct store access.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://conference.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the admin marker for a user.
    GrantAdmin { scope: String, user_id: String },
    /// Remove the admin marker for a user.
    RevokeAdmin { scope: String, user_id: String },
    ListAdmins { scope: String },
    /// Issue a sign-in token for `user_id`.
    MintToken {
        user_id: String,
        #[arg(long)]
        secret: String,
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::GrantAdmin { scope, user_id } => {
            let storage = open(&cli.database_url).await?;
            let marker = DeploymentScope::new(scope).admin_marker(&UserId::new(user_id));
            let mut fields = Fields::new();
            fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
            storage
                .set(&marker, fields, WriteMode::Merge)
                .await
                .with_context(|| format!("failed to write {marker}"))?;
            info!(%marker, "admin granted");
            println!("granted {marker}");
        }
        Command::RevokeAdmin { scope, user_id } => {
            let storage = open(&cli.database_url).await?;
            let marker = DeploymentScope::new(scope).admin_marker(&UserId::new(user_id));
            storage
                .delete(&marker)
                .await
                .with_context(|| format!("failed to delete {marker}"))?;
            info!(%marker, "admin revoked");
            println!("revoked {marker}");
        }
        Command::ListAdmins { scope } => {
            let storage = open(&cli.database_url).await?;
            let admins = DeploymentScope::new(scope).admins_collection();
            for doc in storage
                .list(&admins)
                .await
                .with_context(|| format!("failed to list {admins}"))?
            {
                println!("{}", doc.id);
            }
        }
        Command::MintToken {
            user_id,
            secret,
            ttl_hours,
        } => {
            let token = mint_token(
                &secret,
                &UserId::new(user_id),
                chrono::Duration::hours(ttl_hours),
            )
            .context("failed to sign token")?;
            println!("{token}");
        }
    }

    Ok(())
}

async fn open(database_url: &str) -> Result<Storage> {
    Storage::new(database_url)
        .await
        .with_context(|| format!("failed to open {database_url}"))
}
