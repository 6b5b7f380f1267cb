mod prompt;
mod render;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    bootstrap, load_settings_from, HubError, LocalAuth, Readiness, RsvpChange, ValidationError,
    ViewController,
};
use prompt::TerminalPrompter;
use shared::domain::{SessionId, View};
use tracing::info;
use tracing_subscriber::EnvFilter;

const READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(about = "Conference attendee hub")]
struct Cli {
    /// Settings file such as `hub.toml`; defaults to `hub.*` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the schedule, sorted by start time.
    Schedule,
    /// Toggle attendance for a session.
    ///
    /// Without `auth_token` in the settings every run signs in as a fresh
    /// `anon-<uuid>` user, so RSVPs do not carry over between runs.
    Attend { session_id: String },
    /// Rate a session on the schedule from 1 to 5.
    ///
    /// Without `auth_token` in the settings the record is filed under a fresh
    /// `anon-<uuid>` user on every run.
    Feedback {
        session_id: String,
        #[arg(long)]
        rating: u8,
        #[arg(long, default_value = "")]
        comment: String,
    },
    Reflection,
    Info,
    /// Keep the schedule on screen, redrawing on every change.
    Watch,
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    List,
    Create,
    Edit { session_id: String },
    Delete { session_id: String },
    Duplicate { session_id: String },
    Seed,
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config = load_settings_from(cli.config.as_deref()).inspect_err(render::error)?;
    let auth = LocalAuth::new(config.store.token_secret.clone());
    let mut controller = bootstrap(&config, &auth)
        .await
        .inspect_err(render::error)?;

    let readiness = tokio::time::timeout(READY_TIMEOUT, controller.wait_ready())
        .await
        .context("timed out waiting for the first snapshots")?;
    info!(?readiness, "hub ready");

    if let Err(err) = run(cli.command, &mut controller).await {
        render::error(&err);
        return Err(err.into());
    }
    Ok(())
}

async fn run(command: Command, controller: &mut ViewController) -> Result<(), HubError> {
    match command {
        Command::Schedule => {
            render::header(controller);
            render::schedule(controller);
        }
        Command::Attend { session_id } => {
            let session_id = SessionId::new(session_id);
            match controller.toggle_rsvp(&session_id).await? {
                RsvpChange::Added => println!("Attending {session_id}"),
                RsvpChange::Removed => println!("No longer attending {session_id}"),
            }
        }
        Command::Feedback {
            session_id,
            rating,
            comment,
        } => {
            controller.open_feedback(SessionId::new(session_id))?;
            controller.set_rating(rating);
            controller.set_comment(comment);
            let record = controller.submit_feedback().await?;
            println!("Thanks! Feedback recorded as {}", record.id());
        }
        Command::Reflection => {
            controller.navigate(View::Reflection)?;
            render::header(controller);
            render::reflection();
        }
        Command::Info => {
            controller.navigate(View::Info)?;
            render::header(controller);
            render::info();
        }
        Command::Watch => watch(controller).await,
        Command::Admin(command) => {
            controller.navigate(View::Admin)?;
            admin(command, controller).await?;
        }
    }
    Ok(())
}

async fn watch(controller: &mut ViewController) {
    render::header(controller);
    render::current_view(controller);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            applied = controller.pump() => {
                if applied && controller.readiness() == Readiness::Ready {
                    println!();
                    render::header(controller);
                    render::current_view(controller);
                }
            }
        }
    }
}

async fn admin(command: AdminCommand, controller: &mut ViewController) -> Result<(), HubError> {
    let prompter = TerminalPrompter::default();
    match command {
        AdminCommand::List => {
            render::header(controller);
            render::schedule(controller);
        }
        AdminCommand::Create => {
            controller.open_create()?;
            edit_and_save(controller, &prompter).await?;
        }
        AdminCommand::Edit { session_id } => {
            controller.open_edit(&SessionId::new(session_id))?;
            edit_and_save(controller, &prompter).await?;
        }
        AdminCommand::Delete { session_id } => {
            let session_id = SessionId::new(session_id);
            if controller.delete_session(&session_id, &prompter).await? {
                println!("Deleted {session_id}");
            }
        }
        AdminCommand::Duplicate { session_id } => {
            if let Some(copy) = controller
                .duplicate_session(&SessionId::new(session_id), &prompter)
                .await?
            {
                println!("Created {}", copy.id);
            }
        }
        AdminCommand::Seed => {
            let count = controller.seed().await?;
            println!("Seeded {count} sessions");
        }
        AdminCommand::Export { out } => {
            let (name, json) = controller.export()?;
            let path = out.unwrap_or_else(|| PathBuf::from(name));
            std::fs::write(&path, json)
                .map_err(|err| HubError::Export(format!("{}: {err}", path.display())))?;
            println!("Exported to {}", path.display());
        }
        AdminCommand::Import { file } => {
            let text = std::fs::read_to_string(&file).map_err(|err| {
                ValidationError::InvalidImportFile(format!(
                    "{}: {err}",
                    file.display()
                ))
            })?;
            let count = controller.import(&text).await?;
            println!("Imported {count} sessions");
        }
    }
    Ok(())
}

/// Prompts until the form saves or the admin gives up on input.
async fn edit_and_save(
    controller: &mut ViewController,
    prompter: &TerminalPrompter,
) -> Result<(), HubError> {
    loop {
        let Some(form) = controller.form_mut() else {
            return Ok(());
        };
        if let Err(err) = prompter.fill_form(form) {
            eprintln!("error: {err:#}");
            controller.cancel_form();
            return Ok(());
        }
        match controller.save_form().await {
            Ok(session) => {
                println!("Saved {}", session.id);
                return Ok(());
            }
            Err(HubError::Validation(err)) => eprintln!("error: {err}"),
            Err(err) => return Err(err),
        }
    }
}
