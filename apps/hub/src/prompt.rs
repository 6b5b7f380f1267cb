use anyhow::{Context, Result};
use client_core::{Prompter, SessionForm};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use tracing::warn;

/// Terminal prompts for the admin commands.
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    fn field(&self, label: &str, current: &str) -> Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(label)
            .with_initial_text(current)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("failed to read {label}"))
    }

    /// Walks through every form field; the id is only asked for new sessions.
    pub fn fill_form(&self, form: &mut SessionForm) -> Result<()> {
        if form.is_new {
            let id = self.field("id", &form.id)?;
            form.set_id(id);
        }
        form.title = self.field("title", &form.title)?;
        form.room = self.field("room", &form.room)?;
        form.speaker = self.field("speaker", &form.speaker)?;
        form.start_iso = self.field("startISO (YYYY-MM-DDTHH:MM)", &form.start_iso)?;
        form.end_iso = self.field("endISO (YYYY-MM-DDTHH:MM)", &form.end_iso)?;
        form.summary = self.field("summary", &form.summary)?;
        Ok(())
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> bool {
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or_else(|err| {
                warn!(%err, "confirmation prompt failed");
                false
            })
    }

    fn prompt(&self, message: &str, default: &str) -> Option<String> {
        match Input::<String>::with_theme(&self.theme)
            .with_prompt(message)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
        {
            Ok(answer) => Some(answer),
            Err(err) => {
                warn!(%err, "input prompt failed");
                None
            }
        }
    }
}
