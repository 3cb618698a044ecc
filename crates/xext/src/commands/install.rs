//! Install, dev, reload and uninstall commands

use anyhow::{Context, Result};
use async_trait::async_trait;
use dialoguer::Confirm;
use std::sync::Arc;
use xext_core::Error;
use xext_extensions::{Confirmation, InstallOutcome, InstallSource, InstallStage, Prompt};

use crate::cli::{DevArgs, InstallArgs, NameArgs, UninstallArgs};
use crate::host::Host;
use crate::output;

/// Asks installer questions on the terminal
pub struct TerminalConfirm {
    assume_yes: bool,
}

impl TerminalConfirm {
    pub fn new(assume_yes: bool) -> Arc<Self> {
        Arc::new(Self { assume_yes })
    }
}

#[async_trait]
impl Confirmation for TerminalConfirm {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        if self.assume_yes {
            return true;
        }
        let message = prompt.message();
        let default = !matches!(prompt, Prompt::InstallCode { .. });
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(message)
                .default(default)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

/// Install a package archive or an unpacked package directory
pub async fn install(host: &Host, args: InstallArgs) -> Result<()> {
    let source = InstallSource::detect(args.path.as_std_path())
        .with_context(|| format!("Cannot install from {}", args.path))?;
    let installer = host.installer(TerminalConfirm::new(args.yes));

    // Prompts and a spinner cannot share the terminal
    let spinner = args
        .yes
        .then(|| output::spinner(&format!("Installing {}", args.path)));
    let result = installer.install(&source).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    report(cancelled(result)?)
}

/// Register a package directory in place for development
pub async fn dev(host: &Host, args: DevArgs) -> Result<()> {
    let installer = host.installer(TerminalConfirm::new(args.yes));
    let result = installer.install_dev(args.path.as_std_path()).await;
    report(cancelled(result)?)
}

/// Re-read a dev extension from its directory
pub async fn reload(host: &Host, args: NameArgs) -> Result<()> {
    let installer = host.installer(TerminalConfirm::new(true));
    let ext = installer
        .reload_dev(&args.name)
        .await
        .with_context(|| format!("Failed to reload {}", args.name))?;
    output::success(&format!(
        "Reloaded {} {}",
        ext.display_name(),
        ext.version().unwrap_or_default()
    ));
    for issue in ext.issues() {
        output::warning(&format!("{}: {}", issue.field, issue.message));
    }
    Ok(())
}

pub async fn uninstall(host: &Host, args: UninstallArgs) -> Result<()> {
    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Are you sure you want to uninstall '{}'?", args.name))
            .default(false)
            .interact()?;
        if !confirmed {
            output::info("Cancelled");
            return Ok(());
        }
    }

    let installer = host.installer(TerminalConfirm::new(true));
    let ext = installer
        .uninstall(&args.name)
        .await
        .with_context(|| format!("Failed to uninstall {}", args.name))?;
    output::success(&format!("Uninstalled {}", ext.display_name()));
    Ok(())
}

/// A declined prompt is not a failure
fn cancelled(result: xext_core::Result<InstallOutcome>) -> Result<Option<InstallOutcome>> {
    match result {
        Ok(outcome) => Ok(Some(outcome)),
        Err(Error::Canceled { name }) => {
            output::info(&format!("Cancelled installing {}", name));
            Ok(None)
        }
        Err(e) => Err(e).context("Install failed"),
    }
}

fn report(outcome: Option<InstallOutcome>) -> Result<()> {
    let Some(outcome) = outcome else {
        return Ok(());
    };
    let ext = &outcome.extension;
    let verb = if outcome.replaced { "Updated" } else { "Installed" };
    output::success(&format!(
        "{} {} {} ({})",
        verb,
        ext.display_name(),
        ext.version().unwrap_or_default(),
        ext.kind().as_str()
    ));
    for issue in ext.issues() {
        output::warning(&format!("{}: {}", issue.field, issue.message));
    }
    if outcome.need_restart() {
        output::warning("Restart the host to activate the extension");
    } else if outcome.stage == InstallStage::Attached {
        output::info("Extension module attached");
    }
    Ok(())
}
