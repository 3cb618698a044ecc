//! Enable and disable commands

use anyhow::{Context, Result};

use crate::cli::NameArgs;
use crate::host::Host;
use crate::output;

pub fn run(host: &Host, args: NameArgs, disabled: bool) -> Result<()> {
    let verb = if disabled { "disable" } else { "enable" };
    let ext = host
        .controller
        .set_disabled(&args.name, disabled)
        .with_context(|| format!("Failed to {} {}", verb, args.name))?;

    output::success(&format!(
        "{} {}",
        if disabled { "Disabled" } else { "Enabled" },
        ext.display_name()
    ));
    if ext.need_restart() {
        output::warning("Restart the host for the change to take effect");
    }
    Ok(())
}
