//! Extension info command

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use xext_extensions::{AutoConfirm, Extension};

use super::{source, status};
use crate::cli::InfoArgs;
use crate::host::Host;
use crate::output;

pub async fn run(host: &Host, args: InfoArgs) -> Result<()> {
    let ext = host
        .controller
        .get(&args.name)
        .ok_or_else(|| anyhow!("Extension '{}' not found", args.name))?;

    if args.json {
        let value = json!({
            "extension": ext.record(),
            "status": status(&ext),
            "source": source(&ext),
            "issues": ext.issues(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_details(&ext);

    if args.readme {
        let readme = host
            .installer(std::sync::Arc::new(AutoConfirm(false)))
            .load_readme(&ext)
            .await
            .with_context(|| format!("No README for {}", ext.name()))?;
        output::header("README");
        println!("{}", readme);
    }
    Ok(())
}

fn print_details(ext: &Extension) {
    output::header(&format!("{} ({})", ext.display_name(), ext.name()));
    output::kv("Type", ext.kind().as_str());
    output::kv("Version", ext.version().unwrap_or("-"));
    output::kv("Status", status(ext));
    output::kv("Source", source(ext));
    if let Some(description) = ext.description() {
        output::kv("Description", description);
    }
    if let Some(author) = ext.author() {
        output::kv("Author", author);
    }
    if let Some(publisher) = ext.publisher() {
        output::kv("Publisher", publisher);
    }
    if let Some(license) = ext.license() {
        output::kv("License", license);
    }
    if let Some(homepage) = ext.homepage() {
        output::kv("Homepage", homepage);
    }
    if !ext.keywords().is_empty() {
        output::kv("Keywords", &ext.keywords().join(", "));
    }
    output::kv("Icon", &ext.icon());
    output::kv("Installed", &output::timestamp(ext.install_time()));
    output::kv("Updated", &output::timestamp(ext.update_time()));
    if let Some(path) = ext.local_path() {
        output::kv("Path", &path.display().to_string());
    }
    output::kv("Hot reload", if ext.is_hot() { "yes" } else { "no" });

    if let Some(app) = ext.as_app() {
        output::kv("App type", app.app_type().as_str());
        if let Some(url) = app.web_view_url() {
            output::kv("Web view", &url);
        }
        output::kv("Accent color", app.accent_color());
        output::kv(
            "On menu",
            if app.is_pinned_on_menu() { "yes" } else { "no" },
        );
    }

    if !ext.themes().is_empty() {
        output::header("Themes");
        for theme in ext.themes() {
            output::kv(&theme.id().to_string(), theme.display_name());
        }
    }

    for issue in ext.issues() {
        output::warning(&format!("{}: {}", issue.field, issue.message));
    }
}
