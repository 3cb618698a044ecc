//! Theme commands

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use xext_extensions::{ThemeId, ThemeStyle};

use crate::cli::ThemeCommands;
use crate::host::Host;
use crate::output;

#[derive(Tabled, Serialize)]
struct ThemeRow {
    id: String,
    #[tabled(rename = "display name")]
    display_name: String,
    inject: String,
    current: String,
}

pub fn run(host: &Host, cmd: ThemeCommands) -> Result<()> {
    let themes = host.themes();
    match cmd {
        ThemeCommands::List(args) => {
            let current = themes.current_id();
            let rows: Vec<ThemeRow> = themes
                .all()
                .into_iter()
                .map(|(_, theme)| {
                    let id = theme.id();
                    ThemeRow {
                        current: if current.as_ref() == Some(&id) { "*" } else { "" }.into(),
                        id: id.to_string(),
                        display_name: theme.display_name().to_string(),
                        inject: format!("{:?}", theme.inject()).to_lowercase(),
                    }
                })
                .collect();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                output::warning("No themes installed");
            } else {
                println!("{}", Table::new(rows).with(Style::sharp()));
            }
        }
        ThemeCommands::Search(args) => {
            let groups = themes.search(&args.query);
            if groups.is_empty() {
                output::warning(&format!("No themes match '{}'", args.query));
            }
            for group in groups {
                output::header(&format!(
                    "{} ({})",
                    group.extension.display_name(),
                    group.score
                ));
                for (theme, score) in group.themes {
                    output::kv(&theme.id().to_string(), &format!("{} ({})", theme.display_name(), score));
                }
            }
        }
        ThemeCommands::Set(args) => {
            let id: ThemeId = args.id.parse().map_err(|e: String| anyhow!(e))?;
            let style = themes
                .set_current(Some(&id))
                .with_context(|| format!("Failed to select theme {}", id))?;
            output::success(&format!("Selected theme {}", id));
            print_style(&style);
        }
        ThemeCommands::Reset => {
            themes.set_current(None).context("Failed to reset theme")?;
            output::success("Using the default theme");
        }
        ThemeCommands::Current => match themes.current() {
            Some((ext, theme)) => {
                output::kv("Theme", &theme.id().to_string());
                output::kv("Name", theme.display_name());
                output::kv("Extension", ext.display_name());
                print_style(&themes.current_style());
            }
            None => {
                if let Some(id) = themes.current_id() {
                    output::warning(&format!("Theme {} is no longer available", id));
                }
                output::info("Using the default theme");
            }
        },
    }
    Ok(())
}

fn print_style(style: &ThemeStyle) {
    match style {
        ThemeStyle::Default => output::kv("Style", "default"),
        ThemeStyle::Append(url) => output::kv("Append", url),
        ThemeStyle::Override(url) => output::kv("Override", url),
    }
}
