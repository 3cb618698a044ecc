//! Extension list command

use anyhow::Result;
use tabled::{settings::Style, Table};
use xext_extensions::ExtensionKind;

use super::ExtensionRow;
use crate::cli::ListArgs;
use crate::host::Host;
use crate::output;

/// List every extension in collection order, optionally of one type
pub fn run(host: &Host, args: ListArgs) -> Result<()> {
    let kind = args.kind.map(ExtensionKind::from);
    let rows: Vec<ExtensionRow> = host
        .controller
        .all()
        .iter()
        .filter(|ext| kind.map_or(true, |kind| ext.kind() == kind))
        .map(|ext| ExtensionRow::new(ext))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        output::warning("No extensions found");
        return Ok(());
    }

    let count = rows.len();
    println!("{}", Table::new(rows).with(Style::sharp()));
    output::info(&format!("{} extensions", count));
    Ok(())
}
