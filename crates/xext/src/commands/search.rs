//! Extension search command

use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use xext_extensions::ExtensionKind;

use super::status;
use crate::cli::SearchArgs;
use crate::host::Host;
use crate::output;

#[derive(Tabled, Serialize)]
struct SearchRow {
    name: String,
    #[tabled(rename = "display name")]
    display_name: String,
    #[tabled(rename = "type")]
    #[serde(rename = "type")]
    kind: String,
    status: String,
    score: u32,
}

pub fn run(host: &Host, args: SearchArgs) -> Result<()> {
    let matches = host
        .controller
        .search(&args.query, args.kind.map(ExtensionKind::from));

    let rows: Vec<SearchRow> = matches
        .iter()
        .map(|(ext, score)| SearchRow {
            name: ext.name().to_string(),
            display_name: ext.display_name().to_string(),
            kind: ext.kind().as_str().to_string(),
            status: status(ext).to_string(),
            score: *score,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        output::warning(&format!("No extensions match '{}'", args.query));
    } else {
        println!("{}", Table::new(rows).with(Style::sharp()));
    }
    Ok(())
}
