//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use xext_extensions::ExtensionKind;

/// xext - extension host
#[derive(Parser, Debug)]
#[command(name = "xext")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Data directory (default: ~/.xext)
    #[arg(long, global = true)]
    pub data_dir: Option<Utf8PathBuf>,

    /// Directory of bundled extension packages
    #[arg(long, global = true)]
    pub builtin_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List extensions
    List(ListArgs),

    /// Search extensions by name, description, keywords or pinyin
    Search(SearchArgs),

    /// Show detailed extension information
    Info(InfoArgs),

    /// Install an extension from a package archive or directory
    Install(InstallArgs),

    /// Load an extension in place from a development directory
    Dev(DevArgs),

    /// Reload a development extension from its directory
    Reload(NameArgs),

    /// Uninstall an extension
    Uninstall(UninstallArgs),

    /// Enable an extension
    Enable(NameArgs),

    /// Disable an extension
    Disable(NameArgs),

    /// Theme selection
    #[command(subcommand)]
    Theme(ThemeCommands),

    /// Fetch and load the remote extensions of an account
    Sync(SyncArgs),
}

/// Extension type filter
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    App,
    Theme,
    Plugin,
}

impl From<KindArg> for ExtensionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::App => ExtensionKind::App,
            KindArg::Theme => ExtensionKind::Theme,
            KindArg::Plugin => ExtensionKind::Plugin,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list extensions of this type
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query; space separated keys must all match
    pub query: String,

    /// Only search enabled extensions of this type
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Extension name
    pub name: String,

    /// Also print the README
    #[arg(long)]
    pub readme: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Package archive (.xext, .zip, .tar.gz), directory or package.json
    pub path: Utf8PathBuf,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct DevArgs {
    /// Package directory
    pub path: Utf8PathBuf,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Extension name
    pub name: String,
}

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Extension name
    pub name: String,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommands {
    /// List the themes of enabled theme extensions
    List(ThemeListArgs),

    /// Search themes, grouped by extension
    Search(ThemeSearchArgs),

    /// Select a theme by id (<extension>:<theme>)
    Set(ThemeSetArgs),

    /// Go back to the default style
    Reset,

    /// Show the selected theme
    Current,
}

#[derive(Args, Debug)]
pub struct ThemeListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ThemeSearchArgs {
    /// Search query
    pub query: String,
}

#[derive(Args, Debug)]
pub struct ThemeSetArgs {
    /// Theme id, `<extension>:<theme>`
    pub id: String,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Server endpoint receiving extension requests
    #[arg(long, env = "XEXT_ENDPOINT")]
    pub endpoint: String,

    /// Account whose extensions are fetched
    #[arg(long, env = "XEXT_ACCOUNT")]
    pub account: String,

    /// Bearer token for the server
    #[arg(long, env = "XEXT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Print the entry URL of this extension once loaded
    #[arg(long)]
    pub entry: Option<String>,

    /// Referer sent with the entry URL request
    #[arg(long, requires = "entry")]
    pub referer: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_theme_set() {
        let cli = Cli::parse_from(["xext", "--data-dir", "/tmp/x", "theme", "set", "pack:dark"]);
        assert_eq!(cli.data_dir.as_deref().map(|p| p.as_str()), Some("/tmp/x"));
        match cli.command {
            Commands::Theme(ThemeCommands::Set(args)) => assert_eq!(args.id, "pack:dark"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_kind_filter() {
        let cli = Cli::parse_from(["xext", "list", "--kind", "theme", "--json"]);
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.kind.map(ExtensionKind::from), Some(ExtensionKind::Theme));
                assert!(args.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
