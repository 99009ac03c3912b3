use cardusage_core::MainSets;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(name = "cardusage", version, about = "Track cards in use across deck lists")]
pub struct Cli {
    /// SQLite DB path (defaults to app data dir)
    #[arg(long, env = "CARDUSAGE_DB", global = true)]
    pub db_path: Option<PathBuf>,

    /// Markdown report path (defaults to app data dir)
    #[arg(long, env = "CARDUSAGE_REPORT", global = true)]
    pub report_path: Option<PathBuf>,

    /// Comma-separated main sets, in preference order
    #[arg(long, env = "CARDUSAGE_MAIN_SETS", global = true, default_value_t = MainSets::default())]
    pub main_sets: MainSets,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Track a deck (SWUDB URL, .json deck export, or picklist file)
    Add { source: String },
    /// Stop tracking a deck (SWUDB URL, file path, or deck id)
    Remove { deck: String },
    /// Archive the report and forget every deck
    RemoveAll,
    /// List tracked decks
    List,
    /// Regenerate the report
    Export(ExportCmd),
    /// Verify use counts against deck contents
    Check,
    /// Write one deck's cards grouped by set, without tracking it
    Sort {
        /// SWUDB URL, .json deck export, or picklist file
        source: String,
        /// Defaults to the source file's folder, or `swudb_lists` for URLs
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Args, Clone)]
pub struct ExportCmd {
    /// Print the report view as JSON instead of writing markdown
    #[arg(long)]
    pub json: bool,
}
