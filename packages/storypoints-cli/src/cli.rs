/// Command line definitions for `storypoints`.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Story point totals for kanban boards.
#[derive(Parser, Debug)]
#[command(name = "storypoints", version, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings directory (default: <config dir>/storypoints).
    #[arg(long, global = true, env = "STORYPOINTS_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute list and board totals for a board snapshot.
    Totals(TotalsArgs),

    /// Export a board export JSON to an .xls spreadsheet.
    Export(ExportArgs),

    /// Show or change persisted settings.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Print the values the estimate picker offers.
    Picker,
}

#[derive(Args, Debug)]
pub struct TotalsArgs {
    /// Board snapshot JSON.
    pub snapshot: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Run on real timers through the async driver.
    #[arg(long)]
    pub live: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Board export JSON.
    pub board: PathBuf,

    /// Output directory.
    #[arg(long, short = 'o', default_value = ".")]
    pub out: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    /// Set the comma-separated estimate sequence.
    Set { value: String },
    /// Restore the default sequence.
    Reset,
}
