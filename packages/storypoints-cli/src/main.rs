/// `storypoints` -- story point totals for kanban boards.
///
/// Loads board snapshots into the in-memory page and drives the recompute
/// pipeline over them, exports boards to spreadsheets and manages the
/// persisted settings.
mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use cli::{Cli, Commands, ExportArgs, SettingsCommand, TotalsArgs};
use storypoints_core::config::{load_settings, save_settings, PipelineConfig, Settings};
use storypoints_core::dom::{Document, MemoryPage};
use storypoints_core::driver::{self, PageEvent};
use storypoints_core::export::{write_spreadsheet, BoardExport};
use storypoints_core::snapshot::{BoardReport, BoardSnapshot};
use storypoints_core::storage::{CookieStore, FallbackStore, LocalStore, SettingsStore};
use storypoints_core::Pipeline;

/// Default settings directory: ~/.config/storypoints
fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storypoints")
}

/// Local JSON file first, cookie jar as the last resort.
fn settings_store(dir: &Path) -> FallbackStore {
    FallbackStore::new(vec![
        Box::new(LocalStore::new(dir.join("settings.json"))),
        Box::new(CookieStore::new(dir.join("cookies.txt"))),
    ])
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn compute_totals(page: MemoryPage, settings: Settings, live: bool) -> Result<BoardReport> {
    let pipeline = Pipeline::new(PipelineConfig::default(), settings);
    let (pipeline, page) = if live {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to start runtime")?;
        runtime.block_on(async {
            let (tx, rx) = mpsc::channel::<PageEvent<MemoryPage>>(1);
            drop(tx);
            driver::run(pipeline, page, rx).await
        })
    } else {
        let mut pipeline = pipeline;
        let mut page = page;
        let now = std::time::Instant::now();
        pipeline.start(&mut page, now);
        pipeline.run_until_idle(&mut page, now)?;
        (pipeline, page)
    };
    log::debug!(
        "[storypoints.cli] {} list(s), {} card(s), {:?}",
        pipeline.registered_lists(),
        pipeline.registered_cards(),
        pipeline.stats()
    );
    Ok(BoardReport::collect(&page, &pipeline))
}

fn run_totals(args: &TotalsArgs, settings: Settings) -> Result<()> {
    let snapshot = BoardSnapshot::from_path(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;
    let mut page = snapshot.to_page();
    page.drain_mutations();

    let report = compute_totals(page, settings, args.live)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

fn run_export(args: &ExportArgs) -> Result<()> {
    let board = BoardExport::from_path(&args.board)
        .with_context(|| format!("Failed to load board export {}", args.board.display()))?;
    let path = write_spreadsheet(&board, &args.out).map_err(|e| {
        log::error!("[storypoints.cli] Export of {} failed: {}", board.name, e);
        e
    })?;
    println!("{}", path.display());
    Ok(())
}

fn run_settings(cmd: &SettingsCommand, store: &dyn SettingsStore) -> Result<()> {
    let mut settings = load_settings(store);
    match cmd {
        SettingsCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        SettingsCommand::Set { value } => {
            settings.estimates_sequence = value.clone();
            let values = settings.estimate_values();
            if values.join(",") != value.replace(' ', "") {
                log::warn!(
                    "[storypoints.cli] Invalid entries dropped, picker will show {}",
                    values.join(",")
                );
            }
        }
        SettingsCommand::Reset => settings.restore_defaults(),
    }
    save_settings(store, &settings).context("Failed to save settings")?;
    println!("{}", settings.estimates_sequence);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let dir = cli.global.config_dir.clone().unwrap_or_else(default_config_dir);
    let store = settings_store(&dir);

    match &cli.command {
        Commands::Totals(args) => run_totals(args, load_settings(&store)),
        Commands::Export(args) => run_export(args),
        Commands::Settings(cmd) => run_settings(cmd, &store),
        Commands::Picker => {
            println!("{}", load_settings(&store).estimate_values().join(" "));
            Ok(())
        }
    }
}
