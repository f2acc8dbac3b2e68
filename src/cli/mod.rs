pub mod picker;
pub mod process;
pub mod report;
pub mod snapshot;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_running_daemons, restart_daemon};
use report::{process_stats_command, StatsCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    tracker::{store::JsonStore, Tracker},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Timecreator", version, long_about = None)]
#[command(about = "Personal time tracker for labeled activities", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Data directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Show the current session and its elapsed time")]
    Status,
    #[command(about = "Start a session, closing the open one first")]
    Start { category: String },
    #[command(about = "Stop the current session")]
    Stop,
    #[command(about = "Pick a category from a list and start it")]
    Picker,
    #[command(about = "List known categories")]
    Categories,
    #[command(about = "Add a category")]
    Add { category: String },
    #[command(about = "Remove a category")]
    Remove { category: String },
    #[command(about = "Show recent sessions")]
    History {
        #[arg(long, default_value_t = 10, help = "Number of sessions to show")]
        limit: usize,
    },
    #[command(about = "Display time statistics per category")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Export all data as a single JSON document")]
    Export {
        #[arg(long, help = "Write the snapshot to a file instead of stdout")]
        out: Option<PathBuf>,
    },
    #[command(about = "Import a snapshot. With --legacy, migrate the old single-file format")]
    Import {
        path: PathBuf,
        #[arg(long, help = "Treat the file as the old {sessions, categories, current} format")]
        legacy: bool,
    },
    #[command(about = "Start the status daemon detached from this console")]
    Init,
    #[command(
        about = "Run the status daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve,
    #[command(about = "Stop a currently running daemon")]
    Shutdown,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init => {
            restart_daemon(args.dir.as_deref())?;
            Ok(())
        }
        Commands::Shutdown => {
            let process_name = env::current_exe()?;
            kill_running_daemons(&process_name);
            Ok(())
        }
        Commands::Serve => {
            start_daemon(app_dir).await?;
            Ok(())
        }
        Commands::Status => {
            let tracker = load_tracker(app_dir).await?;
            report::show_status(&tracker);
            Ok(())
        }
        Commands::Start { category } => {
            let mut tracker = load_tracker(app_dir).await?;
            let outcome = tracker.start(&category).await?;
            report::show_start_outcome(&category, &outcome);
            Ok(())
        }
        Commands::Stop => {
            let mut tracker = load_tracker(app_dir).await?;
            let stopped = tracker.stop().await?;
            report::show_stopped(stopped.as_ref());
            Ok(())
        }
        Commands::Picker => {
            let mut tracker = load_tracker(app_dir).await?;
            picker::run_picker(&mut tracker).await
        }
        Commands::Categories => {
            let tracker = load_tracker(app_dir).await?;
            report::show_categories(&tracker);
            Ok(())
        }
        Commands::Add { category } => {
            let mut tracker = load_tracker(app_dir).await?;
            if tracker.add_category(&category).await? {
                println!("Added category: {category}");
            } else {
                println!("Category '{category}' already exists");
            }
            Ok(())
        }
        Commands::Remove { category } => {
            let mut tracker = load_tracker(app_dir).await?;
            if tracker.remove_category(&category).await? {
                println!("Removed category: {category}");
            } else {
                println!("Can't remove '{category}': unknown category or the last one left");
            }
            Ok(())
        }
        Commands::History { limit } => {
            let tracker = load_tracker(app_dir).await?;
            let sessions = tracker.history(Some(limit)).await?;
            report::show_history(&sessions);
            Ok(())
        }
        Commands::Stats { command } => {
            let store = JsonStore::new(app_dir)?;
            process_stats_command(store, command).await
        }
        Commands::Export { out } => {
            let store = JsonStore::new(app_dir)?;
            snapshot::process_export(&store, out).await
        }
        Commands::Import { path, legacy } => {
            let store = JsonStore::new(app_dir)?;
            snapshot::process_import(&store, &path, legacy).await
        }
    }
}

async fn load_tracker(app_dir: PathBuf) -> Result<Tracker<JsonStore>> {
    let store = JsonStore::new(app_dir)?;
    Tracker::load(store, Box::new(DefaultClock)).await
}
